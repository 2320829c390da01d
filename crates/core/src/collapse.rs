//! Reconstruct call stacks from flat interval events and fold them into
//! per-path self-time.

use std::collections::BTreeMap;

use timetrace_protocol::{ContextId, Phase, TraceDocument, TraceEvent};
use tracing::debug;

use crate::model::CollapsedStacks;
use crate::normalize::FileTrace;

/// `(pid, tid)`
type Context = (ContextId, ContextId);

/// One closed interval on a single thread.
#[derive(Debug, Clone, PartialEq)]
struct Interval {
    label: String,
    start: f64,
    duration: f64,
}

impl Interval {
    fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A frame on the reconstruction stack. `self_time` starts at the frame's
/// duration and shrinks by each direct child's duration.
#[derive(Debug)]
struct OpenFrame {
    interval: Interval,
    self_time: f64,
}

/// Fold every interval in `events` into `stacks`.
///
/// Events are grouped by `(pid, tid)`. Complete events with a positive
/// duration and matched begin/end pairs take part; everything else is
/// ignored. Intervals must nest properly within a thread.
pub fn collapse_events(events: &[TraceEvent], stacks: &mut CollapsedStacks) {
    for (context, mut intervals) in intervals_by_context(events) {
        intervals.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then(b.duration.total_cmp(&a.duration))
        });
        debug!(pid = %context.0, tid = %context.1, intervals = intervals.len(), "collapsing");
        replay(intervals, stacks);
    }
}

/// Collapse each file in its own timestamps. Files never overlap, so this
/// gives the same stacks as collapsing their combined trace.
pub fn collapse_files(files: &[FileTrace]) -> CollapsedStacks {
    let mut stacks = CollapsedStacks::new();
    for file in files {
        collapse_events(&file.events, &mut stacks);
    }
    stacks
}

/// Collapse an arbitrary Chrome trace.
pub fn collapse_trace(document: &TraceDocument) -> CollapsedStacks {
    let mut stacks = CollapsedStacks::new();
    collapse_events(&document.trace_events, &mut stacks);
    stacks
}

fn intervals_by_context(events: &[TraceEvent]) -> BTreeMap<Context, Vec<Interval>> {
    let mut intervals: BTreeMap<Context, Vec<Interval>> = BTreeMap::new();
    let mut pending: BTreeMap<Context, Vec<&TraceEvent>> = BTreeMap::new();

    for event in events {
        let key = (event.pid.clone(), event.tid.clone());
        match event.ph {
            Phase::Complete => {
                let duration = event.duration();
                if duration > 0.0 {
                    intervals.entry(key).or_default().push(Interval {
                        label: event.name.clone(),
                        start: event.ts,
                        duration,
                    });
                }
            }
            Phase::Begin | Phase::End => pending.entry(key).or_default().push(event),
            _ => {}
        }
    }

    for (key, mut marks) in pending {
        marks.sort_by(|a, b| a.ts.total_cmp(&b.ts));
        let mut open: Vec<&TraceEvent> = Vec::new();
        for mark in marks {
            if mark.ph == Phase::Begin {
                open.push(mark);
                continue;
            }
            let Some(begin) = open.pop() else {
                debug!(pid = %key.0, tid = %key.1, ts = mark.ts, "end event without begin");
                continue;
            };
            let duration = mark.ts - begin.ts;
            if duration > 0.0 {
                intervals.entry(key.clone()).or_default().push(Interval {
                    label: begin.name.clone(),
                    start: begin.ts,
                    duration,
                });
            }
        }
        if !open.is_empty() {
            debug!(pid = %key.0, tid = %key.1, unmatched = open.len(), "begin events without end");
        }
    }

    intervals
}

fn replay(intervals: Vec<Interval>, stacks: &mut CollapsedStacks) {
    let mut stack: Vec<OpenFrame> = Vec::new();

    for interval in intervals {
        while stack
            .last()
            .is_some_and(|top| top.interval.end() <= interval.start)
        {
            pop_frame(&mut stack, stacks);
        }
        if let Some(top) = stack.last_mut() {
            top.self_time -= interval.duration;
        }
        stack.push(OpenFrame {
            self_time: interval.duration,
            interval,
        });
    }

    while !stack.is_empty() {
        pop_frame(&mut stack, stacks);
    }
}

/// Record the path to the top frame and pop it.
fn pop_frame(stack: &mut Vec<OpenFrame>, stacks: &mut CollapsedStacks) {
    let path: Vec<&str> = stack.iter().map(|f| f.interval.label.as_str()).collect();
    if let Some(top) = stack.last() {
        stacks.add(path, top.self_time);
    }
    stack.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn on_thread(mut event: TraceEvent, tid: i64) -> TraceEvent {
        event.tid = ContextId::from(tid);
        event
    }

    #[test]
    fn nested_intervals_get_self_time() {
        let events = vec![
            TraceEvent::complete("c", 20.0, 10.0),
            TraceEvent::complete("a", 0.0, 100.0),
            TraceEvent::complete("b", 10.0, 50.0),
            TraceEvent::complete("d", 70.0, 20.0),
        ];
        let doc = TraceDocument::new(events);
        let stacks = collapse_trace(&doc);

        assert_eq!(stacks.get(&path(&["a"])), Some(30.0));
        assert_eq!(stacks.get(&path(&["a", "b"])), Some(40.0));
        assert_eq!(stacks.get(&path(&["a", "b", "c"])), Some(10.0));
        assert_eq!(stacks.get(&path(&["a", "d"])), Some(20.0));
        assert_eq!(stacks.total(), 100.0);
    }

    #[test]
    fn equal_start_puts_longer_interval_outside() {
        let events = vec![
            TraceEvent::complete("inner", 0.0, 10.0),
            TraceEvent::complete("outer", 0.0, 40.0),
        ];
        let stacks = collapse_trace(&TraceDocument::new(events));
        assert_eq!(stacks.get(&path(&["outer", "inner"])), Some(10.0));
        assert_eq!(stacks.get(&path(&["outer"])), Some(30.0));
    }

    #[test]
    fn repeated_paths_accumulate() {
        let events = vec![
            TraceEvent::complete("main", 0.0, 100.0),
            TraceEvent::complete("work", 10.0, 10.0),
            TraceEvent::complete("work", 50.0, 15.0),
        ];
        let stacks = collapse_trace(&TraceDocument::new(events));
        assert_eq!(stacks.get(&path(&["main", "work"])), Some(25.0));
        assert_eq!(stacks.get(&path(&["main"])), Some(75.0));
    }

    #[test]
    fn threads_are_collapsed_separately() {
        let events = vec![
            on_thread(TraceEvent::complete("a", 0.0, 100.0), 1),
            on_thread(TraceEvent::complete("b", 10.0, 10.0), 2),
        ];
        let stacks = collapse_trace(&TraceDocument::new(events));
        assert_eq!(stacks.get(&path(&["a"])), Some(100.0));
        assert_eq!(stacks.get(&path(&["b"])), Some(10.0));
    }

    #[test]
    fn named_threads_are_contexts() {
        let mut main = TraceEvent::complete("a", 0.0, 100.0);
        main.tid = ContextId::Name("Main".into());
        let mut worker = TraceEvent::complete("b", 10.0, 10.0);
        worker.tid = ContextId::Name("Worker".into());
        worker.pid = ContextId::from(-1);

        let stacks = collapse_trace(&TraceDocument::new(vec![main, worker]));
        assert_eq!(stacks.get(&path(&["a"])), Some(100.0));
        assert_eq!(stacks.get(&path(&["b"])), Some(10.0));
    }

    #[test]
    fn begin_end_pairs_become_intervals() {
        let mut begin = TraceEvent::complete("outer", 0.0, 0.0);
        begin.ph = Phase::Begin;
        begin.dur = None;
        let mut end = TraceEvent::complete("", 50.0, 0.0);
        end.ph = Phase::End;
        end.dur = None;
        let mut stray = end.clone();
        stray.ts = 60.0;

        let events = vec![begin, TraceEvent::complete("inner", 5.0, 20.0), end, stray];
        let stacks = collapse_trace(&TraceDocument::new(events));
        assert_eq!(stacks.get(&path(&["outer"])), Some(30.0));
        assert_eq!(stacks.get(&path(&["outer", "inner"])), Some(20.0));
        assert_eq!(stacks.len(), 2);
    }

    #[test]
    fn zero_duration_and_metadata_are_ignored() {
        let mut meta = TraceEvent::complete("thread_name", 0.0, 5.0);
        meta.ph = Phase::Metadata;
        let events = vec![meta, TraceEvent::complete("empty", 0.0, 0.0)];
        assert!(collapse_trace(&TraceDocument::new(events)).is_empty());
    }
}
