use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use timetrace_protocol::{
    Background, ColorHash, Fill, Palette, Point, Rect, RenderCommand, Rgb, TextAnchor,
};
use tracing::debug;

use crate::model::CollapsedStacks;
use crate::palette::{self, DASH_COLOR, ROOT_COLOR, SEPARATOR_COLOR};

/// Horizontal padding on each side of the frames.
pub const XPAD: f64 = 10.0;
/// Vertical gap between stacked frames.
const FRAME_PAD: f64 = 1.0;
const CORNER_RADIUS: f64 = 2.0;

/// Narrowest frame that is still drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinWidth {
    Pixels(f64),
    /// Percent of the total time.
    Percent(f64),
}

impl Default for MinWidth {
    fn default() -> Self {
        MinWidth::Pixels(0.1)
    }
}

/// Rendering options. Every field has a default, so a config file only
/// names what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlameGraphOptions {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_width: f64,
    pub frame_height: f64,
    pub font_type: String,
    pub font_size: f64,
    /// Average glyph width relative to `font_size`.
    pub font_width: f64,
    pub min_width: MinWidth,
    /// Prefix of the hover details line.
    pub name_type: String,
    /// Unit of the values.
    pub count_name: String,
    pub palette: Palette,
    pub color_hash: ColorHash,
    pub background: Background,
    pub search_color: String,
    /// Embedded as an XML comment.
    pub notes: Option<String>,
    /// Scales the values shown in tooltips.
    pub factor: f64,
    pub interactive: bool,
    /// Swap the colors of differential graphs.
    pub negate: bool,
}

impl Default for FlameGraphOptions {
    fn default() -> Self {
        Self {
            title: "Flame Graph".to_string(),
            subtitle: None,
            image_width: 1200.0,
            frame_height: 16.0,
            font_type: "Verdana".to_string(),
            font_size: 12.0,
            font_width: 0.59,
            min_width: MinWidth::default(),
            name_type: "Time:".to_string(),
            count_name: "µs".to_string(),
            palette: Palette::default(),
            color_hash: ColorHash::default(),
            background: Background::default(),
            search_color: "rgb(230,0,230)".to_string(),
            notes: None,
            factor: 1.0,
            interactive: true,
            negate: false,
        }
    }
}

impl FlameGraphOptions {
    /// Top padding, room for the title.
    pub fn ypad1(&self) -> f64 {
        self.font_size * 3.0
    }

    /// Bottom padding, room for the details line.
    pub fn ypad2(&self) -> f64 {
        self.font_size * 2.0 + 10.0
    }

    /// Extra top padding when a subtitle is shown.
    pub fn ypad3(&self) -> f64 {
        self.font_size * 2.0
    }

    fn has_subtitle(&self) -> bool {
        self.subtitle.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// One rectangle: a label at one depth over `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlameNode {
    pub label: String,
    pub depth: usize,
    pub start: f64,
    pub end: f64,
    pub delta: Option<f64>,
}

impl FlameNode {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0 && self.label.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlameGraph {
    /// Sorted by depth, then start.
    pub nodes: Vec<FlameNode>,
    pub total: f64,
    /// Samples dropped for a non-positive or non-finite value.
    pub ignored: usize,
}

impl FlameGraph {
    pub fn is_empty(&self) -> bool {
        self.total <= 0.0
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
struct PendingFrame {
    start: f64,
    delta: Option<f64>,
}

/// Merges consecutive samples into flame nodes.
///
/// Samples must arrive sorted so that paths sharing a prefix are adjacent.
/// A frame stays open while consecutive samples keep it on their path and
/// becomes a [`FlameNode`] once a sample leaves it.
#[derive(Debug, Default)]
pub struct FlowMerger {
    last: Vec<String>,
    pending: HashMap<(String, usize), PendingFrame>,
    nodes: Vec<FlameNode>,
    time: f64,
    ignored: usize,
}

impl FlowMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample. `path` is root first and excludes the implicit root
    /// frame.
    pub fn push(&mut self, path: &[String], value: f64, delta: Option<f64>) {
        if !value.is_finite() || value <= 0.0 {
            self.ignored += 1;
            return;
        }
        let mut stack = Vec::with_capacity(path.len() + 1);
        stack.push(String::new());
        stack.extend(path.iter().cloned());
        self.flow(stack, delta);
        self.time += value;
    }

    pub fn finish(mut self) -> FlameGraph {
        self.flow(Vec::new(), None);
        let mut nodes = self.nodes;
        nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then(a.start.total_cmp(&b.start)));
        FlameGraph {
            nodes,
            total: self.time,
            ignored: self.ignored,
        }
    }

    fn flow(&mut self, stack: Vec<String>, delta: Option<f64>) {
        let shared = self
            .last
            .iter()
            .zip(&stack)
            .take_while(|(a, b)| a == b)
            .count();

        for depth in (shared..self.last.len()).rev() {
            let key = (self.last[depth].clone(), depth);
            if let Some(frame) = self.pending.remove(&key) {
                self.nodes.push(FlameNode {
                    label: key.0,
                    depth,
                    start: frame.start,
                    end: self.time,
                    delta: frame.delta,
                });
            }
        }

        let leaf = stack.len().saturating_sub(1);
        for (depth, label) in stack.iter().enumerate().skip(shared) {
            let frame = self
                .pending
                .entry((label.clone(), depth))
                .or_insert(PendingFrame {
                    start: self.time,
                    delta: None,
                });
            frame.start = self.time;
            if let Some(d) = delta {
                let add = if depth == leaf { d } else { 0.0 };
                frame.delta = Some(frame.delta.unwrap_or(0.0) + add);
            }
        }

        self.last = stack;
    }
}

/// Flow-merge collapsed stacks in their path order.
pub fn merge_stacks(stacks: &CollapsedStacks) -> FlameGraph {
    let mut merger = FlowMerger::new();
    for (path, value) in stacks {
        merger.push(path, *value, None);
    }
    let graph = merger.finish();
    if graph.ignored > 0 {
        debug!(ignored = graph.ignored, "ignored samples without a positive value");
    }
    graph
}

/// Render commands plus the image size they were laid out for.
#[derive(Debug, Clone, PartialEq)]
pub struct FlameLayout {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<RenderCommand>,
}

/// Lay out a non-empty flame graph: the background, header texts and one
/// group per frame inside a `frames` group.
pub fn layout_flame_graph(graph: &FlameGraph, options: &FlameGraphOptions) -> FlameLayout {
    let width = options.image_width;
    let total = graph.total;
    let width_per_time = (width - 2.0 * XPAD) / total;
    let min_time = match options.min_width {
        MinWidth::Pixels(px) => px / width_per_time,
        MinWidth::Percent(pct) => total * pct / 100.0,
    };

    let visible: Vec<&FlameNode> = graph
        .nodes
        .iter()
        .filter(|n| n.is_root() || n.width() >= min_time)
        .collect();
    let depth_max = visible.iter().map(|n| n.depth).max().unwrap_or(0);

    let mut height = (depth_max as f64 + 1.0) * options.frame_height
        + options.ypad1()
        + options.ypad2();
    if options.has_subtitle() {
        height += options.ypad3();
    }

    let max_delta = visible
        .iter()
        .filter_map(|n| n.delta)
        .map(f64::abs)
        .fold(1.0, f64::max);

    let mut commands = Vec::with_capacity(visible.len() * 4 + 10);
    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(0.0, 0.0, width, height),
        fill: Fill::Reference("background".to_string()),
        corner_radius: 0.0,
    });
    push_header(&mut commands, options, width, height);

    commands.push(RenderCommand::BeginGroup {
        id: Some("frames".to_string()),
        title: None,
    });
    for node in visible {
        let end = if node.is_root() { total } else { node.end };
        let x1 = XPAD + node.start * width_per_time;
        let x2 = XPAD + end * width_per_time;
        let depth = node.depth as f64;
        let y1 = height - options.ypad2() - (depth + 1.0) * options.frame_height + FRAME_PAD;
        let y2 = height - options.ypad2() - depth * options.frame_height;

        commands.push(RenderCommand::BeginGroup {
            id: None,
            title: Some(frame_info(node, end, total, options)),
        });
        commands.push(RenderCommand::DrawRect {
            rect: Rect::from_corners(x1, y1, x2, y2),
            fill: Fill::Color(node_color(node, max_delta, options)),
            corner_radius: CORNER_RADIUS,
        });
        commands.push(RenderCommand::DrawText {
            position: Point::new(x1 + 3.0, 3.0 + (y1 + y2) / 2.0),
            text: fit_label(&node.label, x2 - x1, options),
            anchor: TextAnchor::Start,
            id: None,
            class: None,
        });
        commands.push(RenderCommand::EndGroup);
    }
    commands.push(RenderCommand::EndGroup);

    FlameLayout {
        width,
        height,
        commands,
    }
}

fn push_header(
    commands: &mut Vec<RenderCommand>,
    options: &FlameGraphOptions,
    width: f64,
    height: f64,
) {
    let fs = options.font_size;
    let center = (width / 2.0).floor();
    let mut label =
        |x: f64, y: f64, id: &str, text: &str, anchor: TextAnchor, class: Option<&str>| {
            commands.push(RenderCommand::DrawText {
                position: Point::new(x, y),
                text: text.to_string(),
                anchor,
                id: Some(id.to_string()),
                class: class.map(str::to_string),
            });
        };

    label(center, fs * 2.0, "title", &options.title, TextAnchor::Middle, None);
    if let Some(subtitle) = options.subtitle.as_deref().filter(|s| !s.is_empty()) {
        label(center, fs * 4.0, "subtitle", subtitle, TextAnchor::Middle, None);
    }
    if !options.interactive {
        return;
    }
    let bottom = height - options.ypad2() / 2.0;
    label(XPAD, bottom, "details", " ", TextAnchor::Start, None);
    label(XPAD, fs * 2.0, "unzoom", "Reset Zoom", TextAnchor::Start, Some("hide"));
    label(width - XPAD - 100.0, fs * 2.0, "search", "Search", TextAnchor::Start, None);
    label(width - XPAD - 16.0, fs * 2.0, "ignorecase", "ic", TextAnchor::Start, None);
    label(width - XPAD - 100.0, bottom, "matched", " ", TextAnchor::Start, None);
}

/// Tooltip: `label (1,234 µs, 5.67%)`, with the delta share appended for
/// differential graphs.
fn frame_info(node: &FlameNode, end: f64, total: f64, options: &FlameGraphOptions) -> String {
    let samples = ((end - node.start) * options.factor).round();
    let samples_txt = with_thousands(samples);
    if node.is_root() {
        return format!("all ({samples_txt} {}, 100%)", options.count_name);
    }
    let pct = 100.0 * samples / (total * options.factor);
    match node.delta {
        None => format!("{} ({samples_txt} {}, {pct:.2}%)", node.label, options.count_name),
        Some(delta) => {
            let d = if options.negate { -delta } else { delta };
            let delta_pct = 100.0 * d / (total * options.factor);
            let sign = if d > 0.0 { "+" } else { "" };
            format!(
                "{} ({samples_txt} {}, {pct:.2}%; {sign}{delta_pct:.2}%)",
                node.label, options.count_name
            )
        }
    }
}

fn with_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}

fn node_color(node: &FlameNode, max_delta: f64, options: &FlameGraphOptions) -> Rgb {
    if node.is_root() {
        return ROOT_COLOR;
    }
    match (node.label.as_str(), node.delta) {
        ("--", _) => SEPARATOR_COLOR,
        ("-", _) => DASH_COLOR,
        (_, Some(delta)) => palette::color_scale(delta, max_delta, options.negate),
        (label, None) => palette::frame_color(options.palette, options.color_hash, label),
    }
}

/// The label cut to what fits in `width` pixels; empty below three
/// characters.
fn fit_label(label: &str, width: f64, options: &FlameGraphOptions) -> String {
    let fit = (width / (options.font_size * options.font_width)).floor();
    if fit < 3.0 {
        return String::new();
    }
    let chars = fit as usize;
    if label.chars().count() <= chars {
        return label.to_string();
    }
    let mut text: String = label.chars().take(chars - 2).collect();
    text.push_str("..");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn sample_stacks() -> CollapsedStacks {
        let mut stacks = CollapsedStacks::new();
        stacks.add(["main"], 10.0);
        stacks.add(["main", "parse"], 30.0);
        stacks.add(["main", "parse", "lex"], 20.0);
        stacks.add(["main", "codegen"], 40.0);
        stacks
    }

    fn find<'a>(graph: &'a FlameGraph, label: &str) -> &'a FlameNode {
        graph.nodes.iter().find(|n| n.label == label).unwrap()
    }

    #[test]
    fn merge_builds_contiguous_nodes() {
        let graph = merge_stacks(&sample_stacks());
        assert_eq!(graph.total, 100.0);
        assert_eq!(graph.nodes.len(), 5);

        let root = &graph.nodes[0];
        assert!(root.is_root());
        assert_eq!((root.start, root.end), (0.0, 100.0));

        let main = find(&graph, "main");
        assert_eq!((main.depth, main.start, main.end), (1, 0.0, 100.0));
        // map order: main, main;codegen, main;parse, main;parse;lex
        let codegen = find(&graph, "codegen");
        assert_eq!((codegen.start, codegen.end), (10.0, 50.0));
        let parse = find(&graph, "parse");
        assert_eq!((parse.start, parse.end), (50.0, 100.0));
        let lex = find(&graph, "lex");
        assert_eq!((lex.depth, lex.start, lex.end), (3, 80.0, 100.0));
        assert_eq!(graph.max_depth(), 3);
    }

    #[test]
    fn children_lie_within_parents() {
        let graph = merge_stacks(&sample_stacks());
        for node in graph.nodes.iter().filter(|n| n.depth > 0) {
            let parent_found = graph.nodes.iter().any(|p| {
                p.depth + 1 == node.depth && p.start <= node.start && node.end <= p.end
            });
            assert!(parent_found, "{node:?}");
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let stacks = sample_stacks();
        let options = FlameGraphOptions::default();
        let a = layout_flame_graph(&merge_stacks(&stacks), &options);
        let b = layout_flame_graph(&merge_stacks(&stacks), &options);
        assert_eq!(a, b);
    }

    #[test]
    fn non_positive_samples_are_ignored() {
        let mut merger = FlowMerger::new();
        merger.push(&path(&["a"]), 0.0, None);
        merger.push(&path(&["b"]), f64::NAN, None);
        merger.push(&path(&["c"]), -1.0, None);
        let graph = merger.finish();
        assert_eq!(graph.ignored, 3);
        assert!(graph.is_empty());
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn deltas_accumulate_on_leaves() {
        let mut merger = FlowMerger::new();
        merger.push(&path(&["a", "b"]), 10.0, Some(4.0));
        merger.push(&path(&["a", "c"]), 10.0, Some(-2.0));
        let graph = merger.finish();
        assert_eq!(find(&graph, "b").delta, Some(4.0));
        assert_eq!(find(&graph, "c").delta, Some(-2.0));
        assert_eq!(find(&graph, "a").delta, Some(0.0));
    }

    #[test]
    fn narrow_frames_are_pruned() {
        let mut stacks = CollapsedStacks::new();
        stacks.add(["wide"], 1000.0);
        stacks.add(["tiny"], 0.01);
        let graph = merge_stacks(&stacks);
        let options = FlameGraphOptions {
            min_width: MinWidth::Percent(1.0),
            ..FlameGraphOptions::default()
        };
        let layout = layout_flame_graph(&graph, &options);
        let titles: Vec<&str> = layout
            .commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::BeginGroup { title: Some(t), .. } => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.iter().any(|t| t.starts_with("all (1,000 µs, 100%)")));
        assert!(titles.iter().any(|t| t.starts_with("wide (1,000 µs, ")));
    }

    #[test]
    fn geometry_follows_depth() {
        let graph = merge_stacks(&sample_stacks());
        let options = FlameGraphOptions::default();
        let layout = layout_flame_graph(&graph, &options);
        // depth 0..=3, 16px rows, 36 + 34 padding
        assert_eq!(layout.height, 4.0 * 16.0 + 36.0 + 34.0);

        let rects: Vec<&Rect> = layout
            .commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawRect {
                    rect,
                    fill: Fill::Color(_),
                    ..
                } => Some(rect),
                _ => None,
            })
            .collect();
        let root = rects[0];
        assert_eq!(root.x, XPAD);
        assert!((root.right() - (1200.0 - XPAD)).abs() < 1e-9);
        assert_eq!(root.bottom(), layout.height - options.ypad2());
        assert_eq!(root.h, 15.0);
    }

    #[test]
    fn labels_are_truncated() {
        let options = FlameGraphOptions::default();
        // 12 * 0.59 = 7.08px per char
        assert_eq!(fit_label("abcdefgh", 20.0, &options), "");
        assert_eq!(fit_label("abcdefgh", 36.0, &options), "abc..");
        assert_eq!(fit_label("abc", 36.0, &options), "abc");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(with_thousands(0.0), "0");
        assert_eq!(with_thousands(999.0), "999");
        assert_eq!(with_thousands(1234567.0), "1,234,567");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: FlameGraphOptions =
            serde_json::from_str(r#"{"title":"Build","min_width":{"percent":0.5},"palette":"io"}"#)
                .unwrap();
        assert_eq!(options.title, "Build");
        assert_eq!(options.min_width, MinWidth::Percent(0.5));
        assert_eq!(options.palette, Palette::Io);
        assert_eq!(options.image_width, 1200.0);
        assert_eq!(options.count_name, "µs");

        let flat: FlameGraphOptions =
            serde_json::from_str(r##"{"background":{"flat":"#ffffff"}}"##).unwrap();
        assert_eq!(flat.background, Background::Flat("#ffffff".into()));
    }
}
