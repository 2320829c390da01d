//! Integration test: lay out a build directory on disk, run the whole
//! pipeline and check the combined trace, the report and the flame graph.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use timetrace_core::PipelineError;
use timetrace_core::model::CountDuration;
use timetrace_core::pipeline::{PipelineConfig, run};
use timetrace_protocol::ContextId;

fn event(name: &str, ts: f64, dur: f64, detail: Option<&str>) -> Value {
    let mut event = json!({
        "pid": 4242, "tid": 4242, "ph": "X", "ts": ts, "dur": dur, "name": name,
    });
    if let Some(detail) = detail {
        event["args"] = json!({ "detail": detail });
    }
    event
}

fn metadata() -> Value {
    json!({
        "cat": "", "pid": 4242, "tid": 4243, "ts": 0, "ph": "M",
        "name": "thread_name", "args": { "name": "clang" },
    })
}

/// Write `<dir>/<unit>.json` and, unless `stale`, the object file next to it.
fn write_trace(dir: &Path, unit: &str, events: Vec<Value>, stale: bool) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let trace = dir.join(format!("{unit}.json"));
    let doc = json!({ "traceEvents": events, "beginningOfTime": 1_700_000_000_000_000u64 });
    fs::write(&trace, serde_json::to_vec(&doc).unwrap()).unwrap();
    if !stale {
        fs::write(dir.join(format!("{unit}.o")), b"").unwrap();
    }
    trace
}

fn unit_a(root: &Path) -> Vec<Value> {
    let header = root.join("include").join("app.hpp");
    vec![
        metadata(),
        event("ExecuteCompiler", 0.0, 1000.0, None),
        event("Frontend", 10.0, 600.0, None),
        event("Source", 20.0, 300.0, Some(header.to_str().unwrap())),
        event("Source", 30.0, 100.0, Some("/usr/include/stdio.h")),
        event("Backend", 620.0, 380.0, None),
        event("Total Frontend", 0.0, 600.0, None),
    ]
}

fn unit_b() -> Vec<Value> {
    vec![
        event("ExecuteCompiler", 0.0, 500.0, None),
        event("Frontend", 0.0, 450.0, None),
        event("InstantiateFunction", 100.0, 200.0, Some("std::vector<int>::push_back")),
        event("InstantiateFunction", 150.0, 50.0, Some("app::make<int>")),
    ]
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    objects: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let objects = root.join("build/CMakeFiles/app.dir/src");
    write_trace(&objects, "a.cpp", unit_a(&root), false);
    write_trace(&objects, "b.cpp", unit_b(), false);
    Fixture {
        _dir: dir,
        root,
        objects,
    }
}

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig::new(root, root.join("build"))
}

#[test]
fn files_are_combined_back_to_back() {
    let fx = fixture();
    let output = run(&config(&fx.root)).unwrap();
    let combined = &output.combined;

    assert_eq!(combined.files.len(), 2);
    assert_eq!(combined.files[0].display_name, "src/a.cpp");
    assert_eq!(combined.report.total_compile, CountDuration::new(2, 1500.0));

    let events = &combined.document.trace_events;
    assert!(
        events
            .iter()
            .all(|e| e.pid == ContextId::default() && e.tid == ContextId::default())
    );
    assert!(!events.iter().any(|e| e.name.starts_with("Total")));
    let b = events
        .iter()
        .find(|e| e.name == "ExecuteCompiler" && e.detail() == Some("src/b.cpp"))
        .unwrap();
    assert!(b.ts >= 1001.0);
}

#[test]
fn header_paths_are_shortened() {
    let fx = fixture();
    let output = run(&config(&fx.root)).unwrap();
    let report = &output.combined.report;

    assert!(report.file_parse.contains_key("<stdio.h>"));
    assert!(report.file_parse.contains_key("include/app.hpp"));
    // the nested stdio.h region is already covered by app.hpp
    assert_eq!(report.total_parsing, CountDuration::new(1, 300.0));
    assert!(output.report.contains("| include/app.hpp |"));
    assert!(output.report.contains("| &lt;stdio.h&gt; |"));
}

#[test]
fn instantiations_are_counted_once() {
    let fx = fixture();
    let output = run(&config(&fx.root)).unwrap();
    let report = &output.combined.report;

    assert_eq!(report.total_instantiations, CountDuration::new(1, 200.0));
    assert_eq!(report.symbol_instantiate.len(), 2);
    assert!(report.symbol_set_instantiate.contains_key("std::vector<$>::push_back"));

    let project = output.report.split("## All Symbols").next().unwrap();
    assert!(project.contains("app::make&lt;int&gt;"));
    assert!(!project.contains("std::vector"));
}

#[test]
fn self_times_add_up_to_compile_time() {
    let fx = fixture();
    let output = run(&config(&fx.root)).unwrap();
    assert_eq!(output.stacks.total(), 1500.0);

    let path: Vec<String> = ["ExecuteCompiler", "Frontend", "include/app.hpp", "<stdio.h>"]
        .map(String::from)
        .to_vec();
    assert_eq!(output.stacks.get(&path), Some(100.0));
    assert!(output.svg.contains("<title>all (1,500 µs, 100%)</title>"));
}

#[test]
fn stale_traces_are_ignored() {
    let fx = fixture();
    write_trace(&fx.objects, "old.cpp", unit_b(), true);
    let output = run(&config(&fx.root)).unwrap();
    assert_eq!(output.combined.files.len(), 2);
    assert!(!output.combined.report.file_compile.contains_key("src/old.cpp"));
}

#[test]
fn malformed_traces_are_skipped() {
    let fx = fixture();
    fs::write(fx.objects.join("c.cpp.json"), b"{\"traceEvents\": [").unwrap();
    fs::write(fx.objects.join("c.cpp.o"), b"").unwrap();
    let output = run(&config(&fx.root)).unwrap();
    assert_eq!(output.combined.files.len(), 2);
}

#[test]
fn all_traces_malformed_fails() {
    let dir = tempfile::tempdir().unwrap();
    let objects = dir.path().join("build");
    fs::create_dir_all(&objects).unwrap();
    fs::write(objects.join("x.cpp.json"), b"garbage").unwrap();
    fs::write(objects.join("x.cpp.o"), b"").unwrap();

    let err = run(&config(dir.path())).unwrap_err();
    assert!(matches!(err, PipelineError::NoUsableInput { failed: 1 }));
}

#[test]
fn empty_build_dir_gives_empty_outputs() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("build")).unwrap();
    let output = run(&config(dir.path())).unwrap();

    assert!(output.combined.document.is_empty());
    assert_eq!(output.combined.report.total_compile, CountDuration::default());
    assert!(output.stacks.is_empty());
    assert!(output.svg.contains("ERROR: No valid input provided."));
    assert!(output.report.starts_with("# Time Trace Report"));
}

#[test]
fn compile_commands_name_translation_units() {
    let fx = fixture();
    let source = fx.root.join("lib").join("a.cpp");
    let commands = json!([{
        "directory": fx.root.join("build").to_str().unwrap(),
        "command": format!(
            "c++ -I{} -o CMakeFiles/app.dir/src/a.cpp.o -c {}",
            fx.root.join("include").display(),
            source.display()
        ),
        "file": source.to_str().unwrap(),
    }]);
    fs::write(
        fx.root.join("build/compile_commands.json"),
        serde_json::to_vec(&commands).unwrap(),
    )
    .unwrap();

    let output = run(&config(&fx.root)).unwrap();
    let names: Vec<&str> = output
        .combined
        .files
        .iter()
        .map(|f| f.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["lib/a.cpp", "src/b.cpp"]);
}

#[test]
fn output_is_deterministic() {
    let fx = fixture();
    let first = run(&config(&fx.root)).unwrap();
    let second = run(&config(&fx.root)).unwrap();
    assert_eq!(first.svg, second.svg);
    assert_eq!(first.report, second.report);
    assert_eq!(first.stacks, second.stacks);
}
