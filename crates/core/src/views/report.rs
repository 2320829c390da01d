//! Markdown report over [`ReportData`].

use std::collections::BTreeMap;

use crate::model::{CountDuration, ReportData};

/// Rows shown before the collapsible part of a section.
const TOP_ROWS: usize = 8;
/// Rows inside the collapsible `<details>` block.
const DETAIL_ROWS: usize = 100;

const STD_PREFIXES: &[&str] = &["std::", "__gnu_cxx::", "_M_", "_mm_", "__"];

/// Symbols of the standard library and compiler internals.
pub fn is_std_symbol(symbol: &str) -> bool {
    STD_PREFIXES.iter().any(|prefix| symbol.starts_with(prefix))
}

/// Format a duration in µs using the largest unit that keeps the value
/// below its next step, rounded to two decimals.
pub fn format_time(micros: f64) -> String {
    let (value, unit) = if micros < 1_000.0 {
        (micros, "µs")
    } else if micros < 1_000_000.0 {
        (micros / 1_000.0, "ms")
    } else if micros < 60_000_000.0 {
        (micros / 1_000_000.0, "s")
    } else if micros < 3_600_000_000.0 {
        (micros / 60_000_000.0, "min")
    } else {
        (micros / 3_600_000_000.0, "h")
    };
    format!("{} {unit}", round2(value))
}

/// Two decimals at most, without trailing zeros.
fn round2(value: f64) -> String {
    let s = format!("{value:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn percent(part: f64, whole: f64) -> String {
    if whole > 0.0 {
        format!("{}%", round2(100.0 * part / whole))
    } else {
        "-".to_string()
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('|', "\\|")
}

/// One report section: totals, the share of entries carrying most of the
/// time and a table sorted by duration.
pub fn section_table(column: &str, data: &BTreeMap<String, CountDuration>) -> String {
    if data.is_empty() {
        return "No data.\n\n".to_string();
    }

    let mut sorted: Vec<(&String, &CountDuration)> = data.iter().collect();
    sorted.sort_by(|a, b| b.1.duration.total_cmp(&a.1.duration).then(a.0.cmp(b.0)));
    let total: f64 = sorted.iter().map(|(_, v)| v.duration).sum();

    let mut out = String::new();
    out.push_str(&format!("Total Time: {}\n\n", format_time(total)));

    let mut majority_duration = 0.0;
    let mut majority_count = 0usize;
    for (_, v) in &sorted {
        majority_duration += v.duration;
        majority_count += 1;
        if majority_duration > total / 2.0 {
            break;
        }
    }
    let plural = majority_count != 1;
    out.push_str(&format!(
        "{majority_count}/{} item{} ({}) contribute{} to {} of the time\n\n",
        sorted.len(),
        if plural { "s" } else { "" },
        percent(majority_count as f64, sorted.len() as f64),
        if plural { "" } else { "s" },
        percent(majority_duration, total),
    ));

    push_table(&mut out, column, &sorted, total, TOP_ROWS);
    if sorted.len() > TOP_ROWS {
        out.push_str("<details>\n<summary>More...</summary>\n\n");
        push_table(&mut out, column, &sorted, total, DETAIL_ROWS);
        out.push_str("</details>\n\n");
    }
    out
}

fn push_table(
    out: &mut String,
    column: &str,
    rows: &[(&String, &CountDuration)],
    total: f64,
    max_rows: usize,
) {
    out.push_str(&format!("| {column} | % | Total Time | Avg. | Count |\n"));
    out.push_str("| --- | --- | --- | --- | --- |\n");
    for (key, v) in rows.iter().take(max_rows) {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(key),
            percent(v.duration, total),
            format_time(v.duration),
            format_time(v.average()),
            v.count,
        ));
    }
    out.push('\n');
}

fn project_symbols(symbols: &BTreeMap<String, CountDuration>) -> BTreeMap<String, CountDuration> {
    symbols
        .iter()
        .filter(|(symbol, _)| !is_std_symbol(symbol))
        .map(|(symbol, v)| (symbol.clone(), *v))
        .collect()
}

pub fn generate_report(report: &ReportData) -> String {
    let mut out = String::from("# Time Trace Report\n\n## Summary\n\n");
    out.push_str("| Step | % | Total Time | Avg. | Count |\n");
    out.push_str("| --- | --- | --- | --- | --- |\n");

    let compile = report.total_compile.duration;
    let steps = [
        ("Compile", &report.total_compile),
        ("1) Frontend", &report.total_frontend),
        ("1A) Parsing", &report.total_parsing),
        ("1B) Instantiations", &report.total_instantiations),
        ("2) Backend", &report.total_backend),
        ("2A) Code Generation", &report.total_codegen),
        ("2B) Optimization", &report.total_optimize),
    ];
    for (step, datum) in steps {
        if datum.count == 0 {
            continue;
        }
        out.push_str(&format!(
            "| {step} | {} | {} | {} | {} |\n",
            percent(datum.duration, compile),
            format_time(datum.duration),
            format_time(datum.average()),
            datum.count,
        ));
    }
    out.push('\n');

    out.push_str("## Files\n\n### Compile\n\n");
    out.push_str(&section_table("File", &report.file_compile));
    out.push_str("### Parse\n\n");
    out.push_str(&section_table("File", &report.file_parse));

    out.push_str("## Project Symbols\n\n");
    push_symbol_sections(
        &mut out,
        &project_symbols(&report.symbol_parse),
        &project_symbols(&report.symbol_instantiate),
        &project_symbols(&report.symbol_set_instantiate),
    );

    out.push_str("## All Symbols\n\n");
    push_symbol_sections(
        &mut out,
        &report.symbol_parse,
        &report.symbol_instantiate,
        &report.symbol_set_instantiate,
    );
    out
}

fn push_symbol_sections(
    out: &mut String,
    parse: &BTreeMap<String, CountDuration>,
    instantiate: &BTreeMap<String, CountDuration>,
    sets: &BTreeMap<String, CountDuration>,
) {
    out.push_str("### Parse\n\n");
    out.push_str(&section_table("Symbol", parse));
    out.push_str("### Instantiate\n\n");
    out.push_str(&section_table("Symbol", instantiate));
    out.push_str("### Instantiate Sets\n\n");
    out.push_str(&section_table("Symbol Set", sets));
}
