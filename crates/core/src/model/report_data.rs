use std::collections::BTreeMap;

use serde::Serialize;

use super::CountDuration;

/// Compile cost accumulated while scanning time-trace events.
///
/// Totals are per compiler phase; the keyed maps break cost down by file
/// or symbol. `symbol_set_instantiate` is derived: every instantiation is
/// also counted under its [`template_set`] key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportData {
    pub total_compile: CountDuration,
    pub total_frontend: CountDuration,
    pub total_parsing: CountDuration,
    pub total_instantiations: CountDuration,
    pub total_backend: CountDuration,
    pub total_codegen: CountDuration,
    pub total_optimize: CountDuration,

    pub file_compile: BTreeMap<String, CountDuration>,
    pub file_parse: BTreeMap<String, CountDuration>,

    pub symbol_parse: BTreeMap<String, CountDuration>,
    pub symbol_instantiate: BTreeMap<String, CountDuration>,
    pub symbol_set_instantiate: BTreeMap<String, CountDuration>,
}

impl ReportData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file_compile_data(&mut self, file: &str, count: u64, duration: f64) {
        accumulate(&mut self.file_compile, file, count, duration);
    }

    pub fn add_file_parse_data(&mut self, file: &str, count: u64, duration: f64) {
        accumulate(&mut self.file_parse, file, count, duration);
    }

    pub fn add_symbol_parse_data(&mut self, symbol: &str, count: u64, duration: f64) {
        accumulate(&mut self.symbol_parse, symbol, count, duration);
    }

    pub fn add_symbol_instantiate_data(&mut self, symbol: &str, count: u64, duration: f64) {
        accumulate(&mut self.symbol_instantiate, symbol, count, duration);
        let set = template_set(symbol);
        accumulate(&mut self.symbol_set_instantiate, &set, count, duration);
    }

    /// Fold another partial report into this one.
    pub fn merge(&mut self, other: ReportData) {
        self.total_compile += other.total_compile;
        self.total_frontend += other.total_frontend;
        self.total_parsing += other.total_parsing;
        self.total_instantiations += other.total_instantiations;
        self.total_backend += other.total_backend;
        self.total_codegen += other.total_codegen;
        self.total_optimize += other.total_optimize;

        merge_map(&mut self.file_compile, other.file_compile);
        merge_map(&mut self.file_parse, other.file_parse);
        merge_map(&mut self.symbol_parse, other.symbol_parse);
        merge_map(&mut self.symbol_instantiate, other.symbol_instantiate);
        merge_map(&mut self.symbol_set_instantiate, other.symbol_set_instantiate);
    }
}

fn accumulate(map: &mut BTreeMap<String, CountDuration>, key: &str, count: u64, duration: f64) {
    match map.get_mut(key) {
        Some(entry) => entry.update(count, duration),
        None => {
            map.insert(key.to_string(), CountDuration::new(count, duration));
        }
    }
}

fn merge_map(into: &mut BTreeMap<String, CountDuration>, from: BTreeMap<String, CountDuration>) {
    for (key, value) in from {
        *into.entry(key).or_default() += value;
    }
}

/// Collapse template arguments to `$`: `std::vector<int>::push_back`
/// becomes `std::vector<$>::push_back`. Nested brackets collapse with
/// their outermost pair.
pub fn template_set(symbol: &str) -> String {
    let mut level: usize = 0;
    let mut out = String::with_capacity(symbol.len());
    for c in symbol.chars() {
        match c {
            '<' => {
                if level == 0 {
                    out.push_str("<$");
                }
                level += 1;
            }
            '>' if level > 0 => {
                level -= 1;
                if level == 0 {
                    out.push('>');
                }
            }
            _ if level == 0 => out.push(c),
            _ => {}
        }
    }
    out
}
