use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions of translation units clang writes a `-ftime-trace` file for.
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cp", "cpp", "cxx", "c++", "C", "cu", "m", "mm"];

const OBJECT_EXTENSIONS: &[&str] = &["o", "obj"];

/// Find every time-trace file under `build_dir`, sorted by path.
///
/// `X.cpp.json` only counts while its object file `X.cpp.o` (or `.obj`)
/// still sits next to it. Traces left behind by a translation unit that is
/// no longer built are ignored.
pub fn find_trace_files(build_dir: &Path) -> Vec<PathBuf> {
    let mut traces: Vec<PathBuf> = WalkDir::new(build_dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                let path = err.path().unwrap_or(build_dir);
                warn!(path = %path.display(), error = %err, "skipping unreadable build entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| is_current_trace(path))
        .collect();
    traces.sort();
    debug!(count = traces.len(), dir = %build_dir.display(), "found trace files");
    traces
}

fn is_current_trace(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(unit) = name.strip_suffix(".json") else {
        return false;
    };
    let Some((stem, ext)) = unit.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() || !SOURCE_EXTENSIONS.contains(&ext) {
        return false;
    }
    OBJECT_EXTENSIONS
        .iter()
        .any(|obj| path.with_file_name(format!("{unit}.{obj}")).is_file())
}

/// Look for `compile_commands.json` in `dir` and then in each of its
/// ancestors.
pub fn find_compile_commands(dir: &Path) -> Option<PathBuf> {
    let start = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    start
        .ancestors()
        .map(|ancestor| ancestor.join("compile_commands.json"))
        .find(|candidate| candidate.is_file())
}
