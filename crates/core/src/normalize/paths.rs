//! Path rewriting for event details and translation unit names.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::parsers::compile_commands::{CompileCommand, IncludeKind};

/// Search roots every compiler on a Unix-like host consults.
const DEFAULT_SYSTEM_ROOTS: &[&str] = &[
    "/usr/include",
    "/usr/local/include",
    "/usr/include/c++",
    "/usr/lib",
];

fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r":[0-9]+:[0-9]+$"));
static STD_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^[a-z0-9_]+$"));
static STDLIB_PREFIXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            static_regex(r"^llvm-[0-9]+/lib/clang/[0-9]+/include/"),
            "<clang>/",
        ),
        (static_regex(r"^x86_64-linux-gnu/"), "<glibc>/"),
        (static_regex(r"^c\+\+/[0-9]+/"), "<libstdc++>/"),
    ]
});

/// Rewrites absolute paths found in trace events into short names relative
/// to the project, or to the include root they were found in.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    source_dir: PathBuf,
    build_dir: PathBuf,
    project_roots: Vec<PathBuf>,
    system_roots: Vec<PathBuf>,
}

impl PathNormalizer {
    pub fn new(source_dir: impl AsRef<Path>, build_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: absolute(source_dir.as_ref()),
            build_dir: absolute(build_dir.as_ref()),
            project_roots: Vec::new(),
            system_roots: Vec::new(),
        }
    }

    pub fn add_project_root(&mut self, root: impl AsRef<Path>) {
        push_unique(&mut self.project_roots, absolute(root.as_ref()));
    }

    pub fn add_system_root(&mut self, root: impl AsRef<Path>) {
        push_unique(&mut self.system_roots, absolute(root.as_ref()));
    }

    /// Register the include paths named by every compile command.
    pub fn add_compile_commands(&mut self, commands: &[CompileCommand]) {
        for command in commands {
            for (kind, path) in command.include_paths() {
                match kind {
                    IncludeKind::Project => self.add_project_root(path),
                    IncludeKind::System => self.add_system_root(path),
                }
            }
        }
    }

    /// Append the host's default system include roots.
    pub fn with_default_system_roots(mut self) -> Self {
        for root in DEFAULT_SYSTEM_ROOTS {
            self.add_system_root(root);
        }
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Shorten the file path in an event detail.
    ///
    /// `/usr/include/stdio.h` becomes `<stdio.h>`, a header of the project
    /// becomes its path relative to the source directory and bare standard
    /// headers such as `vector` are bracketed.
    pub fn normalize_detail(&self, detail: &str) -> String {
        let mut detail = match detail.find(" <Spelling=") {
            Some(index) => &detail[..index],
            None => detail,
        };
        if let Some(found) = LOCATION_RE.find(detail) {
            detail = &detail[..found.start()];
        }
        let unified = detail.replace('\\', "/");

        let (mut out, system) = self.relativize(&unified);
        let mut prefixed = false;
        for (re, replacement) in STDLIB_PREFIXES.iter() {
            if re.is_match(&out) {
                out = re.replacen(&out, 1, *replacement).into_owned();
                prefixed = true;
            }
        }

        if system && !prefixed {
            return format!("<{out}>");
        }
        if is_std_header(&out) {
            return format!("<{out}>");
        }
        out
    }

    /// Path relative to the first root containing it, and whether that root
    /// is a system include root.
    fn relativize(&self, detail: &str) -> (String, bool) {
        let path = Path::new(detail);
        if !path.is_absolute() {
            return (detail.to_string(), false);
        }
        let path = lexical_normalize(path);

        let project = [&self.source_dir, &self.build_dir]
            .into_iter()
            .chain(&self.project_roots);
        for root in project {
            if let Some(rel) = strip_subpath(&path, root) {
                return (rel, false);
            }
        }
        for root in &self.system_roots {
            if let Some(rel) = strip_subpath(&path, root) {
                return (rel, true);
            }
        }
        (slash_string(&path), false)
    }

    /// Short name of the translation unit a trace file belongs to.
    ///
    /// `build/CMakeFiles/app.dir/src/main.cpp.json` becomes `src/main.cpp`
    /// when the compile command database knows the source file, or
    /// `src/main.cpp` after dropping the CMake bookkeeping directories
    /// otherwise.
    pub fn display_filename(&self, trace_file: &Path, commands: &[CompileCommand]) -> String {
        let trace_file = absolute(trace_file);
        let relative = strip_subpath(&trace_file, &self.build_dir)
            .unwrap_or_else(|| slash_string(&trace_file));
        let unit = relative.strip_suffix(".json").unwrap_or(&relative).to_string();

        let name = commands
            .iter()
            .find(|command| command.command_line().contains(unit.as_str()))
            .map(|command| self.source_relative(command))
            .unwrap_or(unit);

        name.split('/')
            .filter(|segment| *segment != "CMakeFiles" && !segment.ends_with(".dir"))
            .collect::<Vec<_>>()
            .join("/")
    }

    fn source_relative(&self, command: &CompileCommand) -> String {
        let file = Path::new(&command.file);
        let file = match &command.directory {
            Some(dir) if file.is_relative() => Path::new(dir).join(file),
            _ => file.to_path_buf(),
        };
        let file = lexical_normalize(&absolute(&file));
        strip_subpath(&file, &self.source_dir).unwrap_or_else(|| slash_string(&file))
    }
}

/// A bare standard library header name: lowercase, no extension, no
/// directory.
pub fn is_std_header(name: &str) -> bool {
    !name.contains('/') && !name.contains('.') && STD_HEADER_RE.is_match(name)
}

/// True when `child` lies strictly below `parent`.
pub fn is_subpath(child: &Path, parent: &Path) -> bool {
    strip_subpath(&lexical_normalize(child), &lexical_normalize(parent)).is_some()
}

fn strip_subpath(child: &Path, parent: &Path) -> Option<String> {
    let rel = child.strip_prefix(parent).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(slash_string(rel))
}

fn absolute(path: &Path) -> PathBuf {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    lexical_normalize(&abs)
}

/// Resolve `.` and `..` components without touching the file system.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn slash_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn push_unique(roots: &mut Vec<PathBuf>, root: PathBuf) {
    if !roots.contains(&root) {
        roots.push(root);
    }
}
