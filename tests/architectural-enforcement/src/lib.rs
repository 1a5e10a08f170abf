//! Architectural Enforcement
//!
//! Source scanners backing the workspace's architectural tests. The auditor
//! runs on a single-threaded runtime, so one blocking call inside an async
//! function stalls the timer, the transports and the surface together.
//!
//! The scanners are line based. They skip comments, everything after a
//! `#[cfg(test)]` marker and the bodies of non-async functions (which run
//! before the runtime starts or are documented as synchronous).

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["auditor/core/src", "auditor/cli/src"];

/// Kind of blocking call found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    File,
    Network,
    Process,
    Http,
    Stdio,
}

impl ViolationKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::File => "Blocking file I/O",
            Self::Network => "Blocking network I/O",
            Self::Process => "Blocking process I/O",
            Self::Http => "Blocking HTTP client",
            Self::Stdio => "Blocking stdin/stdout in async",
        }
    }
}

/// One offending line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub kind: ViolationKind,
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.kind.describe(),
            self.text
        )
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Scan every production directory under `root`
pub fn scan_workspace(root: &Path) -> Vec<Violation> {
    PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| scan_directory(&root.join(dir)))
        .collect()
}

/// Scan all `.rs` files below `dir`; a missing directory yields nothing
pub fn scan_directory(dir: &Path) -> Vec<Violation> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut violations = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(entry.path()) {
            violations.extend(
                scan_source(&content)
                    .into_iter()
                    .map(|(line, kind, text)| Violation {
                        path: entry.path().to_path_buf(),
                        line,
                        kind,
                        text,
                    }),
            );
        }
    }
    violations
}

/// Scan one source file, returning `(line number, kind, trimmed line)`
pub fn scan_source(content: &str) -> Vec<(usize, ViolationKind, String)> {
    let lines: Vec<&str> = content.lines().collect();
    let mut found = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }

        let code = line.split("//").next().unwrap_or(line);
        let context = enclosing_function(&lines, idx);
        if context == FnContext::Sync {
            continue;
        }

        let kind = if code.contains("std::fs::") || code.contains("use std::fs") {
            Some(ViolationKind::File)
        } else if code.contains("std::net::") || code.contains("use std::net") {
            Some(ViolationKind::Network)
        } else if code.contains("std::process::Command") {
            Some(ViolationKind::Process)
        } else if code.contains("reqwest::blocking") {
            Some(ViolationKind::Http)
        } else if (code.contains("std::io::stdin()") || code.contains("std::io::stdout()"))
            && context == FnContext::Async
        {
            Some(ViolationKind::Stdio)
        } else {
            None
        };

        if let Some(kind) = kind {
            found.push((idx + 1, kind, line.trim().to_string()));
        }
    }
    found
}

/// What kind of function a line sits in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnContext {
    Async,
    Sync,
    /// Module level, or the scan hit an `impl`/`mod` boundary
    None,
}

/// Walk backwards to the nearest function signature
pub fn enclosing_function(lines: &[&str], current_idx: usize) -> FnContext {
    for i in (0..=current_idx).rev() {
        let line = lines[i].trim();

        if let Some(is_async) = parse_fn_signature(line) {
            return if is_async { FnContext::Async } else { FnContext::Sync };
        }

        if line.starts_with("mod ")
            || line.starts_with("pub mod ")
            || (line.starts_with("impl") && line.contains('{'))
        {
            return FnContext::None;
        }
    }
    FnContext::None
}

/// Recognize a function signature, returning whether it is async
///
/// Handles `pub`, `pub(crate)` and `pub(super)` visibility.
pub fn parse_fn_signature(line: &str) -> Option<bool> {
    let mut rest = line;
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }

    let (is_async, rest) = match rest.strip_prefix("async ") {
        Some(stripped) => (true, stripped),
        None => (false, rest),
    };

    rest.starts_with("fn ").then_some(is_async)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_detection() {
        assert_eq!(parse_fn_signature("fn main() {"), Some(false));
        assert_eq!(parse_fn_signature("pub async fn submit(&mut self) {"), Some(true));
        assert_eq!(parse_fn_signature("pub(crate) fn format_number(v: f64) {"), Some(false));
        assert_eq!(parse_fn_signature("let f = fn_ptr;"), None);
    }

    #[test]
    fn test_blocking_call_in_async_function() {
        let source = "async fn bad() {\n    let s = std::fs::read_to_string(\"x\");\n}\n";
        let found = scan_source(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 2);
        assert_eq!(found[0].1, ViolationKind::File);
    }

    #[test]
    fn test_sync_function_is_allowed() {
        let source = "pub fn load() {\n    let s = std::fs::read_to_string(\"config.toml\");\n}\n";
        assert!(scan_source(source).is_empty());
    }

    #[test]
    fn test_module_level_import_is_flagged() {
        let found = scan_source("use std::net::TcpStream;\n");
        assert_eq!(found[0].1, ViolationKind::Network);
    }

    #[test]
    fn test_test_module_is_skipped() {
        let source = "#[cfg(test)]\nmod tests {\n    async fn t() { std::fs::write(\"a\", \"b\"); }\n}\n";
        assert!(scan_source(source).is_empty());
    }

    #[test]
    fn test_stdout_only_flagged_in_async() {
        let sync = "fn print() {\n    let out = std::io::stdout();\n}\n";
        let async_src = "async fn print() {\n    let out = std::io::stdout();\n}\n";
        assert!(scan_source(sync).is_empty());
        assert_eq!(scan_source(async_src)[0].1, ViolationKind::Stdio);
    }

    #[test]
    fn test_comments_are_ignored() {
        let source = "async fn f() {\n    // std::fs::read is not used here\n}\n";
        assert!(scan_source(source).is_empty());
    }
}
