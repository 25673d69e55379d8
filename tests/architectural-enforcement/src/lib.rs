//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code
//! - No blocking locks on the computation/presentation handshake
//! - The engine core stays free of UI dependencies
//! - Manifests declare only used dependencies and no member profiles
//!
//! The helpers below are shared by the tests in `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, resolved from this crate's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// A forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line_number: usize,
    pub line: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line_number, self.line)
    }
}

/// Production lines of a source file, 1-based, with comments stripped
///
/// Everything from the first `#[cfg(test)]` on is test code and skipped.
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect()
}

/// Scan one source text for any of `patterns`
pub fn scan_source(path: &Path, content: &str, patterns: &[&str]) -> Vec<Violation> {
    production_lines(content)
        .into_iter()
        .filter(|(_, code)| patterns.iter().any(|pattern| code.contains(pattern)))
        .map(|(line_number, code)| Violation {
            path: path.to_path_buf(),
            line_number,
            line: code.trim().to_string(),
        })
        .collect()
}

/// Scan every `.rs` file under `dir` (relative to the workspace root)
///
/// Panics if the directory is missing, so a renamed crate cannot silently
/// pass.
pub fn scan_directory(dir: &str, patterns: &[&str]) -> Vec<Violation> {
    let root = workspace_root().join(dir);
    assert!(root.is_dir(), "{} does not exist", root.display());

    let mut violations = Vec::new();
    for entry in walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        let Ok(content) = fs::read_to_string(entry.path()) else {
            continue;
        };
        violations.extend(scan_source(entry.path(), &content, patterns));
    }
    violations
}

/// Print violations and fail
pub fn report(violations: &[Violation], headline: &str, advice: &[&str]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {headline}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    for line in advice {
        eprintln!("  {line}");
    }
    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_modules_and_comments_are_skipped() {
        let source = [
            "use std::sync::Mutex; // forbidden",
            "// std::thread::sleep(d) in a comment",
            "fn run() {}",
            "#[cfg(test)]",
            "mod tests { fn t() { std::thread::sleep(d); } }",
        ]
        .join("\n");

        let found = scan_source(Path::new("x.rs"), &source, &["sleep(", "Mutex"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line_number, 1);
        assert_eq!(found[0].line, "use std::sync::Mutex;");
    }

    #[test]
    fn test_workspace_root_contains_crates() {
        assert!(workspace_root().join("calc").join("core").is_dir());
        assert!(workspace_root().join("tui").is_dir());
    }
}
