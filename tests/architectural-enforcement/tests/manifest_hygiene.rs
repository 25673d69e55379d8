//! Integration Test: Manifest Hygiene
//!
//! **Policy**: Every declared dependency is used by the crate's sources,
//! build profiles live in the workspace root, and feature lists do not
//! repeat what an umbrella feature already enables.

use std::fs;

use architectural_enforcement::workspace_root;

const MEMBERS: &[&str] = &["calc/core", "tui"];

/// `name = ...` entries of one `[section]`
fn section_entries(manifest: &str, section: &str) -> Vec<(String, String)> {
    let header = format!("[{section}]");
    let mut inside = false;
    let mut entries = Vec::new();
    for line in manifest.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            inside = line == header;
            continue;
        }
        if !inside || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, value)) = line.split_once('=') {
            entries.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    entries
}

fn read_manifest(member: &str) -> String {
    fs::read_to_string(workspace_root().join(member).join("Cargo.toml"))
        .unwrap_or_else(|e| panic!("{member}/Cargo.toml is readable: {e}"))
}

fn read_sources(member: &str) -> String {
    let mut sources = String::new();
    for entry in walkdir::WalkDir::new(workspace_root().join(member).join("src"))
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            sources.push_str(&fs::read_to_string(entry.path()).unwrap_or_default());
            sources.push('\n');
        }
    }
    sources
}

#[test]
fn test_section_parser() {
    let manifest = "[package]\nname = \"x\"\n\n[dependencies]\n# comment\nfoo = \"1\"\nbar-baz = { version = \"2\" }\n\n[dev-dependencies]\nqux = \"3\"\n";
    let names: Vec<String> = section_entries(manifest, "dependencies")
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["foo".to_string(), "bar-baz".to_string()]);
}

#[test]
fn test_every_dependency_is_used() {
    let mut unused = Vec::new();
    for member in MEMBERS {
        let sources = read_sources(member);
        for (name, _) in section_entries(&read_manifest(member), "dependencies") {
            let path = format!("{}::", name.replace('-', "_"));
            if !sources.contains(&path) {
                unused.push(format!("{member}: {name}"));
            }
        }
    }
    assert!(unused.is_empty(), "declared but never used: {unused:?}");
}

#[test]
fn test_profiles_only_in_workspace_root() {
    for member in MEMBERS {
        assert!(
            !read_manifest(member).contains("[profile."),
            "{member}/Cargo.toml declares a profile; cargo ignores it outside the root"
        );
    }
    let root = fs::read_to_string(workspace_root().join("Cargo.toml"))
        .expect("workspace Cargo.toml is readable");
    assert!(root.contains("[profile.release]"));
}

#[test]
fn test_tokio_full_is_not_repeated() {
    for member in MEMBERS {
        for (name, value) in section_entries(&read_manifest(member), "dependencies") {
            if name != "tokio" || !value.contains("\"full\"") {
                continue;
            }
            for covered in ["\"rt-multi-thread\"", "\"macros\"", "\"sync\"", "\"net\""] {
                assert!(
                    !value.contains(covered),
                    "{member}: tokio feature {covered} is already part of \"full\""
                );
            }
        }
    }
}
