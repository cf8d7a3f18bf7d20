//! End-to-end runs over a project on disk.

use arch_fit::{plan, run, ChangeKind, Plan, PlannedChange, RunMode};
use std::path::{Path, PathBuf};

const REGISTRY: &str = r#"
nodes:
  core:
    constraints:
      - rule: forbid_import
        value: ["std::fs", "axios", "com.example.infra"]
        severity: error
        why: "core stays free of I/O"
"#;

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, ".arch/registry.yaml", REGISTRY);
    write(root, "src/lib.rs", "//! @arch core\nuse std::fs;\n");
    write(root, "src/clean.rs", "//! @arch core\npub fn ok() {}\n");
    write(
        root,
        "src/app.ts",
        "// @arch core\nimport axios from 'axios';\nimport { u } from './util';\n",
    );
    write(root, "src/util.ts", "// @arch core\nexport const u = 1;\n");
    write(root, "src/Main.kt", "// @arch core\nimport com.example.infra.Repo\n");
    dir
}

#[test]
fn full_run_covers_every_language() {
    let dir = project();
    let batch = run(dir.path(), RunMode::Full).unwrap();
    assert_eq!(batch.summary.total_files, 5);
    assert_eq!(batch.summary.failed, 3);
    assert_eq!(batch.summary.passed, 2);
    assert!(batch.has_failures());

    let failed: Vec<PathBuf> = batch
        .results
        .iter()
        .filter(|r| r.has_rule("forbid_import"))
        .map(|r| r.file.clone())
        .collect();
    assert!(failed.contains(&PathBuf::from("src/lib.rs")));
    assert!(failed.contains(&PathBuf::from("src/Main.kt")));
    assert!(failed.contains(&PathBuf::from("src/app.ts")));
}

#[test]
fn incremental_run_reuses_cache_file() {
    let dir = project();
    let root = dir.path();
    run(root, RunMode::Incremental).unwrap();
    assert!(root.join(".arch/cache/validation.json").exists());

    let second = run(root, RunMode::Incremental).unwrap();
    assert_eq!(second.summary.cache_hits, 5);
    assert_eq!(second.summary.failed, 3);

    write(root, "src/clean.rs", "//! @arch core\nuse std::fs;\n");
    let third = run(root, RunMode::Incremental).unwrap();
    assert_eq!(third.summary.cache_hits, 4);
    assert_eq!(third.summary.failed, 4);
}

#[test]
fn registry_edit_discards_cache() {
    let dir = project();
    let root = dir.path();
    run(root, RunMode::Incremental).unwrap();

    write(root, ".arch/registry.yaml", &format!("{REGISTRY}  extra:\n    singleton: true\n"));
    let batch = run(root, RunMode::Incremental).unwrap();
    assert_eq!(batch.summary.cache_hits, 0);
}

#[test]
fn cache_can_be_disabled() {
    let dir = project();
    let root = dir.path();
    write(root, "arch-fit.toml", "[cache]\nenabled = false\n");
    let batch = run(root, RunMode::Incremental).unwrap();
    assert_eq!(batch.summary.total_files, 5);
    assert!(!root.join(".arch/cache/validation.json").exists());
}

#[test]
fn missing_registry_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(dir.path(), RunMode::Full).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read registry"));
}

#[test]
fn plan_reports_violations_and_impact() {
    let dir = project();
    let proposed = Plan {
        changes: vec![
            PlannedChange::new(ChangeKind::Create, "src/new.ts")
                .with_arch("core")
                .with_import("axios"),
            PlannedChange::new(ChangeKind::Delete, "src/util.ts"),
        ],
    };
    let result = plan(dir.path(), &proposed).unwrap();
    assert!(!result.valid);
    assert_eq!(result.violations[0].rule, "forbid_import");
    assert_eq!(result.impacted_files, vec![PathBuf::from("src/app.ts")]);
}
