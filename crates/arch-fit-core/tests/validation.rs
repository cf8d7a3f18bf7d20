//! End-to-end validation scenarios against a YAML registry.

use arch_fit_core::config::UntaggedPolicy;
use arch_fit_core::{
    registry, Config, RunMode, ValidationCache, ValidationEngine, ValidationStatus,
};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const REGISTRY: &str = r#"
nodes:
  base:
    constraints:
      - { rule: forbid_pattern, value: "console\\.log", severity: warning, why: "use the logger" }
  core.engine:
    inherits: base
    constraints:
      - rule: forbid_import
        value: [axios, lodash]
        severity: error
        why: "the engine stays I/O free"
  core.script:
    inherits: base
    constraints:
      - { rule: allow_pattern, value: "console\\.log" }
  core.service:
    constraints:
      - rule: forbid_import
        value: [axios]
        condition: { has_decorator: Injectable }
  app.main:
    singleton: true
  core.cyclic:
    constraints:
      - { rule: forbid_circular_deps }
"#;

fn engine_with(root: &Path, config: Config) -> ValidationEngine {
    ValidationEngine::builder()
        .root(root)
        .config(config)
        .registry(registry::parse(REGISTRY).unwrap())
        .today(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        .build()
        .unwrap()
}

fn engine() -> ValidationEngine {
    engine_with(Path::new("/project"), Config::default())
}

fn write(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn resolution_is_deterministic() {
    let engine = engine();
    let first = engine.resolver().resolve("core.engine");
    let second = engine.resolver().resolve("core.engine");
    assert_eq!(format!("{first:?}"), format!("{second:?}"));

    let arch = first.architecture.as_ref().unwrap();
    assert_eq!(arch.inheritance_chain, vec!["base", "core.engine"]);
    let rules: Vec<&str> = arch.constraints.iter().map(|c| c.rule.as_str()).collect();
    assert!(rules.contains(&"forbid_import"));
    assert!(rules.contains(&"forbid_pattern"));
}

#[test]
fn forbidden_import_fails_with_why() {
    let result = engine().validate_content(
        Path::new("src/core/engine.ts"),
        "// @arch core.engine\nimport axios from 'axios';\n",
    );
    assert_eq!(result.status, ValidationStatus::Fail);
    let violation = &result.violations[0];
    assert_eq!(violation.rule, "forbid_import");
    assert_eq!(violation.location.line, 2);
    assert_eq!(violation.why.as_deref(), Some("the engine stays I/O free"));
}

#[test]
fn allow_pattern_cancels_inherited_forbid() {
    let engine = engine();
    let content = "console.log('hi');\n";

    let engine_file = engine.validate_content(
        Path::new("src/a.ts"),
        &format!("// @arch core.engine\n{content}"),
    );
    assert_eq!(engine_file.status, ValidationStatus::Warn);
    assert!(engine_file.has_rule("forbid_pattern"));

    let script_file = engine.validate_content(
        Path::new("src/b.ts"),
        &format!("// @arch core.script\n{content}"),
    );
    assert_eq!(script_file.status, ValidationStatus::Pass);
}

#[test]
fn condition_gates_constraint() {
    let engine = engine();
    let plain = engine.validate_content(
        Path::new("src/plain.ts"),
        "// @arch core.service\nimport axios from 'axios';\nexport class Plain {}\n",
    );
    assert_eq!(plain.status, ValidationStatus::Pass);

    let injectable = engine.validate_content(
        Path::new("src/injectable.ts"),
        "// @arch core.service\nimport axios from 'axios';\n@Injectable()\nexport class Service {}\n",
    );
    assert_eq!(injectable.status, ValidationStatus::Fail);
}

#[test]
fn active_override_and_expired_override() {
    let engine = engine();
    let active = engine.validate_content(
        Path::new("src/a.ts"),
        "/**\n * @arch core.engine\n * @override forbid_import:axios\n * @reason \"legacy\"\n * @expires 2026-04-30\n */\nimport axios from 'axios';\n",
    );
    assert_eq!(active.status, ValidationStatus::Pass);
    assert_eq!(active.overrides_active.len(), 1);
    assert_eq!(active.overrides_active[0].reason, "legacy");

    let expired = engine.validate_content(
        Path::new("src/b.ts"),
        "/**\n * @arch core.engine\n * @override forbid_import:axios\n * @reason \"legacy\"\n * @expires 2026-01-31\n */\nimport axios from 'axios';\n",
    );
    assert_eq!(expired.status, ValidationStatus::Fail);
    assert!(expired.has_rule("expired_override"));
    assert!(expired.has_rule("forbid_import"));
}

#[test]
fn untagged_policy_from_config() {
    let mut config: Config = Config::parse("[files.untagged]\npolicy = \"deny\"\n").unwrap();
    assert_eq!(config.files.untagged.policy, UntaggedPolicy::Deny);
    let denied = engine_with(Path::new("/project"), config.clone())
        .validate_content(Path::new("src/a.ts"), "export const a = 1;\n");
    assert_eq!(denied.status, ValidationStatus::Fail);
    assert!(denied.has_rule("missing_arch_tag"));

    config.files.untagged.policy = UntaggedPolicy::Allow;
    let allowed = engine_with(Path::new("/project"), config)
        .validate_content(Path::new("src/a.ts"), "export const a = 1;\n");
    assert_eq!(allowed.status, ValidationStatus::Pass);
}

#[test]
fn singleton_used_twice_fails_both() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write(dir.path(), "src/main.ts", "// @arch app.main\n"),
        write(dir.path(), "src/main2.ts", "// @arch app.main\n"),
        write(dir.path(), "src/other.ts", "// @arch core.engine\n"),
    ];
    let batch = engine_with(dir.path(), Config::default())
        .validate_files(&files)
        .unwrap();
    assert_eq!(batch.summary.failed, 2);
    assert!(batch.results[0].has_rule("singleton_violation"));
    assert!(batch.results[1].has_rule("singleton_violation"));
    assert_eq!(batch.results[2].status, ValidationStatus::Pass);
}

#[test]
fn every_file_on_an_import_cycle_fails() {
    // a <-> b closes first; c is on a -> c -> b -> a; d only imports into it.
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let files = vec![
        write(root, "a.ts", "// @arch core.cyclic\nimport './b';\nimport './c';\n"),
        write(root, "b.ts", "// @arch core.cyclic\nimport './a';\n"),
        write(root, "c.ts", "// @arch core.cyclic\nimport './b';\n"),
        write(root, "d.ts", "// @arch core.cyclic\nimport './c';\n"),
    ];
    let batch = engine_with(root, Config::default())
        .validate_files(&files)
        .unwrap();
    let statuses: Vec<ValidationStatus> = batch.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ValidationStatus::Fail,
            ValidationStatus::Fail,
            ValidationStatus::Fail,
            ValidationStatus::Pass,
        ]
    );
    assert!(batch.results[2].violations[0]
        .message
        .ends_with("among: a.ts, b.ts, c.ts"));
}

#[test]
fn dotted_npm_package_is_not_its_prefix_package() {
    let result = engine().validate_content(
        Path::new("src/core/engine.ts"),
        "// @arch core.engine\nimport debounce from 'lodash.debounce';\nimport get from 'lodash/get';\n",
    );
    let values: Vec<&str> = result.violations.iter().map(|v| v.value.as_str()).collect();
    assert_eq!(values, vec!["lodash"]);
    assert_eq!(result.violations[0].location.line, 3);
}

#[test]
fn cached_run_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let files = vec![
        write(root, "src/a.ts", "// @arch core.engine\nimport axios from 'axios';\n"),
        write(root, "src/b.ts", "// @arch core.engine\nexport const b = 1;\n"),
    ];
    let engine = engine_with(root, Config::default());
    let cache_path = root.join(".arch/cache/validation.json");

    let mut cache = ValidationCache::new(&cache_path, "fp");
    let first = engine
        .validate_cached(&files, &mut cache, RunMode::Incremental)
        .unwrap();
    cache.save().unwrap();

    let mut reloaded = ValidationCache::load(&cache_path, "fp").unwrap();
    let second = engine
        .validate_cached(&files, &mut reloaded, RunMode::Incremental)
        .unwrap();
    assert_eq!(second.summary.cache_hits, 2);
    assert_eq!(
        serde_json::to_value(&first.results).unwrap(),
        serde_json::to_value(&second.results).unwrap()
    );

    let mut stale = ValidationCache::load(&cache_path, "other").unwrap();
    let third = engine
        .validate_cached(&files, &mut stale, RunMode::Incremental)
        .unwrap();
    assert_eq!(third.summary.cache_hits, 0);
}

#[test]
fn incremental_depth_bounds_revalidation() {
    for (depth, expected_hits) in [(1, 2), (2, 1)] {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(root, "a.ts", "// @arch core.engine\nimport { b } from './b';\n"),
            write(root, "b.ts", "// @arch core.engine\nimport { c } from './c';\n"),
            write(root, "c.ts", "// @arch core.engine\nexport const c = 1;\n"),
            write(root, "d.ts", "// @arch core.engine\nexport const d = 1;\n"),
        ];
        let mut config = Config::default();
        config.validation.incremental_depth = depth;
        let engine = engine_with(root, config);
        let mut cache = ValidationCache::new(root.join("cache.json"), "fp");
        engine
            .validate_cached(&files, &mut cache, RunMode::Incremental)
            .unwrap();

        write(root, "c.ts", "// @arch core.engine\nexport const c = 2;\n");
        let batch = engine
            .validate_cached(&files, &mut cache, RunMode::Incremental)
            .unwrap();
        assert_eq!(batch.summary.cache_hits, expected_hits, "depth {depth}");
    }
}
