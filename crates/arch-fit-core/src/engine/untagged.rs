//! Handling of files without an `@arch` tag.

use crate::config::UntaggedPolicy;
use crate::constraints::matching::slash_path;
use crate::types::{EngineRule, Location, Severity, ValidationResult};
use std::path::Path;

const DEFAULT_HINT: &str = "Add `@arch <id>` to the file's leading comment";

/// Result for an untagged file under `policy`.
pub(crate) fn untagged_result(file: &Path, policy: UntaggedPolicy) -> ValidationResult {
    let mut result = ValidationResult::new(file, None);
    let severity = match policy {
        UntaggedPolicy::Allow => return result,
        UntaggedPolicy::Warn => Severity::Warning,
        UntaggedPolicy::Deny => Severity::Error,
    };
    result.push(
        EngineRule::MissingArchTag
            .violation(severity, Location::file_level(file), "File has no @arch tag")
            .with_fix_hint(hint_for(file)),
    );
    result.compute_status();
    result
}

/// Picks a hint from path conventions.
fn hint_for(file: &Path) -> &'static str {
    let path = slash_path(file).to_lowercase();
    let name = path.rsplit('/').next().unwrap_or(path.as_str());
    let in_dir = |dir: &str| {
        path.starts_with(&format!("{dir}/")) || path.contains(&format!("/{dir}/"))
    };

    if ["public", "static", "assets"].iter().any(|d| in_dir(d)) {
        "Static assets rarely need an architecture; exclude the directory in [files.scan]"
    } else if name.contains(".generated.") || name.contains(".gen.") || in_dir("generated") {
        "Generated files should be excluded in [files.scan] rather than tagged"
    } else if name.contains(".worker.") || name.starts_with("worker.") {
        "Workers run in their own context; tag them with a dedicated worker architecture"
    } else {
        DEFAULT_HINT
    }
}
