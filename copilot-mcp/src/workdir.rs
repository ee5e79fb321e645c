//! Working-directory resolution for CLI invocations.
//!
//! Priority chain, first resolvable source wins:
//! 1. explicit directory argument
//! 2. environment variables, in fixed order
//! 3. `@path` references embedded in the prompt, walked up to a project root
//! 4. the process's own working directory
//!
//! The resolver never fails; step 4 always terminates the chain. Each step
//! logs which source won, for diagnosability.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Environment variables consulted for a working-directory hint, in order.
pub const CWD_ENV_VARS: &[&str] = &["COPILOT_MCP_CWD", "COPILOT_MCP_WORKING_DIR"];

/// Manifest files that mark a project root across common ecosystems.
const PROJECT_ROOT_MARKERS: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "go.mod",
    "pyproject.toml",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
    ".git",
];

/// How many parent levels the project-root walk inspects.
const MAX_WALK_UP: usize = 10;

/// `@`-marker path references: quoted (spaces allowed) or unquoted.
static AT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@"([^"]+)"|@(\S+)"#).expect("valid pattern"));

/// Resolve the effective working directory for an invocation.
pub fn resolve(explicit: Option<&str>, prompt: Option<&str>) -> PathBuf {
    if let Some(dir) = explicit.and_then(nearest_existing_dir) {
        tracing::debug!(dir = %dir.display(), "working dir from explicit argument");
        return dir;
    }

    for var in CWD_ENV_VARS {
        if let Some(dir) = std::env::var(var).ok().as_deref().and_then(nearest_existing_dir) {
            tracing::debug!(dir = %dir.display(), env = var, "working dir from environment");
            return dir;
        }
    }

    if let Some(dir) = prompt.and_then(dir_from_prompt_paths) {
        tracing::debug!(dir = %dir.display(), "working dir from prompt path reference");
        return dir;
    }

    let fallback = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    tracing::debug!(dir = %fallback.display(), "working dir from process default");
    fallback
}

/// Validate a candidate: an existing directory wins as-is; an existing file
/// resolves to its parent directory.
fn nearest_existing_dir(candidate: &str) -> Option<PathBuf> {
    let path = Path::new(candidate);
    if path.is_dir() {
        return Some(path.to_path_buf());
    }
    if path.is_file() {
        return path.parent().filter(|p| p.is_dir()).map(Path::to_path_buf);
    }
    None
}

/// Scan the prompt for `@path` references and derive a directory from the
/// first absolute, existing one, preferring its project root.
fn dir_from_prompt_paths(prompt: &str) -> Option<PathBuf> {
    for caps in AT_PATH.captures_iter(prompt) {
        let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
        let path = Path::new(raw);
        if !path.is_absolute() || !path.exists() {
            continue;
        }
        let base = if path.is_dir() {
            path.to_path_buf()
        } else {
            path.parent()?.to_path_buf()
        };
        return Some(find_project_root(&base).unwrap_or(base));
    }
    None
}

/// Walk upward from `start` looking for a project-root marker file.
fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    for _ in 0..MAX_WALK_UP {
        if PROJECT_ROOT_MARKERS.iter().any(|m| current.join(m).exists()) {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
    None
}
