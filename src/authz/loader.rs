use std::io;
use std::path::{Path, PathBuf};

use crate::authz::errors::PolicyError;
use crate::authz::store::RuleStore;
use crate::settings::PolicyOpts;

/// Counts from one load, for logging and callers that want to report them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Files merged into the store, including the policy file.
    pub files: usize,
    /// Directory entries that could not be read or parsed.
    pub skipped: usize,
    /// Rules in the resulting store.
    pub rules: usize,
}

/// Build a store from the configured sources.
///
/// The policy file is merged into `base` when `base` has rules, otherwise it
/// starts a fresh store. Directories follow in order, each file in sorted
/// path order; later definitions replace earlier ones. Failure to read or
/// parse the policy file is an error; failures inside directories are logged
/// and the file is skipped.
pub fn load_rules(
    base: Option<&RuleStore>,
    opts: &PolicyOpts,
) -> Result<(RuleStore, LoadSummary), PolicyError> {
    let mut store = match base {
        Some(existing) if !existing.is_empty() => existing.clone(),
        _ => RuleStore::default(),
    };
    let mut summary = LoadSummary::default();

    if !opts.policy_file.is_empty() {
        load_file(&mut store, Path::new(&opts.policy_file))?;
        summary.files += 1;
    }

    for dir in &opts.policy_dirs {
        load_directory(&mut store, dir, &mut summary);
    }

    store.set_default_rule(opts.policy_default_rule.clone());
    summary.rules = store.len();

    tracing::info!(
        files = summary.files,
        skipped = summary.skipped,
        rules = summary.rules,
        default_rule = %opts.policy_default_rule,
        "Loaded policy rules"
    );

    Ok((store, summary))
}

/// Merge one JSON policy document into `store`.
pub fn load_file(store: &mut RuleStore, path: &Path) -> Result<(), PolicyError> {
    let contents = std::fs::read(path).map_err(|source| PolicyError::PolicyLoad {
        path: path.display().to_string(),
        source,
    })?;
    store.update_from_json(&contents).map_err(|e| match e {
        PolicyError::InvalidDocument(msg) => {
            PolicyError::InvalidDocument(format!("`{}`: {msg}", path.display()))
        }
        other => other,
    })?;
    tracing::debug!(path = %path.display(), "Loaded policy file");
    Ok(())
}

fn load_directory(store: &mut RuleStore, dir: &Path, summary: &mut LoadSummary) {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Policy directory not found, skipping");
        return;
    }

    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to read policy directory, skipping");
            return;
        }
    };

    let entries = sorted_entries(dir, read.map(|e| e.map(|e| e.path())), summary);
    for path in entries.into_iter().filter(|p| p.is_file()) {
        match load_file(store, &path) {
            Ok(()) => summary.files += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping policy file");
                summary.skipped += 1;
            }
        }
    }
}

/// Directory entries in sorted path order; entries that fail to read are
/// logged and counted as skipped.
fn sorted_entries<I>(dir: &Path, entries: I, summary: &mut LoadSummary) -> Vec<PathBuf>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                summary.skipped += 1;
            }
        }
    }
    paths.sort();
    paths
}
