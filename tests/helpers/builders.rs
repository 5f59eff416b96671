use std::path::{Path, PathBuf};

use rulegate::PolicyOpts;
use tempfile::TempDir;

/// Builder for an on-disk policy layout: one policy file plus any number of
/// policy directories, all inside a temporary directory.
pub struct PolicyTreeBuilder {
    policy_file: Option<String>,
    dirs: Vec<(String, Vec<(String, String)>)>,
    default_rule: String,
}

impl PolicyTreeBuilder {
    pub fn new() -> Self {
        Self {
            policy_file: None,
            dirs: Vec::new(),
            default_rule: "default".to_string(),
        }
    }

    pub fn with_policy_file(mut self, contents: &str) -> Self {
        self.policy_file = Some(contents.to_string());
        self
    }

    /// Add a directory; files are written with the given names.
    pub fn with_dir(mut self, name: &str, files: &[(&str, &str)]) -> Self {
        self.dirs.push((
            name.to_string(),
            files
                .iter()
                .map(|(f, c)| (f.to_string(), c.to_string()))
                .collect(),
        ));
        self
    }

    pub fn with_default_rule(mut self, name: &str) -> Self {
        self.default_rule = name.to_string();
        self
    }

    pub fn build(self) -> PolicyTree {
        let root = TempDir::new().expect("Failed to create temp dir");

        let policy_file = match &self.policy_file {
            Some(contents) => {
                let path = root.path().join("policy.json");
                std::fs::write(&path, contents).expect("Failed to write policy file");
                path.display().to_string()
            }
            None => String::new(),
        };

        let mut policy_dirs = Vec::new();
        for (name, files) in &self.dirs {
            let dir = root.path().join(name);
            std::fs::create_dir_all(&dir).expect("Failed to create policy dir");
            for (file, contents) in files {
                std::fs::write(dir.join(file), contents).expect("Failed to write policy dir file");
            }
            policy_dirs.push(dir);
        }

        let opts = PolicyOpts {
            policy_file,
            policy_default_rule: self.default_rule,
            policy_dirs,
        };
        PolicyTree { root, opts }
    }
}

pub struct PolicyTree {
    root: TempDir,
    pub opts: PolicyOpts,
}

impl PolicyTree {
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn policy_file(&self) -> PathBuf {
        PathBuf::from(&self.opts.policy_file)
    }
}
