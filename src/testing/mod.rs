//! Shared testing utilities for unit tests
//!
//! Builds throwaway playbook trees on disk so discovery, parsing and the
//! orchestration can be tested against real files.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::AppConfig;

pub const LOCAL_PLAY: &str = "- hosts: localhost\n  gather_facts: false\n  tasks: []\n";
pub const TARGETED_PLAY: &str = "- hosts: targets\n  gather_facts: false\n  tasks: []\n";

/// A temporary directory holding `playbooks/` and an optional `inventory.yaml`.
pub struct PlaybookTree {
    dir: TempDir,
}

impl PlaybookTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("playbooks")).unwrap();
        PlaybookTree { dir }
    }

    /// Root of the playbook tree.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("playbooks")
    }

    /// Write a file relative to the playbook root, creating parent directories.
    pub fn file(self, relative: &str, content: &str) -> Self {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }

    fn with_metadata(self, relative: &str, play: &str, metadata: &str) -> Self {
        let tree = self.file(relative, play);
        if metadata.is_empty() {
            return tree;
        }
        let path = Path::new(relative);
        let stem = path.file_stem().unwrap().to_string_lossy().to_string();
        let sidecar = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                format!("{}/{}.metadata.playwrap.yaml", parent.display(), stem)
            }
            _ => format!("{}.metadata.playwrap.yaml", stem),
        };
        tree.file(&sidecar, metadata)
    }

    /// A loose playbook running on localhost, with `metadata` as its sidecar spec.
    pub fn playbook(self, relative: &str, metadata: &str) -> Self {
        self.with_metadata(relative, LOCAL_PLAY, metadata)
    }

    /// A loose playbook whose play runs against `targets`.
    pub fn targeted_playbook(self, relative: &str, metadata: &str) -> Self {
        self.with_metadata(relative, TARGETED_PLAY, metadata)
    }

    /// A playbook directory `name/name.yaml` with `name/metadata.playwrap.yaml`.
    pub fn playbook_dir(self, name: &str, metadata: &str) -> Self {
        self.file(&format!("{}/{}.yaml", name, name), LOCAL_PLAY)
            .file(&format!("{}/metadata.playwrap.yaml", name), metadata)
    }

    /// Write `inventory.yaml` next to the playbook root.
    pub fn inventory(self, content: &str) -> Self {
        fs::write(self.dir.path().join("inventory.yaml"), content).unwrap();
        self
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::for_playbooks(self.path());
        config.name = "tool".to_string();
        config.inventory_path = self.dir.path().join("inventory.yaml");
        config.ansible_config_path = self.dir.path().join("ansible.cfg");
        config
    }
}

/// Turn string literals into owned CLI tokens.
pub fn tokens(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playbook_tree_writes_sidecar() {
        let tree = PlaybookTree::new().playbook("group/deploy.yml", "help: hi\n");
        assert!(tree.path().join("group/deploy.yml").is_file());
        assert!(tree.path().join("group/deploy.metadata.playwrap.yaml").is_file());
    }

    #[test]
    fn test_config_points_into_tree() {
        let tree = PlaybookTree::new();
        let config = tree.config();
        assert_eq!(config.playbooks_path, tree.path());
        assert_eq!(config.name, "tool");
    }
}
