//! Application configuration.
//!
//! Everything is read from `PLAYWRAP_*` environment variables once at
//! startup. Tests build an [`AppConfig`] from a closure instead of the real
//! environment.

use std::env;
use std::path::PathBuf;

const DEFAULT_NAME: &str = "playwrap";
const DEFAULT_DATA_PATH: &str = "/usr/share/playwrap";
const DEFAULT_METADATA_NAME: &str = "metadata.playwrap.yaml";
const DEFAULT_TARGET_NAME: &str = "targets";
const DEFAULT_RUNNER: &str = "ansible-playbook";

/// Where to find playbooks and how to expose them.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Program name shown in usage text.
    pub name: String,
    /// Root of the playbook tree.
    pub playbooks_path: PathBuf,
    /// Inventory passed to the runner and used for target names.
    pub inventory_path: PathBuf,
    /// `ansible.cfg` exported as `ANSIBLE_CONFIG` when it exists.
    pub ansible_config_path: PathBuf,
    /// File name of parameter specifications.
    pub metadata_name: String,
    /// Play `hosts` values that make a playbook take target arguments.
    pub target_names: Vec<String>,
    /// Whether `-e/--extra-vars` is offered.
    pub allow_extra_vars: bool,
    /// Whether `--ask-pass` and `--private-key` are offered.
    pub allow_inventory_auth: bool,
    /// Program that executes playbooks.
    pub runner: String,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_path = lookup("PLAYWRAP_DATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        let playbooks_path = lookup("PLAYWRAP_PLAYBOOKS")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_path.join("playbooks"));

        let ansible_config_path = lookup("PLAYWRAP_ANSIBLE_CFG")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_path.join("ansible.cfg"));

        let inventory_path = lookup("PLAYWRAP_INVENTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                env::current_dir()
                    .unwrap_or_default()
                    .join("inventory.yaml")
            });

        let target_names = lookup("PLAYWRAP_TARGET_NAMES")
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| vec![DEFAULT_TARGET_NAME.to_string()]);

        AppConfig {
            name: lookup("PLAYWRAP_NAME").unwrap_or_else(|| DEFAULT_NAME.to_string()),
            playbooks_path,
            inventory_path,
            ansible_config_path,
            metadata_name: lookup("PLAYWRAP_METADATA_NAME")
                .unwrap_or_else(|| DEFAULT_METADATA_NAME.to_string()),
            target_names,
            allow_extra_vars: lookup("PLAYWRAP_ALLOW_EXTRA_VARS")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
            allow_inventory_auth: lookup("PLAYWRAP_ALLOW_INVENTORY_AUTH")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            runner: lookup("PLAYWRAP_RUNNER").unwrap_or_else(|| DEFAULT_RUNNER.to_string()),
        }
    }

    /// Configuration rooted at an explicit playbook directory, everything else default.
    pub fn for_playbooks(playbooks_path: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_lookup(|_| None);
        config.playbooks_path = playbooks_path.into();
        config
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1")
}
