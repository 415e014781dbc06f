mod parser;

use log::debug;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::error::BuildError;
use crate::spec::{load_spec_file, PlaybookSpec};

pub use parser::{is_playbook, parse_plays, play_hosts};

/// A playbook on disk together with its parameter specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Playbook {
    pub name: String,
    pub path: PathBuf,
    pub spec: PlaybookSpec,
    /// Whether a play targets one of the configured target names.
    pub takes_targets: bool,
}

impl Playbook {
    /// Load the playbook at `path` with the spec stored at `metadata_path`.
    pub fn load(
        name: &str,
        path: &Path,
        metadata_path: &Path,
        config: &AppConfig,
    ) -> Result<Playbook, BuildError> {
        let spec = load_spec_file(
            metadata_path,
            name,
            &config.playbooks_path,
            &config.metadata_name,
        )
        .map_err(|source| BuildError::Spec {
            playbook: path.to_path_buf(),
            source,
        })?;

        let takes_targets = takes_targets(path, &config.target_names).map_err(|source| {
            BuildError::Playbook {
                playbook: path.to_path_buf(),
                source,
            }
        })?;

        debug!(
            "Playbook '{}' at {} (targets: {}, arguments: {})",
            name,
            path.display(),
            takes_targets,
            spec.arguments.len()
        );

        Ok(Playbook {
            name: name.to_string(),
            path: path.to_path_buf(),
            spec,
            takes_targets,
        })
    }
}

/// Whether any play of the playbook runs against one of `target_names`.
pub fn takes_targets(path: &Path, target_names: &[String]) -> anyhow::Result<bool> {
    let plays = parse_plays(path)?;
    Ok(plays.iter().any(|play| {
        play_hosts(play)
            .iter()
            .any(|host| target_names.contains(host))
    }))
}
