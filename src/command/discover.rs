use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::CommandNode;
use crate::cli;
use crate::config::AppConfig;
use crate::error::BuildError;
use crate::playbook::{is_playbook, Playbook};
use crate::spec::load_spec_file;

const PLAYBOOK_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Build the command tree rooted at the configured playbook path.
pub fn discover(config: &AppConfig) -> Result<CommandNode, BuildError> {
    let root = &config.playbooks_path;
    if !root.is_dir() {
        return Err(BuildError::RootMissing(root.clone()));
    }

    debug!("Discovering playbooks in {}", root.display());
    let children = scan_dir(root, config)?;
    let help = group_help(root, &config.name, config)?;

    Ok(CommandNode::Group {
        name: config.name.clone(),
        help,
        children,
    })
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PLAYBOOK_EXTENSIONS.contains(&ext))
}

fn is_metadata(file_name: &str, config: &AppConfig) -> bool {
    file_name == config.metadata_name || file_name.ends_with(&format!(".{}", config.metadata_name))
}

/// `D/D.yaml` or `D/D.yml` when `dir` is a playbook directory.
fn directory_playbook(dir: &Path, name: &str) -> Option<PathBuf> {
    PLAYBOOK_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path| path.is_file())
}

fn group_help(dir: &Path, name: &str, config: &AppConfig) -> Result<Option<String>, BuildError> {
    let metadata = dir.join(&config.metadata_name);
    if !metadata.is_file() {
        return Ok(None);
    }
    let spec = load_spec_file(&metadata, name, &config.playbooks_path, &config.metadata_name)
        .map_err(|source| BuildError::Spec {
            playbook: metadata.clone(),
            source,
        })?;
    Ok(spec.help)
}

fn leaf(name: &str, path: &Path, metadata: &Path, config: &AppConfig) -> Result<CommandNode, BuildError> {
    let playbook = Playbook::load(name, path, metadata, config)?;

    for arg in &playbook.spec.arguments {
        if let Some(reserved) = cli::reserved_collision(arg, config) {
            return Err(BuildError::ReservedName {
                command: name.to_string(),
                argument: arg.name.clone(),
                reserved: reserved.to_string(),
            });
        }
        if playbook.takes_targets && arg.parameter.is_positional() {
            return Err(BuildError::PositionalWithTargets {
                command: name.to_string(),
                argument: arg.name.clone(),
            });
        }
    }

    Ok(CommandNode::Leaf(playbook))
}

fn scan_dir(dir: &Path, config: &AppConfig) -> Result<BTreeMap<String, CommandNode>, BuildError> {
    let mut children = BTreeMap::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in entries {
        let entry = entry.map_err(|source| BuildError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.') {
            continue;
        }
        let path = entry.path();

        // symlinked directories are not followed, so the walk always terminates
        let node = if entry.file_type().is_dir() {
            match directory_playbook(path, &file_name) {
                Some(playbook) => {
                    let metadata = path.join(&config.metadata_name);
                    Some(leaf(&file_name, &playbook, &metadata, config)?)
                }
                None => {
                    let grandchildren = scan_dir(path, config)?;
                    if grandchildren.is_empty() {
                        debug!("Skipping {}: no playbooks", path.display());
                        None
                    } else {
                        Some(CommandNode::Group {
                            help: group_help(path, &file_name, config)?,
                            name: file_name.clone(),
                            children: grandchildren,
                        })
                    }
                }
            }
        } else if path.is_file() && is_yaml(path) && !is_metadata(&file_name, config) {
            if is_playbook(path) {
                let stem = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_else(|| file_name.clone());
                let metadata = dir.join(format!("{}.{}", stem, config.metadata_name));
                Some(leaf(&stem, path, &metadata, config)?)
            } else {
                debug!("Skipping {}: not a playbook", path.display());
                None
            }
        } else {
            None
        };

        if let Some(node) = node {
            let name = node.name().to_string();
            if children.contains_key(&name) {
                return Err(BuildError::DuplicateCommand {
                    parent: dir.to_path_buf(),
                    name,
                });
            }
            debug!("Adding command '{}' from {}", name, path.display());
            children.insert(name, node);
        }
    }

    Ok(children)
}
