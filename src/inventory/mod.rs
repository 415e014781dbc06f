//! Host and group names of an inventory, used to validate target arguments.

mod parser;

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::Path;

pub use parser::{parse_ini_names, parse_yaml_names};

/// All host and group names in the inventory at `path`, or `None` if there is no inventory.
pub fn find_targets(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        debug!("No inventory at {}", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to open inventory file: {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    );
    let names = if is_yaml {
        parse_yaml_names(&content)
            .with_context(|| format!("Failed to read inventory {}", path.display()))?
    } else {
        parse_ini_names(&content)
    };

    info!("Found {} targets in {}", names.len(), path.display());
    Ok(Some(names.into_iter().collect()))
}
