use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

/// Read every play of a playbook file, across all YAML documents.
pub fn parse_plays(playbook_path: &Path) -> Result<Vec<Mapping>> {
    debug!("Parsing playbook file: {}", playbook_path.display());

    let content = fs::read_to_string(playbook_path)
        .with_context(|| format!("Failed to open playbook file: {}", playbook_path.display()))?;

    let mut plays = Vec::new();
    for (doc_index, document) in serde_yaml::Deserializer::from_str(&content).enumerate() {
        let doc = Value::deserialize(document)
            .with_context(|| format!("Failed to parse YAML document {}", doc_index))?;

        match doc {
            Value::Sequence(items) => {
                for (play_index, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Mapping(play) => plays.push(play),
                        _ => warn!(
                            "Skipping non-mapping play entry at index {} in document {}",
                            play_index, doc_index
                        ),
                    }
                }
            }
            Value::Null => {}
            _ => warn!("Skipping unsupported YAML document at index {}", doc_index),
        }
    }

    debug!("Found {} plays in {}", plays.len(), playbook_path.display());
    Ok(plays)
}

/// Whether the file looks like a playbook: a list of plays, each with `hosts` or `import_playbook`.
pub fn is_playbook(path: &Path) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return false,
    };

    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Sequence(items)) if !items.is_empty() => items.iter().all(|item| {
            item.as_mapping().is_some_and(|play| {
                play.contains_key("hosts") || play.contains_key("import_playbook")
            })
        }),
        _ => false,
    }
}

/// The host patterns a play targets.
pub fn play_hosts(play: &Mapping) -> Vec<String> {
    match play.get("hosts") {
        Some(Value::String(hosts)) => hosts
            .split([':', ','])
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::Sequence(hosts)) => hosts
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}
