use anyhow::{Context, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeSet;

static SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([\w.\-]+)(:vars|:children)?\]$").unwrap());
static HOST_PORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+):(\d+)$").unwrap());

/// Collect host and group names from a YAML inventory.
pub fn parse_yaml_names(content: &str) -> Result<BTreeSet<String>> {
    let doc: Value = serde_yaml::from_str(content).context("Failed to parse YAML inventory")?;
    let mut names = BTreeSet::new();

    if let Value::Mapping(groups) = doc {
        for (group, body) in &groups {
            if let Some(group) = group.as_str() {
                collect_group(group, body, &mut names);
            }
        }
    }

    Ok(names)
}

fn collect_group(group: &str, body: &Value, names: &mut BTreeSet<String>) {
    debug!("Found group: {}", group);
    names.insert(group.to_string());

    if let Some(Value::Mapping(hosts)) = body.get("hosts") {
        for host in hosts.keys().filter_map(Value::as_str) {
            names.insert(host.to_string());
        }
    }

    if let Some(Value::Mapping(children)) = body.get("children") {
        for (child, child_body) in children {
            if let Some(child) = child.as_str() {
                collect_group(child, child_body, names);
            }
        }
    }
}

/// Collect host and group names from an INI inventory.
pub fn parse_ini_names(content: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut section: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(caps) = SECTION_RE.captures(line) {
            let group = caps[1].to_string();
            names.insert(group.clone());
            section = caps.get(2).map(|kind| kind.as_str().to_string());
            continue;
        }

        let first = match line.split_whitespace().next() {
            Some(first) => first,
            None => continue,
        };

        match section.as_deref() {
            // group:vars lines are variables, not names
            Some(":vars") => {}
            _ => {
                let name = HOST_PORT_RE
                    .captures(first)
                    .map(|caps| caps[1].to_string())
                    .unwrap_or_else(|| first.to_string());
                names.insert(name);
            }
        }
    }

    names.insert("all".to_string());
    names
}
