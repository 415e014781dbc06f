//! The command tree compiled from a directory of playbooks.

mod discover;
mod resolve;

use std::collections::BTreeMap;

use crate::config::AppConfig;
use crate::error::BuildError;
use crate::playbook::Playbook;

pub use discover::discover;
pub use resolve::{InvocationContext, Resolution};

/// A node of the command tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandNode {
    /// Groups child commands; exposes no arguments itself.
    Group {
        name: String,
        help: Option<String>,
        children: BTreeMap<String, CommandNode>,
    },
    /// Bound to exactly one playbook.
    Leaf(Playbook),
}

impl CommandNode {
    pub fn name(&self) -> &str {
        match self {
            CommandNode::Group { name, .. } => name,
            CommandNode::Leaf(playbook) => &playbook.name,
        }
    }

    /// First line of the node's help text.
    pub fn short_help(&self) -> Option<&str> {
        match self {
            CommandNode::Group { help, .. } => help
                .as_deref()
                .and_then(|help| help.lines().next())
                .map(str::trim),
            CommandNode::Leaf(playbook) => playbook.spec.short_help(),
        }
    }

    /// Number of playbooks below (and including) this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            CommandNode::Group { children, .. } => children.values().map(|c| c.leaf_count()).sum(),
            CommandNode::Leaf(_) => 1,
        }
    }

    /// Walk down the tree along `path`.
    #[cfg(test)]
    pub fn find(&self, path: &[&str]) -> Option<&CommandNode> {
        let mut node = self;
        for segment in path {
            node = match node {
                CommandNode::Group { children, .. } => children.get(*segment)?,
                CommandNode::Leaf(_) => return None,
            };
        }
        Some(node)
    }
}

/// The full command tree. Built once at startup and only read afterwards.
#[derive(Debug, Clone)]
pub struct CommandTree {
    pub root: CommandNode,
    config: AppConfig,
}

impl CommandTree {
    /// Discover every playbook under the configured playbook path.
    pub fn build(config: &AppConfig) -> Result<CommandTree, BuildError> {
        let root = discover(config)?;
        Ok(CommandTree {
            root,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }
}
