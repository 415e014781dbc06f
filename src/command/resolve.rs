use log::debug;

use super::{CommandNode, CommandTree};
use crate::cli;
use crate::error::UsageError;
use crate::playbook::Playbook;

/// A selected playbook and the tokens left for its parser.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationContext<'a> {
    /// Command names from the root to the leaf.
    pub path: Vec<String>,
    pub playbook: &'a Playbook,
    /// Universal flags seen on the way down, followed by the leaf's own tokens.
    pub tokens: Vec<String>,
}

/// Outcome of walking the command tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Invoke(InvocationContext<'a>),
    /// Help or version text requested on an interior node.
    Help(String),
}

impl CommandTree {
    /// Program name followed by the command path, as shown in usage lines.
    pub fn bin_name(&self, path: &[String]) -> String {
        std::iter::once(self.config().name.as_str())
            .chain(path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Help text of an interior node.
    pub fn group_help(&self, node: &CommandNode, path: &[String]) -> String {
        let (help, children) = match node {
            CommandNode::Group { help, children, .. } => (help.as_deref(), children),
            CommandNode::Leaf(playbook) => {
                return cli::leaf_command(
                    &self.bin_name(path),
                    playbook.spec.help.as_deref(),
                    &playbook.spec.arguments,
                    playbook.takes_targets,
                    self.config(),
                )
                .render_long_help()
                .to_string();
            }
        };

        let children = children
            .iter()
            .map(|(name, child)| (name.as_str(), child.short_help()));
        cli::group_command(&self.bin_name(path), help, children, self.config())
            .render_long_help()
            .to_string()
    }

    /// Select a leaf from the leading tokens.
    ///
    /// Tokens are consumed left to right. Universal flags are set aside for the
    /// leaf, a token naming a child descends into it, and the first other token
    /// must find the walk on a leaf.
    pub fn resolve(&self, tokens: &[String]) -> Result<Resolution<'_>, UsageError> {
        let flags = cli::universal_flags(self.config());
        let mut node = &self.root;
        let mut path: Vec<String> = Vec::new();
        let mut carried: Vec<String> = Vec::new();
        let mut index = 0;

        loop {
            let children = match node {
                CommandNode::Leaf(playbook) => {
                    carried.extend_from_slice(&tokens[index..]);
                    debug!("Resolved command '{}' to {}", path.join(" "), playbook.path.display());
                    return Ok(Resolution::Invoke(InvocationContext {
                        path,
                        playbook,
                        tokens: carried,
                    }));
                }
                CommandNode::Group { children, .. } => children,
            };

            let token = match tokens.get(index) {
                Some(token) => token,
                None => {
                    return Err(UsageError::MissingCommand {
                        command: self.bin_name(&path),
                        usage: self.group_help(node, &path),
                    })
                }
            };

            if token == "-h" || token == "--help" {
                return Ok(Resolution::Help(self.group_help(node, &path)));
            }

            if path.is_empty() && (token == "-V" || token == "--version") {
                let name = self.config().name.clone();
                return Ok(Resolution::Help(format!(
                    "{} {}\n",
                    name,
                    env!("CARGO_PKG_VERSION")
                )));
            }

            if let Some(arity) = cli::universal_arity(token, &flags) {
                let end = (index + 1 + arity).min(tokens.len());
                carried.extend_from_slice(&tokens[index..end]);
                index = end;
                continue;
            }

            match children.get(token.as_str()) {
                Some(child) => {
                    path.push(token.clone());
                    node = child;
                    index += 1;
                }
                None => {
                    return Err(UsageError::NoSuchCommand {
                        command: self.bin_name(&path),
                        token: token.clone(),
                        usage: self.group_help(node, &path),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tokens, PlaybookTree};
    use pretty_assertions::assert_eq;

    fn tree() -> (PlaybookTree, CommandTree) {
        let files = PlaybookTree::new()
            .playbook("deploy.yml", "help: Deploy the app\nvariables:\n  count: {kind: int, default: 1}\n")
            .playbook("status.yml", "")
            .playbook("db/migrate.yml", "help: Run migrations\n");
        let tree = CommandTree::build(&files.config()).unwrap();
        (files, tree)
    }

    fn invoked<'a>(resolution: Resolution<'a>) -> InvocationContext<'a> {
        match resolution {
            Resolution::Invoke(ctx) => ctx,
            Resolution::Help(text) => panic!("expected a leaf, got help:\n{}", text),
        }
    }

    #[test]
    fn test_resolve_leaf() {
        let (_files, tree) = tree();
        let ctx = invoked(tree.resolve(&tokens(&["deploy", "--count", "5"])).unwrap());
        assert_eq!(ctx.path, vec!["deploy"]);
        assert_eq!(ctx.playbook.name, "deploy");
        assert_eq!(ctx.tokens, tokens(&["--count", "5"]));
    }

    #[test]
    fn test_resolve_nested() {
        let (_files, tree) = tree();
        let ctx = invoked(tree.resolve(&tokens(&["db", "migrate"])).unwrap());
        assert_eq!(ctx.path, vec!["db", "migrate"]);
        assert!(ctx.tokens.is_empty());
    }

    #[test]
    fn test_universal_flags_are_carried() {
        let (_files, tree) = tree();
        let ctx = invoked(
            tree.resolve(&tokens(&["-vv", "-e", "x=1", "db", "--check", "migrate", "-v"]))
                .unwrap(),
        );
        assert_eq!(ctx.path, vec!["db", "migrate"]);
        assert_eq!(ctx.tokens, tokens(&["-vv", "-e", "x=1", "--check", "-v"]));
    }

    #[test]
    fn test_leaf_tokens_matching_child_names_stay_arguments() {
        let (_files, tree) = tree();
        let ctx = invoked(tree.resolve(&tokens(&["status", "deploy"])).unwrap());
        assert_eq!(ctx.playbook.name, "status");
        assert_eq!(ctx.tokens, tokens(&["deploy"]));
    }

    #[test]
    fn test_unknown_command() {
        let (_files, tree) = tree();
        let err = tree.resolve(&tokens(&["unknown-cmd"])).unwrap_err();
        match &err {
            UsageError::NoSuchCommand { token, command, .. } => {
                assert_eq!(token, "unknown-cmd");
                assert_eq!(command, "tool");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let usage = err.usage().unwrap();
        assert!(usage.contains("deploy"));
        assert!(usage.contains("status"));
    }

    #[test]
    fn test_unknown_flag_on_group() {
        let (_files, tree) = tree();
        assert!(matches!(
            tree.resolve(&tokens(&["db", "--count", "3"])).unwrap_err(),
            UsageError::NoSuchCommand { .. }
        ));
    }

    #[test]
    fn test_missing_command() {
        let (_files, tree) = tree();
        assert!(matches!(
            tree.resolve(&tokens(&["db"])).unwrap_err(),
            UsageError::MissingCommand { .. }
        ));
        assert!(matches!(
            tree.resolve(&[]).unwrap_err(),
            UsageError::MissingCommand { .. }
        ));
    }

    #[test]
    fn test_group_help() {
        let (_files, tree) = tree();
        match tree.resolve(&tokens(&["--help"])).unwrap() {
            Resolution::Help(text) => {
                assert!(text.contains("Deploy the app"));
                assert!(text.contains("db"));
            }
            other => panic!("expected help, got {:?}", other),
        }
        match tree.resolve(&tokens(&["db", "-h"])).unwrap() {
            Resolution::Help(text) => assert!(text.contains("Run migrations")),
            other => panic!("expected help, got {:?}", other),
        }
    }

    #[test]
    fn test_version() {
        let (_files, tree) = tree();
        match tree.resolve(&tokens(&["--version"])).unwrap() {
            Resolution::Help(text) => assert!(text.starts_with("tool ")),
            other => panic!("expected version, got {:?}", other),
        }
    }
}
