//! One invocation from raw tokens to exit code.

use colored::Colorize;
use log::{debug, warn};

use crate::args::parse_invocation;
use crate::command::{CommandTree, Resolution};
use crate::config::AppConfig;
use crate::error::{Error, UsageError, EXIT_SUCCESS};
use crate::inventory;
use crate::runner::{ExecutionResult, PlaybookRunner, RunRequest};
use crate::vars::map_variables;

/// How an invocation ended without an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Help or version text to print; nothing was run.
    Help(String),
    Executed(ExecutionResult),
}

/// Build the command tree, select a playbook, parse its arguments and run it.
pub fn run<R>(tokens: &[String], config: &AppConfig, runner: &R) -> Result<Completion, Error>
where
    R: PlaybookRunner + ?Sized,
{
    let tree = CommandTree::build(config)?;
    debug!("Command tree has {} playbooks", tree.leaf_count());

    let ctx = match tree.resolve(tokens)? {
        Resolution::Help(text) => return Ok(Completion::Help(text)),
        Resolution::Invoke(ctx) => ctx,
    };
    let playbook = ctx.playbook;

    let known_targets = if playbook.takes_targets {
        inventory::find_targets(&config.inventory_path).map_err(UsageError::Inventory)?
    } else {
        None
    };

    let invocation = parse_invocation(&tree, &ctx, known_targets.as_deref())?;
    if playbook.takes_targets && known_targets.is_none() {
        return Err(UsageError::MissingInventory(config.inventory_path.clone()).into());
    }

    let request = RunRequest {
        playbook: playbook.path.clone(),
        inventory: config.inventory_path.clone(),
        variables: map_variables(&playbook.spec.arguments, &invocation.args),
        globals: invocation.globals,
    };

    debug!(
        "Passing {} variables to {}",
        request.variables.len(),
        playbook.path.display()
    );
    let result = runner.run(&request)?;
    Ok(Completion::Executed(result))
}

fn report(err: &Error) {
    if let Error::Usage(UsageError::Clap(e)) = err {
        // clap renders its own usage and help
        let _ = e.print();
        return;
    }

    eprintln!("{} {}", "error:".red().bold(), err);
    if let Error::Usage(usage_error) = err {
        if let Some(usage) = usage_error.usage() {
            eprintln!();
            eprint!("{}", usage);
        }
    }
}

/// Like [`run`], but prints help and errors and returns the process exit code.
pub fn main_with<R>(tokens: &[String], config: &AppConfig, runner: &R) -> i32
where
    R: PlaybookRunner + ?Sized,
{
    match run(tokens, config, runner) {
        Ok(Completion::Help(text)) => {
            print!("{}", text);
            EXIT_SUCCESS
        }
        Ok(Completion::Executed(result)) => {
            if let Some(diagnostic) = &result.diagnostic {
                warn!("{}", diagnostic);
            }
            result.exit_code()
        }
        Err(err) => {
            report(&err);
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BuildError, ParseError, EXIT_CONFIG, EXIT_USAGE};
    use crate::runner::{MockPlaybookRunner, Outcome};
    use crate::spec::ArgValue;
    use crate::testing::{tokens, PlaybookTree};
    use pretty_assertions::assert_eq;

    const INVENTORY: &str = "all:\n  hosts:\n    web1:\n  children:\n    db:\n      hosts:\n        db1:\n";

    fn never_runs() -> MockPlaybookRunner {
        let mut runner = MockPlaybookRunner::new();
        runner.expect_run().never();
        runner
    }

    #[test]
    fn test_runs_selected_playbook_with_variables() {
        let tree = PlaybookTree::new().playbook(
            "deploy.yml",
            "variables:\n  count: {kind: int, default: 1}\n  deploy_user: {dest: remote_user}\n",
        );
        let config = tree.config();
        let playbook = tree.path().join("deploy.yml");

        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .withf(move |request| {
                request.playbook == playbook
                    && request.variables.get("count") == Some(&ArgValue::Int(5))
                    && request.variables.get("remote_user") == Some(&ArgValue::Str("me".to_string()))
                    && request.globals.check
            })
            .times(1)
            .returning(|_| Ok(ExecutionResult::success()));

        let completion = run(
            &tokens(&["--check", "deploy", "--count", "5", "--user", "me"]),
            &config,
            &runner,
        )
        .unwrap();
        assert_eq!(completion, Completion::Executed(ExecutionResult::success()));
    }

    #[test]
    fn test_runner_code_is_propagated() {
        let tree = PlaybookTree::new().playbook("deploy.yml", "");
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Ok(ExecutionResult::failed("ansible-playbook", 2)));

        assert_eq!(main_with(&tokens(&["deploy"]), &tree.config(), &runner), 2);
    }

    #[test]
    fn test_interrupted_run_exits_130() {
        let tree = PlaybookTree::new().playbook("deploy.yml", "");
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(ExecutionResult::interrupted("ansible-playbook", Some(2))));

        assert_eq!(main_with(&tokens(&["deploy"]), &tree.config(), &runner), 130);
    }

    #[test]
    fn test_unknown_command_never_runs() {
        let tree = PlaybookTree::new().playbook("deploy.yml", "");
        let runner = never_runs();
        let err = run(&tokens(&["unknown-cmd"]), &tree.config(), &runner).unwrap_err();
        assert!(matches!(err, Error::Usage(UsageError::NoSuchCommand { .. })));
        assert_eq!(main_with(&tokens(&["unknown-cmd"]), &tree.config(), &runner), EXIT_USAGE);
    }

    #[test]
    fn test_bad_value_never_runs() {
        let tree = PlaybookTree::new().playbook("deploy.yml", "variables:\n  count: {kind: int}\n");
        let runner = never_runs();
        let err = run(&tokens(&["deploy", "--count", "abc"]), &tree.config(), &runner).unwrap_err();
        match err {
            Error::Parse(parse) => assert_eq!(parse.argument(), Some("count")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_constraint_violation_never_runs() {
        let tree = PlaybookTree::new().playbook(
            "deploy.yml",
            "variables:\n  alpha: {}\n  beta: {}\nconstraints:\n  required_together:\n    - [alpha, beta]\n",
        );
        let runner = never_runs();
        let err = run(&tokens(&["deploy", "--alpha", "1"]), &tree.config(), &runner).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Constraints(_))));
    }

    #[test]
    fn test_broken_tree_is_config_error() {
        let tree = PlaybookTree::new()
            .playbook("deploy.yml", "")
            .playbook("deploy.yaml", "");
        let runner = never_runs();
        let err = run(&tokens(&["deploy"]), &tree.config(), &runner).unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::DuplicateCommand { .. })));
        assert_eq!(main_with(&tokens(&["deploy"]), &tree.config(), &runner), EXIT_CONFIG);
    }

    #[test]
    fn test_help_does_not_run() {
        let tree = PlaybookTree::new().playbook("deploy.yml", "help: Deploy it\n");
        let runner = never_runs();
        match run(&tokens(&["--help"]), &tree.config(), &runner).unwrap() {
            Completion::Help(text) => assert!(text.contains("Deploy it")),
            other => panic!("expected help, got {:?}", other),
        }
        assert_eq!(main_with(&tokens(&["deploy", "--help"]), &tree.config(), &runner), 0);
    }

    #[test]
    fn test_targets_are_checked_against_inventory() {
        let tree = PlaybookTree::new()
            .targeted_playbook("patch.yml", "")
            .inventory(INVENTORY);
        let config = tree.config();

        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .withf(|request| request.globals.targets == vec!["web1".to_string(), "db".to_string()])
            .times(1)
            .returning(|_| Ok(ExecutionResult::success()));
        let completion = run(&tokens(&["patch", "web1", "db"]), &config, &runner).unwrap();
        assert!(matches!(completion, Completion::Executed(ref r) if r.outcome == Outcome::Success));

        let runner = never_runs();
        let err = run(&tokens(&["patch", "nope"]), &config, &runner).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::InvalidChoice { .. })));

        let err = run(&tokens(&["patch"]), &config, &runner).unwrap_err();
        assert_eq!(
            err.to_string(),
            ParseError::MissingRequired("target".to_string()).to_string()
        );
    }

    #[test]
    fn test_missing_inventory_for_targets() {
        let tree = PlaybookTree::new().targeted_playbook("patch.yml", "");
        let runner = never_runs();
        let err = run(&tokens(&["patch", "web1"]), &tree.config(), &runner).unwrap_err();
        assert!(matches!(err, Error::Usage(UsageError::MissingInventory(_))));
    }
}
