//! Turns a leaf's command-line tokens into typed values.
//!
//! clap splits the tokens; coercion, choices, defaults and required checks
//! happen here so every value problem is a [`ParseError`] naming the argument.

use clap::parser::ValueSource;
use clap::{ArgMatches, Command};
use itertools::Itertools;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

use crate::cli::{self, TARGET_ID};
use crate::command::{CommandTree, InvocationContext};
use crate::config::AppConfig;
use crate::error::{Error, ParseError, UsageError};
use crate::spec::{constraints, ArgKind, ArgValue, ArgumentSpec, Format, Parameter, PlaybookSpec};

/// Typed values of a leaf's arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    /// Argument name to value, for every argument that has one.
    pub values: BTreeMap<String, ArgValue>,
    /// Names given explicitly on the command line.
    pub supplied: BTreeSet<String>,
}

impl ParsedArgs {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }
}

/// Values of the universal flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub verbose: u8,
    pub check: bool,
    pub extra_vars: Vec<String>,
    pub ask_pass: bool,
    pub private_key: Option<String>,
    /// Inventory hosts or groups to limit the run to.
    pub targets: Vec<String>,
}

impl GlobalOptions {
    fn from_matches(matches: &ArgMatches, config: &AppConfig) -> Self {
        let mut globals = GlobalOptions {
            verbose: matches.get_count("verbose"),
            check: matches.get_flag("check"),
            ..Default::default()
        };

        if config.allow_extra_vars {
            globals.extra_vars = matches
                .get_many::<String>("extra_vars")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
        }

        if config.allow_inventory_auth {
            globals.ask_pass = matches.get_flag("ask_pass");
            globals.private_key = matches.get_one::<String>("private_key").cloned();
        }

        globals
    }
}

/// Everything parsed for one invocation of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub globals: GlobalOptions,
    pub args: ParsedArgs,
}

fn invalid_value(arg: &ArgumentSpec, token: &str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidValue {
        name: arg.name.clone(),
        token: token.to_string(),
        reason: reason.into(),
    }
}

/// Convert one raw token according to the argument's kind and format.
pub fn coerce(arg: &ArgumentSpec, token: &str) -> Result<ArgValue, ParseError> {
    if let Some(format) = arg.format {
        return format
            .validate(token)
            .map_err(|reason| invalid_value(arg, token, reason));
    }

    match arg.element_kind() {
        ArgKind::String | ArgKind::List => Ok(ArgValue::Str(token.to_string())),
        ArgKind::Int => token
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|e| invalid_value(arg, token, e.to_string())),
        ArgKind::Float => match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(ArgValue::Float(value)),
            Ok(_) => Err(invalid_value(arg, token, "not a finite number")),
            Err(e) => Err(invalid_value(arg, token, e.to_string())),
        },
        ArgKind::Bool => Format::Boolean
            .validate(token)
            .map_err(|reason| invalid_value(arg, token, reason)),
        ArgKind::Choice => {
            if arg.choices.iter().any(|choice| choice == token) {
                Ok(ArgValue::Str(token.to_string()))
            } else {
                Err(ParseError::InvalidChoice {
                    name: arg.name.clone(),
                    token: token.to_string(),
                    choices: arg.choices.iter().join(", "),
                })
            }
        }
    }
}

fn supplied_on_command_line(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Collect typed values for `arguments` from clap matches.
///
/// Explicit values win, then defaults; a required argument without either is
/// an error. Repeated occurrences of a sequence replace its default entirely.
pub fn values_from_matches(
    arguments: &[ArgumentSpec],
    matches: &ArgMatches,
) -> Result<ParsedArgs, ParseError> {
    let mut parsed = ParsedArgs::default();

    for arg in arguments {
        let supplied = supplied_on_command_line(matches, &arg.name);

        let value = if let (Some(flag), true) = (arg.flag, supplied) {
            Some(ArgValue::Bool(flag))
        } else if supplied && !arg.is_flag() {
            let tokens: Vec<&String> = matches
                .get_many::<String>(&arg.name)
                .map(|values| values.collect())
                .unwrap_or_default();

            if arg.is_sequence() {
                let mut items = Vec::with_capacity(tokens.len());
                for token in tokens {
                    let item = coerce(arg, token)?;
                    if !(arg.unique && items.contains(&item)) {
                        items.push(item);
                    }
                }
                Some(ArgValue::List(items))
            } else {
                match tokens.last() {
                    Some(token) => Some(coerce(arg, token)?),
                    None => None,
                }
            }
        } else {
            arg.default.clone()
        };

        match value {
            Some(value) => {
                if supplied {
                    parsed.supplied.insert(arg.name.clone());
                }
                parsed.values.insert(arg.name.clone(), value);
            }
            None if arg.required => return Err(ParseError::MissingRequired(arg.name.clone())),
            None => {}
        }
    }

    Ok(parsed)
}

/// Parse `tokens` against `arguments` alone, without universal flags.
pub fn parse_arguments(arguments: &[ArgumentSpec], tokens: &[String]) -> Result<ParsedArgs, Error> {
    let mut next_index = 1;
    let command = Command::new("arguments")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args(arguments.iter().map(|arg| cli::spec_arg(arg, &mut next_index)));

    let matches = command
        .try_get_matches_from(tokens)
        .map_err(UsageError::Clap)?;
    Ok(values_from_matches(arguments, &matches)?)
}

fn check_targets(tokens: Vec<String>, known: Option<&[String]>) -> Result<Vec<String>, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::MissingRequired(TARGET_ID.to_string()));
    }
    if let Some(known) = known {
        if let Some(unknown) = tokens.iter().find(|target| !known.contains(target)) {
            return Err(ParseError::InvalidChoice {
                name: TARGET_ID.to_string(),
                token: unknown.clone(),
                choices: known.iter().join(", "),
            });
        }
    }
    Ok(tokens)
}

/// Parse the tokens of a resolved leaf, then check the playbook's constraints.
///
/// `known_targets` holds the inventory's host and group names; `None` skips
/// the membership check.
pub fn parse_invocation(
    tree: &CommandTree,
    ctx: &InvocationContext<'_>,
    known_targets: Option<&[String]>,
) -> Result<Invocation, Error> {
    let playbook = ctx.playbook;
    let bin_name = tree.bin_name(&ctx.path);
    let command = cli::leaf_command(
        &bin_name,
        playbook.spec.help.as_deref(),
        &playbook.spec.arguments,
        playbook.takes_targets,
        tree.config(),
    );

    let matches = command
        .try_get_matches_from(std::iter::once(bin_name.clone()).chain(ctx.tokens.iter().cloned()))
        .map_err(UsageError::Clap)?;

    let mut globals = GlobalOptions::from_matches(&matches, tree.config());
    if playbook.takes_targets {
        let tokens = matches
            .get_many::<String>(TARGET_ID)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        globals.targets = check_targets(tokens, known_targets)?;
    }

    let args = values_from_matches(&playbook.spec.arguments, &matches)?;
    check_constraints(&playbook.spec, &args)?;

    debug!("Parsed arguments for '{}': {:?}", bin_name, args.values);
    Ok(Invocation { globals, args })
}

/// Fail with every constraint violation at once.
pub fn check_constraints(spec: &PlaybookSpec, args: &ParsedArgs) -> Result<(), ParseError> {
    if spec.constraints.is_empty() {
        return Ok(());
    }
    let errors = constraints::validate(spec, &args.values);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ParseError::Constraints(errors))
    }
}

/// Format values as tokens that parse back to the same values.
pub fn to_tokens(arguments: &[ArgumentSpec], values: &BTreeMap<String, ArgValue>) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut positionals = Vec::new();

    for arg in arguments {
        let value = match values.get(&arg.name) {
            Some(value) => value,
            None => continue,
        };

        let items: Vec<&ArgValue> = match value {
            ArgValue::List(items) if arg.is_sequence() => items.iter().collect(),
            single => vec![single],
        };

        match &arg.parameter {
            Parameter::Long(long) => {
                if let Some(flag) = arg.flag {
                    if *value == ArgValue::Bool(flag) {
                        tokens.push(format!("--{}", long));
                    }
                    continue;
                }
                for item in items {
                    tokens.push(format!("--{}={}", long, item));
                }
            }
            Parameter::Positional(_) => {
                positionals.extend(items.into_iter().map(|item| item.to_string()));
            }
        }
    }

    if positionals.iter().any(|token| token.starts_with('-')) {
        tokens.push("--".to_string());
    }
    tokens.extend(positionals);
    tokens
}
