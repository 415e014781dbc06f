use clap::{Arg, ArgAction, Command};
use itertools::Itertools;

use crate::config::AppConfig;
use crate::spec::{ArgKind, ArgumentSpec, Format, Parameter};

/// Argument id of the target positional on leaves that take targets.
pub const TARGET_ID: &str = "target";

/// A flag every command accepts, independent of any playbook spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniversalFlag {
    pub id: &'static str,
    pub long: &'static str,
    pub short: Option<char>,
    pub takes_value: bool,
    pub help: &'static str,
}

const VERBOSE: UniversalFlag = UniversalFlag {
    id: "verbose",
    long: "verbose",
    short: Some('v'),
    takes_value: false,
    help: "Increase verbosity (up to -vvvv)",
};

const CHECK: UniversalFlag = UniversalFlag {
    id: "check",
    long: "check",
    short: Some('C'),
    takes_value: false,
    help: "Don't make any changes; try to predict some of the changes that may occur",
};

const EXTRA_VARS: UniversalFlag = UniversalFlag {
    id: "extra_vars",
    long: "extra-vars",
    short: Some('e'),
    takes_value: true,
    help: "Set additional variables as key=value or YAML/JSON, if filename prepend with @",
};

const ASK_PASS: UniversalFlag = UniversalFlag {
    id: "ask_pass",
    long: "ask-pass",
    short: Some('k'),
    takes_value: false,
    help: "Ask for connection password",
};

const PRIVATE_KEY: UniversalFlag = UniversalFlag {
    id: "private_key",
    long: "private-key",
    short: None,
    takes_value: true,
    help: "Use this file to authenticate the connection",
};

/// The universal flags enabled by `config`.
pub fn universal_flags(config: &AppConfig) -> Vec<UniversalFlag> {
    let mut flags = vec![VERBOSE, CHECK];
    if config.allow_extra_vars {
        flags.push(EXTRA_VARS);
    }
    if config.allow_inventory_auth {
        flags.push(ASK_PASS);
        flags.push(PRIVATE_KEY);
    }
    flags
}

/// Names a playbook argument may not use, neither as name nor as `--flag`.
pub fn reserved_names(config: &AppConfig) -> Vec<&'static str> {
    let mut names = vec!["help", "version", TARGET_ID];
    for flag in universal_flags(config) {
        names.push(flag.id);
        names.push(flag.long);
    }
    names
}

/// The reserved name `arg` collides with, if any.
pub fn reserved_collision(arg: &ArgumentSpec, config: &AppConfig) -> Option<&'static str> {
    let reserved = reserved_names(config);
    let flag = match &arg.parameter {
        Parameter::Long(long) => long.as_str(),
        Parameter::Positional(name) => name.as_str(),
    };
    reserved
        .into_iter()
        .find(|name| *name == arg.name || *name == flag)
}

/// How many following tokens a universal flag token consumes, or `None` if
/// `token` is not a universal flag.
pub fn universal_arity(token: &str, flags: &[UniversalFlag]) -> Option<usize> {
    if token == "--" {
        return None;
    }

    if let Some(body) = token.strip_prefix("--") {
        let (name, inline_value) = match body.split_once('=') {
            Some((name, _)) => (name, true),
            None => (body, false),
        };
        let flag = flags.iter().find(|flag| flag.long == name)?;
        return Some(usize::from(flag.takes_value && !inline_value));
    }

    let shorts = token.strip_prefix('-')?;
    if shorts.is_empty() {
        return None;
    }

    for (pos, c) in shorts.char_indices() {
        let flag = flags.iter().find(|flag| flag.short == Some(c))?;
        if flag.takes_value {
            let attached = pos + c.len_utf8() < shorts.len();
            return Some(usize::from(!attached));
        }
    }
    Some(0)
}

/// Count `-v` occurrences before any `--`, to pick the log level before parsing.
pub fn count_verbosity(tokens: &[String]) -> u8 {
    let mut count: u8 = 0;
    for token in tokens.iter().take_while(|token| *token != "--") {
        if token == "--verbose" {
            count = count.saturating_add(1);
        } else if let Some(shorts) = token.strip_prefix('-') {
            if !shorts.is_empty() && !shorts.starts_with('-') && shorts.chars().all(|c| c == 'v') {
                count = count.saturating_add(u8::try_from(shorts.len()).unwrap_or(u8::MAX));
            }
        }
    }
    count
}

fn universal_arg(flag: &UniversalFlag) -> Arg {
    let mut arg = Arg::new(flag.id).long(flag.long).help(flag.help);
    if let Some(short) = flag.short {
        arg = arg.short(short);
    }

    match flag.id {
        "verbose" => arg.action(ArgAction::Count),
        "extra_vars" => arg.action(ArgAction::Append).value_name("EXTRA_VARS"),
        _ if flag.takes_value => arg.action(ArgAction::Set).value_name("FILE"),
        _ => arg.action(ArgAction::SetTrue),
    }
}

fn universal_args(config: &AppConfig) -> Vec<Arg> {
    universal_flags(config).iter().map(universal_arg).collect()
}

fn argument_help(arg: &ArgumentSpec) -> String {
    let mut help = arg.help.clone().unwrap_or_default();

    if !arg.choices.is_empty() {
        if !help.is_empty() {
            help.push(' ');
        }
        help.push_str(&format!("[possible values: {}]", arg.choices.iter().join(", ")));
    }

    if let Some(default) = &arg.default {
        if !help.is_empty() {
            help.push(' ');
        }
        help.push_str(&format!("[default: {}]", default));
    }

    if arg.required {
        if !help.is_empty() {
            help.push(' ');
        }
        help.push_str("[required]");
    }

    help
}

fn is_numeric(arg: &ArgumentSpec) -> bool {
    matches!(arg.element_kind(), ArgKind::Int | ArgKind::Float) || arg.format == Some(Format::Port)
}

/// The clap argument for one playbook argument. Positionals take the next free index.
pub fn spec_arg(arg: &ArgumentSpec, next_index: &mut usize) -> Arg {
    let mut clap_arg = Arg::new(arg.name.clone()).help(argument_help(arg));

    match &arg.parameter {
        Parameter::Long(long) => {
            clap_arg = clap_arg.long(long.clone());
            if arg.is_flag() {
                return clap_arg.action(ArgAction::SetTrue);
            }
            clap_arg = clap_arg
                .value_name(long.to_uppercase().replace('-', "_"))
                .num_args(1);
            clap_arg = if arg.is_sequence() {
                clap_arg.action(ArgAction::Append)
            } else {
                clap_arg.action(ArgAction::Set)
            };
        }
        Parameter::Positional(name) => {
            clap_arg = clap_arg.index(*next_index).value_name(name.clone());
            *next_index += 1;
            clap_arg = if arg.is_sequence() {
                clap_arg.action(ArgAction::Append).num_args(1..)
            } else {
                clap_arg.action(ArgAction::Set)
            };
        }
    }

    if is_numeric(arg) {
        clap_arg = clap_arg.allow_negative_numbers(true);
    }

    clap_arg
}

/// Help and usage for an interior node listing its children.
pub fn group_command<'a, I>(bin_name: &str, help: Option<&str>, children: I, config: &AppConfig) -> Command
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let name = bin_name.rsplit(' ').next().unwrap_or(bin_name).to_string();
    let mut command = Command::new(name)
        .bin_name(bin_name.to_string())
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_value_name("COMMAND")
        .disable_help_subcommand(true)
        .args(universal_args(config));

    if let Some(help) = help {
        command = command.about(help.to_string());
    }

    for (child, child_help) in children {
        let mut subcommand = Command::new(child.to_string());
        if let Some(child_help) = child_help {
            subcommand = subcommand.about(child_help.to_string());
        }
        command = command.subcommand(subcommand);
    }

    command
}

/// The parser for a leaf: universal flags, the target positional and the playbook's arguments.
pub fn leaf_command(
    bin_name: &str,
    help: Option<&str>,
    arguments: &[ArgumentSpec],
    takes_targets: bool,
    config: &AppConfig,
) -> Command {
    let name = bin_name.rsplit(' ').next().unwrap_or(bin_name).to_string();
    let mut command = Command::new(name)
        .bin_name(bin_name.to_string())
        .disable_version_flag(true)
        .args(universal_args(config));

    if let Some(help) = help {
        let short = help.lines().next().unwrap_or_default().trim().to_string();
        command = command.about(short).long_about(help.to_string());
    }

    let mut next_index = 1;
    if takes_targets {
        command = command.arg(
            Arg::new(TARGET_ID)
                .index(next_index)
                .value_name("TARGET")
                .help("The target to execute the action against")
                .action(ArgAction::Append)
                .num_args(1..),
        );
        next_index += 1;
    }

    for arg in arguments {
        command = command.arg(spec_arg(arg, &mut next_index));
    }

    command
}
