//! The argument model: what a playbook exposes on the command line.

pub mod constraints;
pub mod loader;
pub mod types;

use itertools::Itertools;
use serde::Serialize;
use std::fmt;

pub use constraints::Constraints;
pub use loader::{load_spec, load_spec_file};
pub use types::Format;

/// Declared kind of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Int,
    Float,
    Bool,
    Choice,
    /// A list of strings (or of choices when choices are declared).
    List,
}

impl ArgKind {
    pub fn parse(kind: &str) -> Option<ArgKind> {
        match kind {
            "string" | "str" => Some(ArgKind::String),
            "int" | "integer" => Some(ArgKind::Int),
            "float" => Some(ArgKind::Float),
            "bool" | "boolean" => Some(ArgKind::Bool),
            "choice" => Some(ArgKind::Choice),
            "list" => Some(ArgKind::List),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArgKind::String => "string",
            ArgKind::Int => "int",
            ArgKind::Float => "float",
            ArgKind::Bool => "bool",
            ArgKind::Choice => "choice",
            ArgKind::List => "list",
        }
    }
}

/// Whether an argument holds one value or an ordered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Sequence,
}

/// How an argument is spelled on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// `--name`, stored without the leading dashes.
    Long(String),
    Positional(String),
}

impl Parameter {
    pub fn is_positional(&self) -> bool {
        matches!(self, Parameter::Positional(_))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Long(long) => write!(f, "--{}", long),
            Parameter::Positional(name) => write!(f, "{}", name),
        }
    }
}

/// A typed argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ArgValue>),
}

impl ArgValue {
    /// Compare against a literal from a spec file, e.g. a `required_if` value.
    pub fn matches_yaml(&self, other: &serde_yaml::Value) -> bool {
        use serde_yaml::Value;

        match (self, other) {
            (ArgValue::Bool(a), Value::Bool(b)) => a == b,
            (ArgValue::Int(a), Value::Number(b)) => b.as_i64() == Some(*a),
            (ArgValue::Float(a), Value::Number(b)) => b.as_f64() == Some(*a),
            (ArgValue::Str(a), Value::String(b)) => a == b,
            (ArgValue::Str(a), Value::Number(b)) => *a == b.to_string(),
            (ArgValue::List(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches_yaml(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Int(i) => write!(f, "{}", i),
            ArgValue::Float(x) => write!(f, "{}", x),
            ArgValue::Str(s) => write!(f, "{}", s),
            ArgValue::List(items) => write!(f, "{}", items.iter().join(", ")),
        }
    }
}

/// One command-line argument of a playbook.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    /// Variable name, unique within its command.
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub help: Option<String>,
    /// Allowed values for choice arguments and choice lists.
    pub choices: Vec<String>,
    pub multiplicity: Multiplicity,
    pub parameter: Parameter,
    /// Variable name override passed to the playbook.
    pub target: Option<String>,
    pub format: Option<Format>,
    /// Value stored when a bool flag is given; `None` for bools that take a value.
    pub flag: Option<bool>,
    /// Drop repeated identical values of a sequence.
    pub unique: bool,
}

impl ArgumentSpec {
    /// A single, optional, string argument exposed as `--<name>`.
    pub fn new(name: &str, kind: ArgKind) -> Self {
        let flag = (kind == ArgKind::Bool).then_some(true);
        let multiplicity = if kind == ArgKind::List {
            Multiplicity::Sequence
        } else {
            Multiplicity::Single
        };

        ArgumentSpec {
            name: name.to_string(),
            kind,
            required: false,
            default: None,
            help: None,
            choices: Vec::new(),
            multiplicity,
            parameter: Parameter::Long(name.replace('_', "-")),
            target: None,
            format: None,
            flag,
            unique: false,
        }
    }

    /// The variable this argument sets in the playbook run.
    pub fn variable_name(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.name)
    }

    /// Kind of each individual value given on the command line.
    pub fn element_kind(&self) -> ArgKind {
        match self.kind {
            ArgKind::List if !self.choices.is_empty() => ArgKind::Choice,
            ArgKind::List => ArgKind::String,
            kind => kind,
        }
    }

    pub fn is_flag(&self) -> bool {
        self.flag.is_some()
    }

    pub fn is_sequence(&self) -> bool {
        self.multiplicity == Multiplicity::Sequence
    }
}

/// Everything a playbook's metadata declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybookSpec {
    pub help: Option<String>,
    pub arguments: Vec<ArgumentSpec>,
    pub constraints: Constraints,
}

impl PlaybookSpec {
    /// The first line of the help text.
    pub fn short_help(&self) -> Option<&str> {
        self.help
            .as_deref()
            .and_then(|help| help.lines().next())
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    /// The command-line spelling of an argument, falling back to its name.
    pub fn parameter_of(&self, name: &str) -> String {
        self.argument(name)
            .map(|arg| arg.parameter.to_string())
            .unwrap_or_else(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    #[test]
    fn test_kind_parse() {
        assert_eq!(ArgKind::parse("int"), Some(ArgKind::Int));
        assert_eq!(ArgKind::parse("list"), Some(ArgKind::List));
        assert_eq!(ArgKind::parse("tuple"), None);
    }

    #[test]
    fn test_arg_value_serializes_plainly() {
        let value = ArgValue::List(vec![
            ArgValue::Str("a".to_string()),
            ArgValue::Int(2),
            ArgValue::Bool(true),
        ]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"["a",2,true]"#);
    }

    #[test]
    fn test_matches_yaml() {
        assert!(ArgValue::Int(1).matches_yaml(&Value::from(1)));
        assert!(ArgValue::Str("1".to_string()).matches_yaml(&Value::from(1)));
        assert!(ArgValue::Bool(false).matches_yaml(&Value::Bool(false)));
        assert!(!ArgValue::Str("yes".to_string()).matches_yaml(&Value::Bool(true)));
    }

    #[test]
    fn test_element_kind() {
        let mut arg = ArgumentSpec::new("tags", ArgKind::List);
        assert_eq!(arg.element_kind(), ArgKind::String);
        arg.choices = vec!["a".to_string()];
        assert_eq!(arg.element_kind(), ArgKind::Choice);
        assert!(arg.is_sequence());
    }

    #[test]
    fn test_short_help() {
        let spec = PlaybookSpec {
            help: Some("Deploy things\n\nLonger text".to_string()),
            ..Default::default()
        };
        assert_eq!(spec.short_help(), Some("Deploy things"));
    }
}
