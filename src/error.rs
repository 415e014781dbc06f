use std::path::PathBuf;
use thiserror::Error;

/// The runner finished successfully or `--help` was shown.
pub const EXIT_SUCCESS: i32 = 0;
/// Unknown command, bad argument value or violated constraint.
pub const EXIT_USAGE: i32 = 64;
/// The playbook tree or one of its specs is broken.
pub const EXIT_CONFIG: i32 = 78;
/// The runner program could not be started.
pub const EXIT_NOT_FOUND: i32 = 127;
/// The run was interrupted or the runner was killed by a signal.
pub const EXIT_INTERRUPTED: i32 = 130;

/// A malformed parameter specification.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("variables must be a mapping or a list of mappings")]
    VariablesShape,

    #[error("argument '{name}': {message}")]
    Malformed { name: String, message: String },

    #[error("argument '{name}': unknown kind '{kind}'")]
    UnknownKind { name: String, kind: String },

    #[error("argument '{name}': unknown type '{format}'")]
    UnknownFormat { name: String, format: String },

    #[error("argument '{name}': unknown action '{action}'")]
    UnknownAction { name: String, action: String },

    #[error("argument '{0}' is required and cannot have a default")]
    RequiredWithDefault(String),

    #[error("argument '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("parameter '{parameter}' is used by both '{first}' and '{second}'")]
    DuplicateParameter {
        parameter: String,
        first: String,
        second: String,
    },

    #[error("variable '{variable}' is set by both '{first}' and '{second}'")]
    DuplicateTarget {
        variable: String,
        first: String,
        second: String,
    },

    #[error("argument '{0}' has kind choice but no choices")]
    MissingChoices(String),

    #[error("argument '{name}': default '{default}' is not one of: {choices}")]
    ChoiceDefault {
        name: String,
        default: String,
        choices: String,
    },

    #[error("argument '{name}': invalid default: {message}")]
    InvalidDefault { name: String, message: String },

    #[error("argument '{name}': positional '{previous}' accepts multiple values and must be last")]
    PositionalOrder { name: String, previous: String },

    #[error("argument '{name}': positional '{previous}' is optional and must be last")]
    PositionalAfterOptional { name: String, previous: String },

    #[error("constraint {constraint} refers to unknown argument '{name}'")]
    UnknownConstraintArgument { constraint: String, name: String },

    #[error("include '{include}': {source}")]
    Include {
        include: String,
        #[source]
        source: Box<SpecError>,
    },
}

/// A conflict found while building the command tree.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Playbook directory not found: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("Failed to scan {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid spec for playbook {}: {source}", playbook.display())]
    Spec {
        playbook: PathBuf,
        #[source]
        source: SpecError,
    },

    #[error("Failed to read playbook {}: {source:#}", playbook.display())]
    Playbook {
        playbook: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("command '{name}' is defined more than once in {}", parent.display())]
    DuplicateCommand { parent: PathBuf, name: String },

    #[error("command '{command}': argument '{argument}' collides with the reserved '{reserved}' flag")]
    ReservedName {
        command: String,
        argument: String,
        reserved: String,
    },

    #[error("command '{command}' takes targets and cannot declare positional argument '{argument}'")]
    PositionalWithTargets { command: String, argument: String },
}

/// The user asked for something the command tree cannot do.
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("no such command '{token}' for '{command}'")]
    NoSuchCommand {
        command: String,
        token: String,
        usage: String,
    },

    #[error("'{command}' requires a subcommand")]
    MissingCommand { command: String, usage: String },

    #[error("{0}")]
    Clap(#[from] clap::Error),

    #[error("Could not find your inventory at {}", .0.display())]
    MissingInventory(PathBuf),

    #[error("Failed to read inventory: {0:#}")]
    Inventory(#[source] anyhow::Error),
}

impl UsageError {
    /// Help text to show after the error message, if any.
    pub fn usage(&self) -> Option<&str> {
        match self {
            UsageError::NoSuchCommand { usage, .. } | UsageError::MissingCommand { usage, .. } => {
                Some(usage)
            }
            _ => None,
        }
    }
}

/// An argument value that does not satisfy its spec.
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("argument '{name}': invalid value '{token}': {reason}")]
    InvalidValue {
        name: String,
        token: String,
        reason: String,
    },

    #[error("argument '{name}': invalid choice '{token}' (choose from {choices})")]
    InvalidChoice {
        name: String,
        token: String,
        choices: String,
    },

    #[error("argument '{0}' is required")]
    MissingRequired(String),

    #[error("{}", .0.join("\n"))]
    Constraints(Vec<String>),
}

impl ParseError {
    /// The argument the error is about, if it names one.
    pub fn argument(&self) -> Option<&str> {
        match self {
            ParseError::InvalidValue { name, .. }
            | ParseError::InvalidChoice { name, .. }
            | ParseError::MissingRequired(name) => Some(name),
            ParseError::Constraints(_) => None,
        }
    }
}

/// The runner could not be driven at all.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize variables: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Build(_) => EXIT_CONFIG,
            Error::Usage(UsageError::Clap(e)) if !e.use_stderr() => EXIT_SUCCESS,
            Error::Usage(_) | Error::Parse(_) => EXIT_USAGE,
            Error::Bridge(BridgeError::Spawn { .. }) => EXIT_NOT_FOUND,
            Error::Bridge(_) => EXIT_CONFIG,
        }
    }
}
