//! Reads playbook metadata files into [`PlaybookSpec`]s.

use log::{debug, warn};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::{
    ArgKind, ArgValue, ArgumentSpec, Constraints, Format, Multiplicity, Parameter, PlaybookSpec,
};
use crate::error::SpecError;

/// Metadata file contents before any validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMetadata {
    help: Option<String>,
    include: Vec<String>,
    variables: Value,
    constraints: Constraints,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawArgument {
    name: Option<String>,
    kind: Option<String>,
    #[serde(rename = "type")]
    format: Option<String>,
    action: Option<String>,
    required: bool,
    default: Option<Value>,
    help: Option<String>,
    choices: Option<Vec<Value>>,
    multiple: bool,
    parameter: Option<String>,
    dest: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Store,
    StoreTrue,
    StoreFalse,
    Append,
    AppendUnique,
}

impl Action {
    fn parse(action: &str) -> Option<Action> {
        match action {
            "store" => Some(Action::Store),
            "store_true" => Some(Action::StoreTrue),
            "store_false" => Some(Action::StoreFalse),
            "append" => Some(Action::Append),
            "append_unique" => Some(Action::AppendUnique),
            _ => None,
        }
    }

    fn is_flag(&self) -> bool {
        matches!(self, Action::StoreTrue | Action::StoreFalse)
    }

    fn is_append(&self) -> bool {
        matches!(self, Action::Append | Action::AppendUnique)
    }
}

fn malformed(name: &str, message: impl Into<String>) -> SpecError {
    SpecError::Malformed {
        name: name.to_string(),
        message: message.into(),
    }
}

fn parse_metadata(text: &str, source: &Path) -> Result<RawMetadata, SpecError> {
    if text.trim().is_empty() {
        return Ok(RawMetadata::default());
    }
    serde_yaml::from_str(text).map_err(|e| SpecError::Yaml {
        path: source.to_path_buf(),
        source: e,
    })
}

fn read_metadata(path: &Path) -> Result<RawMetadata, SpecError> {
    match fs::read_to_string(path) {
        Ok(text) => parse_metadata(&text, path),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No metadata at {}", path.display());
            Ok(RawMetadata::default())
        }
        Err(e) => Err(SpecError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Split the `variables` section into named raw arguments, keeping declaration order.
fn raw_variables(variables: Value) -> Result<Vec<(String, RawArgument)>, SpecError> {
    let mut result: Vec<(String, RawArgument)> = Vec::new();

    match variables {
        Value::Null => {}
        Value::Mapping(map) => {
            for (key, options) in map {
                let name = match key {
                    Value::String(name) => name,
                    _ => return Err(SpecError::VariablesShape),
                };
                let raw: RawArgument = match options {
                    Value::Null => RawArgument::default(),
                    options => serde_yaml::from_value(options)
                        .map_err(|e| malformed(&name, e.to_string()))?,
                };
                if raw.name.as_deref().is_some_and(|n| n != name) {
                    return Err(malformed(&name, "'name' does not match the variable key"));
                }
                result.push((name, raw));
            }
        }
        Value::Sequence(items) => {
            for (index, item) in items.into_iter().enumerate() {
                let raw: RawArgument = serde_yaml::from_value(item)
                    .map_err(|e| malformed(&format!("#{}", index), e.to_string()))?;
                let name = raw
                    .name
                    .clone()
                    .ok_or_else(|| malformed(&format!("#{}", index), "missing 'name'"))?;
                if result.iter().any(|(existing, _)| *existing == name) {
                    return Err(SpecError::DuplicateName(name));
                }
                result.push((name, raw));
            }
        }
        _ => return Err(SpecError::VariablesShape),
    }

    Ok(result)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_default(value: &Value, kind: ArgKind, arg: &ArgumentSpec) -> Result<ArgValue, SpecError> {
    let invalid = |message: &str| SpecError::InvalidDefault {
        name: arg.name.clone(),
        message: message.to_string(),
    };

    match kind {
        ArgKind::String | ArgKind::List => scalar_to_string(value)
            .map(ArgValue::Str)
            .ok_or_else(|| invalid("expected a string")),
        ArgKind::Int => value
            .as_i64()
            .map(ArgValue::Int)
            .ok_or_else(|| invalid("expected an integer")),
        ArgKind::Float => value
            .as_f64()
            .map(ArgValue::Float)
            .ok_or_else(|| invalid("expected a number")),
        ArgKind::Bool => value
            .as_bool()
            .map(ArgValue::Bool)
            .ok_or_else(|| invalid("expected true or false")),
        ArgKind::Choice => {
            let choice = scalar_to_string(value).ok_or_else(|| invalid("expected a scalar"))?;
            if arg.choices.contains(&choice) {
                Ok(ArgValue::Str(choice))
            } else {
                Err(SpecError::ChoiceDefault {
                    name: arg.name.clone(),
                    default: choice,
                    choices: arg.choices.join(", "),
                })
            }
        }
    }
}

fn default_value(value: &Value, arg: &ArgumentSpec) -> Result<ArgValue, SpecError> {
    let kind = arg.element_kind();
    if !arg.is_sequence() {
        return coerce_default(value, kind, arg);
    }

    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| coerce_default(item, kind, arg))
            .collect::<Result<Vec<_>, _>>()
            .map(ArgValue::List),
        _ => Err(SpecError::InvalidDefault {
            name: arg.name.clone(),
            message: "expected a list".to_string(),
        }),
    }
}

fn derive_parameter(playbook_name: &str, name: &str, declared: Option<&str>) -> Result<Parameter, SpecError> {
    match declared {
        Some(parameter) if parameter.starts_with("--") => {
            let long = &parameter[2..];
            if long.is_empty() || long.contains(char::is_whitespace) || long.contains('=') {
                return Err(malformed(name, format!("invalid parameter '{}'", parameter)));
            }
            Ok(Parameter::Long(long.to_string()))
        }
        Some(parameter) if parameter.starts_with('-') || parameter.is_empty() => Err(malformed(
            name,
            format!("parameter '{}' must be --long or a positional name", parameter),
        )),
        Some(parameter) => Ok(Parameter::Positional(parameter.to_string())),
        None => {
            let prefix = format!("{}_", playbook_name);
            let short = name.strip_prefix(&prefix).unwrap_or(name);
            Ok(Parameter::Long(short.replace('_', "-")))
        }
    }
}

fn build_argument(playbook_name: &str, name: String, raw: RawArgument) -> Result<ArgumentSpec, SpecError> {
    let format = match raw.format.as_deref() {
        Some(f) => Some(Format::parse(f).ok_or_else(|| SpecError::UnknownFormat {
            name: name.clone(),
            format: f.to_string(),
        })?),
        None => None,
    };

    let action = match raw.action.as_deref() {
        Some(a) => Action::parse(a).ok_or_else(|| SpecError::UnknownAction {
            name: name.clone(),
            action: a.to_string(),
        })?,
        None => Action::Store,
    };

    let declared_kind = match raw.kind.as_deref() {
        Some(k) => Some(ArgKind::parse(k).ok_or_else(|| SpecError::UnknownKind {
            name: name.clone(),
            kind: k.to_string(),
        })?),
        None => None,
    };

    let choices = raw
        .choices
        .unwrap_or_default()
        .iter()
        .map(|choice| {
            scalar_to_string(choice).ok_or_else(|| malformed(&name, "choices must be scalars"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let kind = declared_kind.unwrap_or_else(|| {
        if action.is_flag() {
            ArgKind::Bool
        } else if let Some(format) = format {
            format.kind()
        } else if !choices.is_empty() {
            ArgKind::Choice
        } else if action.is_append() {
            ArgKind::List
        } else {
            ArgKind::String
        }
    });

    let multiplicity = if kind == ArgKind::List || raw.multiple || action.is_append() {
        Multiplicity::Sequence
    } else {
        Multiplicity::Single
    };

    if action.is_flag() && (kind != ArgKind::Bool || format.is_some()) {
        return Err(malformed(&name, "store_true/store_false need a bool argument without a type"));
    }

    if let Some(format) = format {
        if !format.fits(kind) {
            return Err(malformed(
                &name,
                format!("type {} cannot be used with kind {}", format.name(), kind.as_str()),
            ));
        }
    }

    let flag = (kind == ArgKind::Bool && format.is_none()).then(|| action != Action::StoreFalse);

    if flag.is_some() && multiplicity == Multiplicity::Sequence {
        return Err(malformed(&name, "bool flags cannot be repeated"));
    }

    if kind == ArgKind::Choice && choices.is_empty() {
        return Err(SpecError::MissingChoices(name));
    }

    if !choices.is_empty() && !matches!(kind, ArgKind::Choice | ArgKind::List) {
        return Err(malformed(&name, "choices need kind choice or list"));
    }

    let parameter = derive_parameter(playbook_name, &name, raw.parameter.as_deref())?;

    if flag.is_some() && parameter.is_positional() {
        return Err(malformed(&name, "bool flags cannot be positional"));
    }

    if raw.required && flag.is_some() {
        return Err(malformed(&name, "bool flags cannot be required"));
    }

    if raw.required && raw.default.is_some() {
        return Err(SpecError::RequiredWithDefault(name));
    }

    let mut arg = ArgumentSpec {
        name,
        kind,
        required: raw.required,
        default: None,
        help: raw.help,
        choices,
        multiplicity,
        parameter,
        target: raw.dest,
        format,
        flag,
        unique: action == Action::AppendUnique,
    };

    if let Some(default) = &raw.default {
        arg.default = Some(default_value(default, &arg)?);
    }

    // giving a flag must change its value
    if let (Some(flag), Some(ArgValue::Bool(default))) = (arg.flag, &arg.default) {
        if flag == *default {
            if action.is_flag() {
                return Err(malformed(
                    &arg.name,
                    format!("flag stores {} which is already the default", flag),
                ));
            }
            arg.flag = Some(!flag);
        }
    }

    Ok(arg)
}

/// Validate a full argument list: unique parameters, unique variables, positional order.
///
/// Only the last positional may be optional or take several values, so every
/// bare token lands in the argument it was meant for.
fn check_arguments(arguments: &[ArgumentSpec]) -> Result<(), SpecError> {
    let mut parameters: HashMap<String, &str> = HashMap::new();
    let mut variables: HashMap<&str, &str> = HashMap::new();
    let mut open_sequence: Option<&ArgumentSpec> = None;
    let mut open_optional: Option<&ArgumentSpec> = None;

    for arg in arguments {
        let parameter = arg.parameter.to_string();
        if let Some(first) = parameters.insert(parameter.clone(), &arg.name) {
            return Err(SpecError::DuplicateParameter {
                parameter,
                first: first.to_string(),
                second: arg.name.clone(),
            });
        }

        if let Some(first) = variables.insert(arg.variable_name(), &arg.name) {
            return Err(SpecError::DuplicateTarget {
                variable: arg.variable_name().to_string(),
                first: first.to_string(),
                second: arg.name.clone(),
            });
        }

        if arg.parameter.is_positional() {
            if let Some(previous) = open_sequence {
                return Err(SpecError::PositionalOrder {
                    name: arg.name.clone(),
                    previous: previous.name.clone(),
                });
            }
            if let Some(previous) = open_optional {
                return Err(SpecError::PositionalAfterOptional {
                    name: arg.name.clone(),
                    previous: previous.name.clone(),
                });
            }
            if arg.is_sequence() {
                open_sequence = Some(arg);
            } else if !arg.required {
                open_optional = Some(arg);
            }
        }
    }

    Ok(())
}

fn build_spec(
    playbook_name: &str,
    metadata: RawMetadata,
    variables: Vec<(String, RawArgument)>,
    constraints: Constraints,
) -> Result<PlaybookSpec, SpecError> {
    let arguments = variables
        .into_iter()
        .map(|(name, raw)| build_argument(playbook_name, name, raw))
        .collect::<Result<Vec<_>, _>>()?;

    check_arguments(&arguments)?;
    constraints.check_references(arguments.iter().map(|arg| arg.name.as_str()))?;

    debug!(
        "Loaded {} arguments for playbook '{}'",
        arguments.len(),
        playbook_name
    );

    Ok(PlaybookSpec {
        help: metadata.help,
        arguments,
        constraints,
    })
}

/// Parse a metadata document for `playbook_name`. Includes are not resolved.
pub fn load_spec(text: &str, source: &Path, playbook_name: &str) -> Result<PlaybookSpec, SpecError> {
    let mut metadata = parse_metadata(text, source)?;
    let variables = raw_variables(std::mem::take(&mut metadata.variables))?;
    let constraints = std::mem::take(&mut metadata.constraints);
    build_spec(playbook_name, metadata, variables, constraints)
}

/// Load the metadata file at `path`, resolving includes against `include_root`.
///
/// A missing metadata file yields an empty spec. Included variables replace
/// local variables of the same name.
pub fn load_spec_file(
    path: &Path,
    playbook_name: &str,
    include_root: &Path,
    metadata_name: &str,
) -> Result<PlaybookSpec, SpecError> {
    let mut metadata = read_metadata(path)?;
    let mut variables = raw_variables(std::mem::take(&mut metadata.variables))?;
    let mut constraints = std::mem::take(&mut metadata.constraints);

    for include in &metadata.include {
        let include_path = include_root.join(include).join(metadata_name);
        if !include_path.exists() {
            warn!(
                "Include '{}' of playbook '{}' has no metadata at {}",
                include,
                playbook_name,
                include_path.display()
            );
        }

        let wrap = |source: SpecError| SpecError::Include {
            include: include.clone(),
            source: Box::new(source),
        };
        let mut included = read_metadata(&include_path).map_err(wrap)?;
        let included_vars = raw_variables(std::mem::take(&mut included.variables)).map_err(wrap)?;

        for (name, raw) in included_vars {
            match variables.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = raw,
                None => variables.push((name, raw)),
            }
        }
        constraints.merge(included.constraints);
    }

    build_spec(playbook_name, metadata, variables, constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn load(text: &str) -> Result<PlaybookSpec, SpecError> {
        load_spec(text, Path::new("metadata.playwrap.yaml"), "deploy")
    }

    #[test]
    fn test_empty_metadata() {
        let spec = load("").unwrap();
        assert!(spec.arguments.is_empty());
        assert!(spec.help.is_none());
    }

    #[test]
    fn test_count_scenario() {
        let spec = load(
            r#"
variables:
  count:
    kind: int
    required: false
    default: 1
"#,
        )
        .unwrap();
        let count = &spec.arguments[0];
        assert_eq!(count.name, "count");
        assert_eq!(count.kind, ArgKind::Int);
        assert_eq!(count.default, Some(ArgValue::Int(1)));
        assert_eq!(count.parameter, Parameter::Long("count".to_string()));
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let spec = load(
            r#"
variables:
  zeta: {}
  alpha:
  mid: {help: middle}
"#,
        )
        .unwrap();
        let names: Vec<&str> = spec.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_parameter_derivation() {
        let spec = load(
            r#"
variables:
  deploy_message: {}
  other_option: {}
  explicit:
    parameter: --given
  where:
    parameter: where
"#,
        )
        .unwrap();
        let params: Vec<String> = spec.arguments.iter().map(|a| a.parameter.to_string()).collect();
        assert_eq!(params, vec!["--message", "--other-option", "--given", "where"]);
    }

    #[test]
    fn test_kind_inference() {
        let spec = load(
            r#"
variables:
  force:
    action: store_true
  keep:
    action: store_false
  enabled:
    type: Boolean
  port:
    type: Port
  color:
    choices: [red, blue]
  items:
    action: append
  plugins:
    action: append_unique
"#,
        )
        .unwrap();
        let force = spec.argument("force").unwrap();
        assert_eq!((force.kind, force.flag), (ArgKind::Bool, Some(true)));
        assert_eq!(spec.argument("keep").unwrap().flag, Some(false));
        let enabled = spec.argument("enabled").unwrap();
        assert_eq!((enabled.kind, enabled.flag), (ArgKind::Bool, None));
        assert_eq!(spec.argument("port").unwrap().kind, ArgKind::Int);
        assert_eq!(spec.argument("color").unwrap().kind, ArgKind::Choice);
        let items = spec.argument("items").unwrap();
        assert_eq!(items.kind, ArgKind::List);
        assert!(items.is_sequence());
        assert!(!items.unique);
        assert!(spec.argument("plugins").unwrap().unique);
    }

    #[test]
    fn test_list_form_and_dest() {
        let spec = load(
            r#"
variables:
  - name: tags
    kind: list
    default: [a, b]
    dest: mapped_tags
"#,
        )
        .unwrap();
        let tags = &spec.arguments[0];
        assert_eq!(tags.variable_name(), "mapped_tags");
        assert_eq!(
            tags.default,
            Some(ArgValue::List(vec![
                ArgValue::Str("a".to_string()),
                ArgValue::Str("b".to_string())
            ]))
        );
    }

    #[test]
    fn test_unknown_kind() {
        let err = load("variables: {x: {kind: tuple}}").unwrap_err();
        assert!(matches!(err, SpecError::UnknownKind { ref kind, .. } if kind == "tuple"));
    }

    #[test]
    fn test_unknown_type_and_action() {
        assert!(matches!(
            load("variables: {x: {type: Email}}").unwrap_err(),
            SpecError::UnknownFormat { .. }
        ));
        assert!(matches!(
            load("variables: {x: {action: count}}").unwrap_err(),
            SpecError::UnknownAction { .. }
        ));
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            load("variables: {x: {requried: true}}").unwrap_err(),
            SpecError::Malformed { .. }
        ));
    }

    #[test]
    fn test_required_with_default() {
        let err = load("variables: {x: {required: true, default: a}}").unwrap_err();
        assert!(matches!(err, SpecError::RequiredWithDefault(ref n) if n == "x"));
    }

    #[test]
    fn test_duplicate_name() {
        let err = load("variables: [{name: x}, {name: x}]").unwrap_err();
        assert!(matches!(err, SpecError::DuplicateName(ref n) if n == "x"));
    }

    #[test]
    fn test_duplicate_parameter_and_target() {
        assert!(matches!(
            load("variables: {deploy_x: {}, x: {}}").unwrap_err(),
            SpecError::DuplicateParameter { .. }
        ));
        assert!(matches!(
            load("variables: {a: {dest: v}, b: {dest: v}}").unwrap_err(),
            SpecError::DuplicateTarget { .. }
        ));
    }

    #[test]
    fn test_choice_default() {
        assert!(load("variables: {c: {choices: [a, b], default: a}}").is_ok());
        let err = load("variables: {c: {choices: [a, b], default: z}}").unwrap_err();
        assert!(matches!(err, SpecError::ChoiceDefault { ref default, .. } if default == "z"));
        assert!(matches!(
            load("variables: {c: {kind: choice}}").unwrap_err(),
            SpecError::MissingChoices(_)
        ));
    }

    #[test]
    fn test_default_type_mismatch() {
        assert!(matches!(
            load("variables: {n: {kind: int, default: many}}").unwrap_err(),
            SpecError::InvalidDefault { .. }
        ));
        assert!(matches!(
            load("variables: {l: {kind: list, default: one}}").unwrap_err(),
            SpecError::InvalidDefault { .. }
        ));
    }

    #[test]
    fn test_flag_restrictions() {
        assert!(load("variables: {f: {kind: bool, required: true}}").is_err());
        assert!(load("variables: {f: {kind: bool, parameter: f}}").is_err());
        assert!(load("variables: {f: {kind: string, action: store_true}}").is_err());
        assert!(load("variables: {f: {kind: string, type: Port}}").is_err());
    }

    #[test]
    fn test_positional_order() {
        let err = load(
            r#"
variables:
  files: {parameter: files, kind: list}
  dest: {parameter: dest}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::PositionalOrder { .. }));
    }

    #[test]
    fn test_optional_positional_must_be_last() {
        let err = load(
            r#"
variables:
  source: {parameter: source}
  dest: {parameter: dest}
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SpecError::PositionalAfterOptional { ref name, ref previous } if name == "dest" && previous == "source"
        ));

        assert!(load(
            r#"
variables:
  source: {parameter: source, required: true}
  dest: {parameter: dest}
"#,
        )
        .is_ok());
    }

    #[test]
    fn test_bool_flag_moves_away_from_default() {
        let spec = load(
            r#"
variables:
  enabled: {kind: bool, default: true}
  quiet: {kind: bool, default: false}
  plain: {kind: bool}
"#,
        )
        .unwrap();
        assert_eq!(spec.argument("enabled").unwrap().flag, Some(false));
        assert_eq!(spec.argument("quiet").unwrap().flag, Some(true));
        assert_eq!(spec.argument("plain").unwrap().flag, Some(true));

        assert!(matches!(
            load("variables: {f: {action: store_true, default: true}}").unwrap_err(),
            SpecError::Malformed { .. }
        ));
        assert!(matches!(
            load("variables: {f: {action: store_false, default: false}}").unwrap_err(),
            SpecError::Malformed { .. }
        ));
        assert!(load("variables: {f: {action: store_false, default: true}}").is_ok());
    }

    #[test]
    fn test_constraint_reference() {
        let err = load(
            r#"
variables:
  a: {}
constraints:
  required_together: [[a, b]]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::UnknownConstraintArgument { .. }));
    }

    #[test]
    fn test_includes() {
        let root = tempfile::tempdir().unwrap();
        let common = root.path().join("common");
        fs::create_dir(&common).unwrap();
        fs::write(
            common.join("metadata.playwrap.yaml"),
            "variables:\n  shared: {help: from include}\n  local: {kind: int}\n",
        )
        .unwrap();
        let own = root.path().join("deploy");
        fs::create_dir(&own).unwrap();
        let path = own.join("metadata.playwrap.yaml");
        fs::write(
            &path,
            "help: Deploy\ninclude: [common]\nvariables:\n  local: {}\n  own: {}\n",
        )
        .unwrap();

        let spec = load_spec_file(&path, "deploy", root.path(), "metadata.playwrap.yaml").unwrap();
        let names: Vec<&str> = spec.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["local", "own", "shared"]);
        assert_eq!(spec.argument("local").unwrap().kind, ArgKind::Int);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let spec = load_spec_file(
            &PathBuf::from("/nonexistent/metadata.playwrap.yaml"),
            "x",
            Path::new("/nonexistent"),
            "metadata.playwrap.yaml",
        )
        .unwrap();
        assert_eq!(spec, PlaybookSpec::default());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            load("variables: [unclosed").unwrap_err(),
            SpecError::Yaml { .. }
        ));
    }
}
