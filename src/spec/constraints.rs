//! Cross-argument constraints declared in playbook metadata.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

use super::{ArgValue, PlaybookSpec};
use crate::error::SpecError;

/// `[argument, value, [arguments...]]`
pub type Conditional = (String, Value, Vec<String>);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Constraints {
    pub required_together: Vec<Vec<String>>,
    pub required_one_of: Vec<Vec<String>>,
    pub mutually_exclusive: Vec<Vec<String>>,
    pub required_if: Vec<Conditional>,
    pub forbidden_if: Vec<Conditional>,
}

impl Constraints {
    /// Fold another set of constraints into this one.
    pub fn merge(&mut self, other: Constraints) {
        self.required_together.extend(other.required_together);
        self.required_one_of.extend(other.required_one_of);
        self.mutually_exclusive.extend(other.mutually_exclusive);
        self.required_if.extend(other.required_if);
        self.forbidden_if.extend(other.forbidden_if);
    }

    pub fn is_empty(&self) -> bool {
        self.required_together.is_empty()
            && self.required_one_of.is_empty()
            && self.mutually_exclusive.is_empty()
            && self.required_if.is_empty()
            && self.forbidden_if.is_empty()
    }

    /// Every argument name used by a constraint, with the constraint it appears in.
    fn references(&self) -> Vec<(&'static str, &str)> {
        let mut names = Vec::new();
        for group in &self.required_together {
            names.extend(group.iter().map(|n| ("required_together", n.as_str())));
        }
        for group in &self.required_one_of {
            names.extend(group.iter().map(|n| ("required_one_of", n.as_str())));
        }
        for group in &self.mutually_exclusive {
            names.extend(group.iter().map(|n| ("mutually_exclusive", n.as_str())));
        }
        for (name, _, others) in &self.required_if {
            names.push(("required_if", name.as_str()));
            names.extend(others.iter().map(|n| ("required_if", n.as_str())));
        }
        for (name, _, others) in &self.forbidden_if {
            names.push(("forbidden_if", name.as_str()));
            names.extend(others.iter().map(|n| ("forbidden_if", n.as_str())));
        }
        names
    }

    /// Fail if a constraint names an argument that is not declared.
    pub fn check_references<'a, I>(&self, declared: I) -> Result<(), SpecError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let declared: Vec<&str> = declared.into_iter().collect();
        for (constraint, name) in self.references() {
            if !declared.contains(&name) {
                return Err(SpecError::UnknownConstraintArgument {
                    constraint: constraint.to_string(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn format_list(spec: &PlaybookSpec, names: &[String]) -> String {
    let parameters: Vec<String> = names
        .iter()
        .map(|name| format!("'{}'", spec.parameter_of(name)))
        .collect();
    format!("[{}]", parameters.join(", "))
}

fn format_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Check parsed values against the constraints of a playbook.
///
/// An argument counts as present when it has a value, whether it came from
/// the command line or from a default. Returns one message per violation.
pub fn validate(spec: &PlaybookSpec, values: &BTreeMap<String, ArgValue>) -> Vec<String> {
    let constraints = &spec.constraints;
    let present = |name: &String| values.contains_key(name);
    let mut errors = Vec::new();

    for group in &constraints.required_together {
        let count = group.iter().filter(|n| present(*n)).count();
        if count > 0 && count < group.len() {
            errors.push(format!("{} are required together", format_list(spec, group)));
        }
    }

    for group in &constraints.required_one_of {
        if !group.iter().any(present) {
            errors.push(format!("one of {} is required", format_list(spec, group)));
        }
    }

    for (name, expected, required) in &constraints.required_if {
        let triggered = values
            .get(name)
            .map(|value| value.matches_yaml(expected))
            .unwrap_or(false);
        if triggered && !required.iter().all(present) {
            errors.push(format!(
                "{} are required because {} is {}",
                format_list(spec, required),
                spec.parameter_of(name),
                format_literal(expected)
            ));
        }
    }

    for (name, expected, forbidden) in &constraints.forbidden_if {
        let triggered = values
            .get(name)
            .map(|value| value.matches_yaml(expected))
            .unwrap_or(false);
        if triggered && forbidden.iter().any(present) {
            errors.push(format!(
                "{} are forbidden because {} is {}",
                format_list(spec, forbidden),
                spec.parameter_of(name),
                format_literal(expected)
            ));
        }
    }

    for group in &constraints.mutually_exclusive {
        if group.iter().filter(|n| present(*n)).count() > 1 {
            errors.push(format!("{} are mutually exclusive", format_list(spec, group)));
        }
    }

    errors
}
