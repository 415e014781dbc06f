use serde::Serialize;
use std::collections::BTreeMap;

use crate::args::ParsedArgs;
use crate::spec::{ArgValue, ArgumentSpec};

/// Variables handed to the playbook run, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VariableSet(BTreeMap<String, ArgValue>);

impl VariableSet {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object with sorted keys.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

/// Project parsed values onto playbook variable names.
///
/// Each argument with a value lands under its `dest` override, or its own name.
pub fn map_variables(arguments: &[ArgumentSpec], parsed: &ParsedArgs) -> VariableSet {
    let variables = arguments
        .iter()
        .filter_map(|arg| {
            parsed
                .get(&arg.name)
                .map(|value| (arg.variable_name().to_string(), value.clone()))
        })
        .collect();
    VariableSet(variables)
}
