use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// The narrow subset of a HAL-style scenario JSON file this system reads
/// (spec.md §6). Unknown fields are ignored (no `deny_unknown_fields`):
/// reading a general HAL-JSON schema is explicitly out of scope, only this
/// field list is.
#[derive(Debug, Deserialize)]
pub struct HalDocument {
    #[serde(rename = "configurationSpace")]
    pub configuration_space: ConfigurationSpace,
    #[serde(rename = "scenarioSpace")]
    pub scenario_space: ScenarioSpace,
    pub implementation: Implementation,
}

#[derive(Debug, Deserialize)]
pub struct ConfigurationSpace {
    pub parameters: HashMap<String, ParameterItems>,
    #[serde(default)]
    pub conditionals: HashMap<String, Vec<HashMap<String, ParameterItems>>>,
}

#[derive(Debug, Deserialize)]
pub struct ParameterItems {
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioSpace {
    pub parameters: ScenarioParameters,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioParameters {
    pub num: DefaultField,
    pub seed: DefaultField,
}

#[derive(Debug, Deserialize)]
pub struct DefaultField {
    pub default: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct Implementation {
    #[serde(rename = "instanceSpace")]
    pub instance_space: InstanceSpace,
    #[serde(rename = "inputFormat")]
    pub input_format: InputFormat,
    #[serde(rename = "outputFormat")]
    pub output_format: OutputFormat,
    pub executable: String,
}

#[derive(Debug, Deserialize)]
pub struct InstanceSpace {
    pub semantics: InstanceSemantics,
}

#[derive(Debug, Deserialize)]
pub struct InstanceSemantics {
    #[serde(rename = "INSTANCE_FILE")]
    pub instance_file: String,
}

#[derive(Debug, Deserialize)]
pub struct InputFormat {
    pub callstring: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct OutputFormat {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// The regex pattern the executor matches to detect a target run that was
/// interrupted by the wall-clock deadline, appended to the stdout pattern
/// list loaded from JSON (spec.md §6).
pub const INTERRUPTED_PATTERN: &str = "INTERRUPTED : $interrupted$";

/// Fields extracted from a [`HalDocument`], with scenario defaults already
/// rendered to strings for use as [`crate::Callstring`] constants.
pub struct LoadedScenario {
    pub parameters: Vec<(String, Vec<String>, Option<paramcts_types::Condition>)>,
    pub callstring_template: String,
    pub callstring_constants: HashMap<String, String>,
    pub stdout_patterns: Vec<String>,
    pub stderr_patterns: Vec<String>,
    pub instance_variable: String,
    pub executable: String,
}

pub fn load(path: impl AsRef<Path>) -> Result<LoadedScenario, ConfigError> {
    let path_ref = path.as_ref();
    let text = std::fs::read_to_string(path_ref)
        .map_err(|source| ConfigError::Io { path: path_ref.display().to_string(), source })?;
    let doc: HalDocument = serde_json::from_str(&text)?;
    Ok(extract(doc))
}

fn extract(doc: HalDocument) -> LoadedScenario {
    let mut parameters = Vec::new();
    for (name, items) in &doc.configuration_space.parameters {
        let condition = doc.configuration_space.conditionals.get(name).map(|alternatives| {
            // The spec's Parameter condition is a single AND-map; a HAL
            // JSON conditional can list several alternative dependency
            // maps (OR'd). We merge them into one combined map — the
            // union of every alternative's allowed values per dependency
            // — since the richer OR-of-AND shape has no representation in
            // the core data model this system commits to.
            let mut merged: paramcts_types::Condition = HashMap::new();
            for alternative in alternatives {
                for (dep_name, dep_items) in alternative {
                    merged
                        .entry(dep_name.clone())
                        .or_default()
                        .extend(dep_items.items.iter().cloned());
                }
            }
            merged
        });
        parameters.push((name.clone(), items.items.clone(), condition));
    }

    let mut callstring_constants = HashMap::new();
    if let Some(num) = scalar_string(&doc.scenario_space.parameters.num.default) {
        callstring_constants.insert("num".to_string(), num);
    }
    if let Some(seed) = scalar_string(&doc.scenario_space.parameters.seed.default) {
        callstring_constants.insert("seed".to_string(), seed);
    }

    let mut stdout_patterns = doc.implementation.output_format.stdout;
    stdout_patterns.push(INTERRUPTED_PATTERN.to_string());

    LoadedScenario {
        parameters,
        callstring_template: doc.implementation.input_format.callstring.into_iter().next().unwrap_or_default(),
        callstring_constants,
        stdout_patterns,
        stderr_patterns: doc.implementation.output_format.stderr,
        instance_variable: doc.implementation.instance_space.semantics.instance_file,
        executable: doc.implementation.executable,
    }
}

fn scalar_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_fields_and_augments_interrupted_pattern() {
        let json = serde_json::json!({
            "configurationSpace": {
                "parameters": {"algo": {"items": ["a", "b"]}},
                "conditionals": {}
            },
            "scenarioSpace": {
                "parameters": {"num": {"default": 3}, "seed": {"default": 42}}
            },
            "implementation": {
                "instanceSpace": {"semantics": {"INSTANCE_FILE": "ins"}},
                "inputFormat": {"callstring": ["$ins$ --algo $algo$"]},
                "outputFormat": {"stdout": ["RESULT: $time$"], "stderr": []},
                "executable": "/bin/solver"
            }
        });
        let doc: HalDocument = serde_json::from_value(json).unwrap();
        let loaded = extract(doc);
        assert_eq!(loaded.instance_variable, "ins");
        assert_eq!(loaded.executable, "/bin/solver");
        assert_eq!(loaded.callstring_constants.get("num").unwrap(), "3");
        assert!(loaded.stdout_patterns.contains(&INTERRUPTED_PATTERN.to_string()));
    }
}
