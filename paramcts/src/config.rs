//! Assembles the in-memory configuration from a HAL-JSON scenario file:
//! parameter interning, the callstring/program caller, the instance
//! selector, and the `{timeout}`/`{memory}`-substituted prefix command
//! (spec.md §6, `original_source/src/paramMCTS.py::main`'s config
//! assembly).

use std::path::{Path, PathBuf};

use anyhow::Context;
use paramcts_config::{load_hal_json, Callstring, InstanceSelector, LoadedScenario};
use paramcts_exec::ProgramCaller;
use paramcts_tree::Tree;
use paramcts_types::ParameterStore;

/// State shared by both roles once a scenario has been loaded: the
/// instance variable name and per-run timeout appear in both the
/// checkpoint payload and the executor's call contract.
pub struct Scenario {
    pub loaded: LoadedScenario,
    pub prefix_cmd: String,
}

/// Substitutes `{timeout}`/`{memory}` into the `-p/--prefix` template, the
/// way `options.prefix.format(timeout=..., memory=...)` does in the
/// original.
pub fn render_prefix(template: &str, timeout: u64, memory: u64) -> String {
    template.replace("{timeout}", &timeout.to_string()).replace("{memory}", &memory.to_string())
}

pub fn load_scenario(json_path: &Path, timeout: u64, memory: u64, prefix_template: &str) -> anyhow::Result<Scenario> {
    let loaded = load_hal_json(json_path)
        .with_context(|| format!("failed to load scenario JSON from {}", json_path.display()))?;
    Ok(Scenario { loaded, prefix_cmd: render_prefix(prefix_template, timeout, memory) })
}

impl Scenario {
    /// The `ProgramCaller`-rebuilding fields to persist in a checkpoint, so
    /// a resumed executor rank doesn't need the original HAL-JSON file.
    pub fn caller_fields(&self, timeout_seconds: f64) -> paramcts_checkpoint::CallerFields {
        paramcts_checkpoint::CallerFields {
            instance_variable: self.loaded.instance_variable.clone(),
            timeout_seconds,
            executable: self.loaded.executable.clone(),
            callstring_template: self.loaded.callstring_template.clone(),
            callstring_constants: self.loaded.callstring_constants.clone(),
            prefix_cmd: self.prefix_cmd.clone(),
            stdout_patterns: self.loaded.stdout_patterns.clone(),
            stderr_patterns: self.loaded.stderr_patterns.clone(),
        }
    }
}

/// Interns every parameter from the scenario into the process-wide
/// registry and builds a fresh search tree. Only the master role needs
/// this: executors never touch the parameter registry or the tree
/// (spec.md §5).
pub fn build_master_state(scenario: &Scenario, instance_paths: &[PathBuf]) -> anyhow::Result<(Tree, InstanceSelector)> {
    let mut store = ParameterStore::new();
    for (name, values, condition) in &scenario.loaded.parameters {
        store.intern(name.clone(), values.clone(), condition.clone());
    }
    paramcts_types::replace(store);

    let selector = InstanceSelector::new(instance_paths, scenario.loaded.instance_variable.clone(), true)
        .context("failed to enumerate instance files")?;
    Ok((Tree::new(), selector))
}

/// Builds the `ProgramCaller` an executor owns: only the role that ever
/// spawns the target needs this (spec.md §4.G, §5).
pub fn build_program_caller(scenario: &Scenario) -> anyhow::Result<ProgramCaller> {
    build_caller(
        &scenario.loaded.executable,
        &scenario.loaded.callstring_template,
        scenario.loaded.callstring_constants.clone(),
        &scenario.prefix_cmd,
        &scenario.loaded.stdout_patterns,
        &scenario.loaded.stderr_patterns,
    )
}

/// As [`build_program_caller`], but from a resumed checkpoint's
/// [`paramcts_checkpoint::CallerFields`] instead of a freshly-loaded
/// HAL-JSON scenario — the `--load` path for an executor rank.
pub fn build_program_caller_from_checkpoint(fields: &paramcts_checkpoint::CallerFields) -> anyhow::Result<ProgramCaller> {
    build_caller(
        &fields.executable,
        &fields.callstring_template,
        fields.callstring_constants.clone(),
        &fields.prefix_cmd,
        &fields.stdout_patterns,
        &fields.stderr_patterns,
    )
}

fn build_caller(
    executable: &str,
    callstring_template: &str,
    callstring_constants: std::collections::HashMap<String, String>,
    prefix_cmd: &str,
    stdout_patterns: &[String],
    stderr_patterns: &[String],
) -> anyhow::Result<ProgramCaller> {
    let callstring = Callstring::parse(callstring_template, callstring_constants);
    ProgramCaller::new(PathBuf::from(executable), callstring, Some(prefix_cmd.to_string()), stdout_patterns, stderr_patterns)
        .context("target executable failed validation")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_prefix_substitutes_both_placeholders() {
        let rendered = render_prefix("bin/runsolver -W {timeout} -M {memory}", 600, 2000);
        assert_eq!(rendered, "bin/runsolver -W 600 -M 2000");
    }
}
