use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ArgumentError, CallstringError, VariableError};

// Ported from `configuration.py`'s ARGUMENT_PATTERN / VARIABLE_PATTERN. The
// original relies on a `(?(name)...)` conditional group (only require a
// closing `]` when the matching opening `[` was present) that `regex` has
// no equivalent for; the trailing `]` is made unconditionally optional
// instead; since it is also a member of the variable-run character class it
// still gets consumed correctly either way.
static ARGUMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\[)?(-[-\w]+[ =])?(\$[-$,\[\]\w]+)\]?").unwrap());
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\[)?,?\$([-\w]+)\$(\])?").unwrap());

#[derive(Debug, Clone)]
struct TemplateVariable {
    optional: bool,
    name: String,
}

#[derive(Debug, Clone)]
struct TemplateArgument {
    optional: bool,
    flag: String,
    variables: Vec<TemplateVariable>,
}

/// Parses and resolves the `$var$ --flag=$a$,$b$[,$c$] [--opt=$d$]`
/// surface syntax (spec.md §4.A / S1). Immutable and pure once
/// constructed: `assign` never mutates and never touches the filesystem.
#[derive(Debug, Clone)]
pub struct Callstring {
    arguments: Vec<TemplateArgument>,
    constants: HashMap<String, String>,
}

impl Callstring {
    pub fn parse(template: &str, constants: HashMap<String, String>) -> Self {
        let arguments = ARGUMENT_PATTERN
            .captures_iter(template)
            .map(|caps| {
                let optional = caps.get(1).is_some();
                let flag = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
                let var_run = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
                let variables = VARIABLE_PATTERN
                    .captures_iter(var_run)
                    .map(|v| TemplateVariable { optional: v.get(1).is_some(), name: v[2].to_string() })
                    .collect();
                TemplateArgument { optional, flag, variables }
            })
            .collect();
        Self { arguments, constants }
    }

    /// Resolves the template against `assignment`, joining surviving
    /// arguments with spaces. Required arguments/variables missing from
    /// both `constants` and `assignment` raise the matching error;
    /// optional ones are silently dropped.
    pub fn assign(&self, assignment: &HashMap<String, String>) -> Result<String, CallstringError> {
        let mut parts = Vec::new();
        for arg in &self.arguments {
            if let Some(formatted) = self.format_argument(arg, assignment)? {
                parts.push(formatted);
            }
        }
        Ok(parts.join(" "))
    }

    fn format_argument(
        &self,
        arg: &TemplateArgument,
        assignment: &HashMap<String, String>,
    ) -> Result<Option<String>, CallstringError> {
        let mut resolved = Vec::new();
        for var in &arg.variables {
            match self.format_variable(var, assignment) {
                Ok(value) => {
                    if !value.is_empty() {
                        resolved.push(value);
                    }
                }
                Err(err) => {
                    if arg.optional {
                        return Ok(None);
                    }
                    return Err(err.into());
                }
            }
        }

        if resolved.is_empty() {
            return if arg.optional {
                Ok(None)
            } else {
                Err(ArgumentError::Unresolvable(arg.flag.clone()).into())
            };
        }
        Ok(Some(format!("{}{}", arg.flag, resolved.join(","))))
    }

    fn format_variable(
        &self,
        var: &TemplateVariable,
        assignment: &HashMap<String, String>,
    ) -> Result<String, VariableError> {
        if let Some(value) = self.constants.get(&var.name) {
            return Ok(value.clone());
        }
        if let Some(value) = assignment.get(&var.name) {
            return Ok(value.clone());
        }
        if var.optional {
            return Ok(String::new());
        }
        Err(VariableError::Missing(var.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    // S1: exact walkthrough from spec.md §8.
    #[test]
    fn s1_callstring_walkthrough() {
        let template = "$ins$ --number $num$ --test=$a$,$b$[,$c$] [--opt=$d$]";
        let cs = Callstring::parse(template, HashMap::new());

        let assign = assignment(&[("ins", "inst.cnf"), ("num", "3"), ("a", "1"), ("b", "2")]);
        assert_eq!(cs.assign(&assign).unwrap(), "inst.cnf --number 3 --test=1,2");

        let with_c = assignment(&[("ins", "inst.cnf"), ("num", "3"), ("a", "1"), ("b", "2"), ("c", "9")]);
        assert_eq!(cs.assign(&with_c).unwrap(), "inst.cnf --number 3 --test=1,2,9");

        let with_opt = assignment(&[("ins", "inst.cnf"), ("num", "3"), ("a", "1"), ("b", "2"), ("d", "5")]);
        assert_eq!(cs.assign(&with_opt).unwrap(), "inst.cnf --number 3 --test=1,2 --opt=5");
    }

    #[test]
    fn required_variable_missing_is_an_error() {
        let cs = Callstring::parse("--number $num$", HashMap::new());
        let err = cs.assign(&HashMap::new()).unwrap_err();
        assert!(matches!(err, CallstringError::Variable(_)));
    }

    #[test]
    fn constants_take_priority_over_assignment() {
        let mut constants = HashMap::new();
        constants.insert("seed".to_string(), "42".to_string());
        let cs = Callstring::parse("--seed $seed$", constants);
        let assign = assignment(&[("seed", "7")]);
        assert_eq!(cs.assign(&assign).unwrap(), "--seed 42");
    }

    #[test]
    fn optional_argument_dropped_when_variable_missing() {
        let cs = Callstring::parse("$ins$ [--opt=$d$]", HashMap::new());
        let assign = assignment(&[("ins", "inst.cnf")]);
        assert_eq!(cs.assign(&assign).unwrap(), "inst.cnf");
    }
}
