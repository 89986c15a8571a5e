use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

/// A parameter's condition: it is only "free" (assignable) on a node when,
/// for every (dependency name, allowed values) pair, the node has already
/// assigned the dependency to one of the allowed values.
pub type Condition = HashMap<String, HashSet<String>>;

#[derive(Debug)]
struct ParameterData {
    name: String,
    values: Vec<String>,
    condition: Option<Condition>,
}

/// A named, ordered-value parameter. Cheap to clone (an `Arc` handle into
/// the process-wide registry); two handles for the same name always point
/// at the same underlying data, so equality and hashing are by name alone.
#[derive(Debug, Clone)]
pub struct Parameter(Arc<ParameterData>);

impl Parameter {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn values(&self) -> &[String] {
        &self.0.values
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.0.condition.as_ref()
    }

    /// Returns true when `assignments` (name -> value) satisfies every
    /// dependency this parameter's condition names. A parameter with no
    /// condition is always satisfied.
    pub fn satisfied_by(&self, assignments: &HashMap<String, String>) -> bool {
        match &self.0.condition {
            None => true,
            Some(condition) => condition.iter().all(|(dep_name, allowed)| {
                assignments.get(dep_name).map(|v| allowed.contains(v)).unwrap_or(false)
            }),
        }
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}
impl Eq for Parameter {}

impl std::hash::Hash for Parameter {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

/// Process-wide registry of interned parameters, keyed by name. Mirrors
/// `paramMCTS.types.PARAM_DICT`'s `Parameter.__new__` contract: a second
/// `intern()` call with a name already present returns the existing
/// parameter, silently ignoring any new `values`/`condition` passed in.
#[derive(Debug, Default)]
pub struct ParameterStore {
    by_name: HashMap<String, Parameter>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(
        &mut self,
        name: impl Into<String>,
        values: Vec<String>,
        condition: Option<Condition>,
    ) -> Parameter {
        let name = name.into();
        if let Some(existing) = self.by_name.get(&name) {
            return existing.clone();
        }
        let param = Parameter(Arc::new(ParameterData { name: name.clone(), values, condition }));
        self.by_name.insert(name, param.clone());
        param
    }

    pub fn get(&self, name: &str) -> Option<Parameter> {
        self.by_name.get(name).cloned()
    }

    pub fn all(&self) -> Vec<Parameter> {
        self.by_name.values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.by_name.len()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
    }

    /// Atomically swap the whole registry for a checkpoint-restored one.
    pub fn replace(&mut self, snapshot: ParameterStore) {
        *self = snapshot;
    }

    /// Serializable snapshot of every interned parameter, for the
    /// checkpoint codec.
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            parameters: self
                .by_name
                .values()
                .map(|p| (p.name().to_string(), p.values().to_vec(), p.condition().cloned()))
                .collect(),
        }
    }

    /// Rebuilds a registry from a snapshot taken by [`ParameterStore::snapshot`].
    pub fn from_snapshot(snapshot: ParameterSnapshot) -> Self {
        let mut store = Self::new();
        for (name, values, condition) in snapshot.parameters {
            store.intern(name, values, condition);
        }
        store
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ParameterSnapshot {
    pub parameters: Vec<(String, Vec<String>, Option<Condition>)>,
}

static GLOBAL_PARAMETERS: Lazy<Mutex<ParameterStore>> = Lazy::new(|| Mutex::new(ParameterStore::new()));

/// Convenience access to the process-wide singleton. The singleton exists
/// so call sites that don't otherwise thread a `ParameterStore` through can
/// reach it (tests reset it via `clear()`); the checkpoint codec swaps it
/// wholesale via `replace()` rather than mutating it in place.
pub fn global() -> &'static Mutex<ParameterStore> {
    &GLOBAL_PARAMETERS
}

pub fn intern(name: impl Into<String>, values: Vec<String>, condition: Option<Condition>) -> Parameter {
    global().lock().unwrap().intern(name, values, condition)
}

pub fn get(name: &str) -> Option<Parameter> {
    global().lock().unwrap().get(name)
}

pub fn all() -> Vec<Parameter> {
    global().lock().unwrap().all()
}

pub fn count() -> usize {
    global().lock().unwrap().count()
}

pub fn clear() {
    global().lock().unwrap().clear()
}

pub fn replace(snapshot: ParameterStore) {
    global().lock().unwrap().replace(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinterning_ignores_new_values_and_condition() {
        let mut store = ParameterStore::new();
        let a = store.intern("x", vec!["1".into(), "2".into()], None);
        let b = store.intern("x", vec!["3".into()], Some(HashMap::new()));
        assert_eq!(a, b);
        assert_eq!(store.get("x").unwrap().values(), &["1".to_string(), "2".to_string()]);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn satisfied_by_checks_every_dependency() {
        let mut store = ParameterStore::new();
        let mut condition = Condition::new();
        condition.insert("algo".into(), ["heur".into()].into_iter().collect());
        let p = store.intern("tol", vec!["0.1".into()], Some(condition));

        let mut assignments = HashMap::new();
        assert!(!p.satisfied_by(&assignments));
        assignments.insert("algo".into(), "exact".into());
        assert!(!p.satisfied_by(&assignments));
        assignments.insert("algo".into(), "heur".into());
        assert!(p.satisfied_by(&assignments));
    }
}
