use std::collections::BTreeSet;

use paramcts_types::Assignment;

use crate::arena::NodeId;

/// Canonical identity of a node: the *set* of its assignments. A `BTreeSet`
/// gives deterministic ordering and cheap subset checks while behaving
/// exactly like the original's `frozenset(assignments)` key.
pub type AssignmentSet = BTreeSet<Assignment>;

pub fn assignment_set(assignments: &[Assignment]) -> AssignmentSet {
    assignments.iter().cloned().collect()
}

/// A node in the search tree: an ordered, duplicate-free sequence of
/// assignments, plus MCTS bookkeeping. `children` is `None` until the node
/// has been expanded exactly once.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeRecord {
    pub assignments: Vec<Assignment>,
    pub children: Option<Vec<NodeId>>,
    pub value: f64,
    pub visits: u64,
}

impl NodeRecord {
    pub fn root() -> Self {
        Self { assignments: Vec::new(), children: None, value: 0.0, visits: 0 }
    }

    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    pub fn assigned_names(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|a| a.name.as_str())
    }

    pub fn as_map(&self) -> std::collections::HashMap<String, String> {
        self.assignments.iter().map(|a| (a.name.clone(), a.value.clone())).collect()
    }

    pub fn extended(&self, assignment: Assignment) -> Vec<Assignment> {
        let mut next = self.assignments.clone();
        next.push(assignment);
        next
    }
}

/// A full parameter assignment produced by rollout, anchored at the
/// canonical (interned) node that rollout started from. Never interned
/// itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Leaf {
    pub node: NodeId,
    pub assignment: Vec<Assignment>,
}

impl Leaf {
    pub fn assignment_map(&self) -> std::collections::HashMap<String, String> {
        self.assignment.iter().map(|a| (a.name.clone(), a.value.clone())).collect()
    }
}
