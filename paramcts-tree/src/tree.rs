use std::collections::HashMap;

use paramcts_types::{Assignment, ParameterStore};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::arena::{Arena, NodeId};
use crate::error::TreeError;
use crate::node::{assignment_set, AssignmentSet, Leaf, NodeRecord};
use crate::uct;

/// Owns the node arena and the canonicalizing map from assignment-set to
/// node id (the `NODE_DICT` of the original). Read and written only by the
/// master; worker shims and executors never touch it (spec.md §5).
#[derive(Debug)]
pub struct Tree {
    arena: Arena<NodeRecord>,
    canonical: HashMap<AssignmentSet, NodeId>,
    root: NodeId,
}

/// Serializable snapshot of every interned node, in allocation order. The
/// canonicalizing map and root id are reconstructed from the assignment
/// sets on [`Tree::restore`], so neither is part of the snapshot itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TreeSnapshot {
    pub nodes: Vec<NodeRecord>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.allocate(NodeRecord::root());
        let mut canonical = HashMap::new();
        canonical.insert(AssignmentSet::new(), root);
        Self { arena, canonical, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Snapshots the arena for checkpointing.
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot { nodes: self.arena.iter().map(|(_, node)| node.clone()).collect() }
    }

    /// Rebuilds a tree from a snapshot taken by [`Tree::snapshot`].
    pub fn restore(snapshot: TreeSnapshot) -> Self {
        let mut arena = Arena::new();
        let mut canonical = HashMap::new();
        for node in snapshot.nodes {
            let key = assignment_set(&node.assignments);
            let id = arena.allocate(node);
            canonical.insert(key, id);
        }
        let root = *canonical
            .get(&AssignmentSet::new())
            .expect("a valid checkpoint always contains the root node");
        Self { arena, canonical, root }
    }

    pub fn node(&self, id: NodeId) -> &NodeRecord {
        self.arena.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.arena.iter()
    }

    /// Interns `assignments`, returning the existing node if this exact set
    /// was already seen, or allocating a new one otherwise.
    fn intern(&mut self, assignments: Vec<Assignment>) -> NodeId {
        let key = assignment_set(&assignments);
        if let Some(&id) = self.canonical.get(&key) {
            return id;
        }
        let id = self.arena.allocate(NodeRecord {
            assignments,
            children: None,
            value: 0.0,
            visits: 0,
        });
        self.canonical.insert(key, id);
        id
    }

    /// Parameters not yet assigned on `id` whose condition (if any) is
    /// satisfied by `id`'s current assignments.
    pub fn free_parameters(&self, id: NodeId, store: &ParameterStore) -> Vec<paramcts_types::Parameter> {
        free_parameters_for(self.arena.get(id).assignments.as_slice(), store)
    }

    /// Expand `id` exactly once: for every (free parameter, value) pair,
    /// intern the extended node as a child. If there are no free
    /// parameters, the node is left unexpanded (`children` stays `None`)
    /// and is itself returned as the expansion target — there is nothing
    /// further to branch on, so it behaves as a permanent leaf for rollout
    /// purposes.
    pub fn expand(&mut self, id: NodeId, store: &ParameterStore, rng: &mut impl Rng) -> Result<NodeId, TreeError> {
        if self.arena.get(id).is_expanded() {
            return Err(TreeError::AlreadyExpanded(id));
        }
        let free = self.free_parameters(id, store);
        if free.is_empty() {
            return Ok(id);
        }

        let mut children = Vec::new();
        for param in &free {
            for value in param.values() {
                let extended = self.arena.get(id).extended(Assignment::new(param.name(), value.clone()));
                children.push(self.intern(extended));
            }
        }
        self.arena.get_mut(id).children = Some(children.clone());
        Ok(*children.choose(rng).expect("free parameters imply at least one child"))
    }

    /// Argmax-UCT descent to an unexpanded node, followed by expansion and
    /// random rollout to a full assignment.
    pub fn select_leaf(&mut self, store: &ParameterStore, rng: &mut impl Rng) -> Result<Leaf, TreeError> {
        let mut current = self.root;
        while self.arena.get(current).is_expanded() {
            current = self.select_child(current, rng)?;
        }
        let expanded = self.expand(current, store, rng)?;
        let assignment = self.rollout(expanded, store, rng);
        Ok(Leaf { node: expanded, assignment })
    }

    fn select_child(&self, id: NodeId, rng: &mut impl Rng) -> Result<NodeId, TreeError> {
        let children = self.arena.get(id).children.as_ref().expect("caller checked is_expanded");
        if children.is_empty() {
            return Err(TreeError::NoChildren(id));
        }
        let parent = self.arena.get(id);
        children
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let ua = uct::uct(parent, self.arena.get(a), rng);
                let ub = uct::uct(parent, self.arena.get(b), rng);
                ua.partial_cmp(&ub).unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or(TreeError::NoChildren(id))
    }

    /// Repeatedly sample a free parameter + value, without interning
    /// intermediate nodes, until no free parameter remains.
    fn rollout(&self, start: NodeId, store: &ParameterStore, rng: &mut impl Rng) -> Vec<Assignment> {
        let mut assignments = self.arena.get(start).assignments.clone();
        loop {
            let free = free_parameters_for(&assignments, store);
            if free.is_empty() {
                break;
            }
            let param = free.choose(rng).expect("non-empty");
            let value = param.values().choose(rng).expect("parameters always have values");
            assignments.push(Assignment::new(param.name(), value.clone()));
        }
        assignments
    }

    /// Deliberately AMAF-broadened back-propagation: every interned node
    /// whose assignment set is a subset of the leaf's full assignment set
    /// is updated, not merely the nodes on the canonical selection path.
    pub fn backpropagate(&mut self, leaf: &[Assignment], reward: f64) {
        let leaf_set = assignment_set(leaf);
        let mut updated = 0usize;
        for (key, &id) in self.canonical.iter() {
            if key.is_subset(&leaf_set) {
                let node = self.arena.get_mut(id);
                node.visits += 1;
                node.value += reward;
                updated += 1;
            }
        }
        tracing::debug!(updated, reward, "backpropagated result");
    }

    /// Descend from the root via the deterministic UCT variant until an
    /// unexpanded node, returning a space-joined `name=value` string.
    pub fn best_assignment(&self) -> String {
        let mut current = self.root;
        while let Some(children) = self.arena.get(current).children.as_ref() {
            if children.is_empty() {
                break;
            }
            let parent = self.arena.get(current);
            current = children
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    let ua = uct::uct_deterministic(parent, self.arena.get(a));
                    let ub = uct::uct_deterministic(parent, self.arena.get(b));
                    ua.partial_cmp(&ub).unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("non-empty children checked above");
        }
        self.arena
            .get(current)
            .assignments
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn free_parameters_for(assignments: &[Assignment], store: &ParameterStore) -> Vec<paramcts_types::Parameter> {
    let assigned: std::collections::HashSet<&str> = assignments.iter().map(|a| a.name.as_str()).collect();
    let as_map: HashMap<String, String> = assignments.iter().map(|a| (a.name.clone(), a.value.clone())).collect();
    store
        .all()
        .into_iter()
        .filter(|p| !assigned.contains(p.name()) && p.satisfied_by(&as_map))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_two_params() -> ParameterStore {
        let mut store = ParameterStore::new();
        store.intern("a", vec!["1".into(), "2".into()], None);
        store.intern("b", vec!["x".into(), "y".into()], None);
        store
    }

    #[test]
    fn expansion_is_monotone_and_single_shot() {
        let store = store_with_two_params();
        let mut tree = Tree::new();
        let mut rng = rand::thread_rng();
        let root = tree.root();
        assert!(!tree.node(root).is_expanded());
        let child = tree.expand(root, &store, &mut rng).unwrap();
        assert!(tree.node(root).is_expanded());
        assert!(tree.node(root).children.as_ref().unwrap().contains(&child));
        // root's children all extend root's assignments by exactly one.
        for &c in tree.node(root).children.as_ref().unwrap() {
            assert_eq!(tree.node(c).assignments.len(), root_assignments_len(&tree, root) + 1);
        }
        assert!(matches!(tree.expand(root, &store, &mut rng), Err(TreeError::AlreadyExpanded(_))));
    }

    fn root_assignments_len(tree: &Tree, root: NodeId) -> usize {
        tree.node(root).assignments.len()
    }

    #[test]
    fn interning_converges_equal_assignment_sets() {
        let store = store_with_two_params();
        let mut tree = Tree::new();
        let mut rng = rand::thread_rng();
        let root = tree.root();
        tree.expand(root, &store, &mut rng).unwrap();
        let a1 = Assignment::new("a", "1");
        let id1 = tree.intern(vec![a1.clone()]);
        let id2 = tree.intern(vec![a1]);
        assert_eq!(id1, id2);
    }

    #[test]
    fn backpropagation_updates_every_subset_node() {
        let store = store_with_two_params();
        let mut tree = Tree::new();
        let full = vec![Assignment::new("a", "1"), Assignment::new("b", "x")];
        let root = tree.root();
        let sub = tree.intern(vec![full[0].clone()]);
        let other = tree.intern(vec![Assignment::new("a", "2")]);
        tree.backpropagate(&full, 10.0);
        assert_eq!(tree.node(root).visits, 1);
        assert_eq!(tree.node(sub).visits, 1);
        assert_eq!(tree.node(other).visits, 0);
    }

    #[test]
    fn select_leaf_produces_full_assignment() {
        let store = store_with_two_params();
        let mut tree = Tree::new();
        let mut rng = rand::thread_rng();
        let leaf = tree.select_leaf(&store, &mut rng).unwrap();
        let names: std::collections::HashSet<_> = leaf.assignment.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a", "b"].into_iter().collect());
    }

    proptest::proptest! {
        /// Interning is order-independent: any permutation of the same
        /// assignment set converges on the same node id, mirroring the
        /// original's `frozenset` key.
        #[test]
        fn interning_ignores_assignment_order(shuffle_seed in 0u64..1000) {
            use rand::SeedableRng;
            let names = ["a", "b"];
            let values = ["1", "2"];
            let assignments: Vec<Assignment> = names
                .iter()
                .zip(values.iter())
                .map(|(n, v)| Assignment::new(*n, *v))
                .collect();

            let mut tree = Tree::new();
            let forward = tree.intern(assignments.clone());
            let mut shuffled = assignments;
            let mut rng = rand::rngs::StdRng::seed_from_u64(shuffle_seed);
            shuffled.shuffle(&mut rng);
            let reversed = tree.intern(shuffled);
            proptest::prop_assert_eq!(forward, reversed);
        }

        /// Backpropagation is additive: running it `n` times with the same
        /// reward accumulates `n * reward` on every touched node, and never
        /// touches a node whose assignment set is not a subset of the leaf's.
        #[test]
        fn backpropagation_is_additive(reward in -10.0f64..10.0, repeats in 1u32..5) {
            let mut tree = Tree::new();
            let full = vec![Assignment::new("a", "1"), Assignment::new("b", "x")];
            let root = tree.root();
            let sub = tree.intern(vec![full[0].clone()]);
            let disjoint = tree.intern(vec![Assignment::new("a", "2")]);

            for _ in 0..repeats {
                tree.backpropagate(&full, reward);
            }

            proptest::prop_assert_eq!(tree.node(root).visits, repeats as u64);
            proptest::prop_assert_eq!(tree.node(sub).visits, repeats as u64);
            proptest::prop_assert_eq!(tree.node(disjoint).visits, 0);
            let expected = reward * repeats as f64;
            proptest::prop_assert!((tree.node(root).value - expected).abs() < 1e-9);
        }
    }
}
