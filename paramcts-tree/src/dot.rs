use std::fmt::Write as _;

use crate::tree::Tree;
use crate::uct;

/// Renders the tree as a Graphviz `digraph`, one node per interned
/// assignment set, labeled with its assignment tuple, accumulated value,
/// visit count and UCT score relative to its parent; edges run
/// parent -> child for every child that has been visited at least once.
pub fn to_dot(tree: &Tree) -> String {
    let mut out = String::new();
    writeln!(out, "digraph \"paramMCTS\" {{").unwrap();
    writeln!(out, "    node [shape=box];").unwrap();

    for (id, node) in tree.iter() {
        let label = if node.assignments.is_empty() {
            "root".to_string()
        } else {
            node.assignments.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
        };
        writeln!(
            out,
            "    n{} [label=\"{} | value={:.3} visits={}\"];",
            id.index(),
            label,
            node.value,
            node.visits
        )
        .unwrap();
    }

    for (id, node) in tree.iter() {
        let Some(children) = &node.children else { continue };
        for &child in children {
            let child_node = tree.node(child);
            if child_node.visits == 0 {
                continue;
            }
            let score = uct::uct_deterministic(node, child_node);
            writeln!(
                out,
                "    n{} -> n{} [label=\"uct={:.3}\"];",
                id.index(),
                child.index(),
                score
            )
            .unwrap();
        }
    }

    writeln!(out, "}}").unwrap();
    out
}
