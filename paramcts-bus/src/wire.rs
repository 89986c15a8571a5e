use paramcts_tree::{Leaf, NodeId};

/// A message the master sends to one executor rank, tagged implicitly by
/// which link it travels over (spec.md §5: "point-to-point send/recv
/// tagged by rank").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Task {
    /// Run the target once against this rollout's full assignment.
    Run(Leaf),
    /// Atomically replace the executor's prefix-wrapper template.
    Prefix(String),
    /// Self-terminate after acknowledging.
    Stop,
}

/// An executor's reply to a [`Task::Run`]. `value` is `None` on timeout
/// (the target was interrupted), to be converted to `penalty * timeout` by
/// the master before back-propagation.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Outcome {
    pub node: NodeId,
    pub value: Option<f64>,
}
