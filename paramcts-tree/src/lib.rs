//! The MCTS engine: node arena, UCT selection, expansion, random-rollout
//! completion and AMAF-broadened back-propagation.

mod arena;
mod dot;
mod error;
mod node;
mod tree;
mod uct;

pub use arena::{Arena, NodeId};
pub use dot::to_dot;
pub use error::TreeError;
pub use node::{assignment_set, AssignmentSet, Leaf, NodeRecord};
pub use tree::{Tree, TreeSnapshot};
pub use uct::{epsilon, exploration_constant, uct, uct_deterministic};
