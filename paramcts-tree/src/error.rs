#[derive(Debug)]
pub enum TreeError {
    /// `expand()` called on a node whose children are already defined.
    AlreadyExpanded(crate::arena::NodeId),
    /// Selection reached a node whose children are defined but empty.
    NoChildren(crate::arena::NodeId),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::AlreadyExpanded(id) => write!(f, "node {} already expanded", id.index()),
            TreeError::NoChildren(id) => write!(f, "node {} has no children to select from", id.index()),
        }
    }
}

impl std::error::Error for TreeError {}
