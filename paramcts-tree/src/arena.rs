/// Index into a [`Arena`]. Cheap, `Copy`, stable for the arena's lifetime
/// (entries are never removed, only appended).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(value: usize) -> Self {
        NodeId(value)
    }
}

/// Append-only store of `T`, indexed by [`NodeId`]. Nodes form a DAG via
/// this arena (convergent re-visits through interning), never a tree with
/// removable branches, so there is no deletion API.
#[derive(Debug, Default)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn allocate(&mut self, value: T) -> NodeId {
        let id = NodeId(self.items.len());
        self.items.push(value);
        id
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.items[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.items[id.0]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.items.iter().enumerate().map(|(i, v)| (NodeId(i), v))
    }
}
