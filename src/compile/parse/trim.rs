use crate::compile::parse::tree::NodeId;
use std::collections::HashMap;

bitflags::bitflags! {
    /// Whitespace trimming requested around a node.
    ///
    /// `LEFT` and `RIGHT` apply to the text outside of a node, `INNER_LEFT`
    /// and `INNER_RIGHT` apply to the text at the edges of a node's body.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TrimMode: u8 {
        /// Strip trailing whitespace from the text before the node.
        const LEFT = 1 << 0;
        /// Strip leading whitespace from the text after the node.
        const RIGHT = 1 << 1;
        /// Strip leading whitespace from the first text inside the body.
        const INNER_LEFT = 1 << 2;
        /// Strip trailing whitespace from the last text inside the body.
        const INNER_RIGHT = 1 << 3;
    }
}

impl TrimMode {
    /// Return `flag` when `condition` is true, or an empty [`TrimMode`].
    #[inline]
    pub(crate) fn when(condition: bool, flag: Self) -> Self {
        if condition {
            flag
        } else {
            Self::empty()
        }
    }
}

/// Side table mapping nodes to the [`TrimMode`] recorded for them.
///
/// Nodes without an entry have no trimming.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrimTable {
    modes: HashMap<NodeId, TrimMode>,
}

impl TrimTable {
    /// Create an empty [`TrimTable`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the [`TrimMode`] of the given node.
    pub fn mode_of(&self, id: NodeId) -> TrimMode {
        self.modes.get(&id).copied().unwrap_or_default()
    }

    /// Add the given flags to the node, keeping any flags already recorded.
    pub fn insert(&mut self, id: NodeId, mode: TrimMode) {
        if mode.is_empty() {
            return;
        }

        *self.modes.entry(id).or_default() |= mode;
    }

    /// Return the amount of nodes with a recorded [`TrimMode`].
    #[inline]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Return true if no node has a recorded [`TrimMode`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{TrimMode, TrimTable};
    use crate::compile::parse::tree::NodeId;

    #[test]
    fn test_mode_of_absent() {
        let table = TrimTable::new();
        assert_eq!(table.mode_of(NodeId::new(3)), TrimMode::empty());
    }

    #[test]
    fn test_insert_merges() {
        let mut table = TrimTable::new();
        table.insert(NodeId::new(1), TrimMode::LEFT);
        table.insert(NodeId::new(1), TrimMode::INNER_RIGHT);
        table.insert(NodeId::new(2), TrimMode::empty());

        assert_eq!(
            table.mode_of(NodeId::new(1)),
            TrimMode::LEFT | TrimMode::INNER_RIGHT
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_when() {
        assert_eq!(TrimMode::when(true, TrimMode::RIGHT), TrimMode::RIGHT);
        assert!(TrimMode::when(false, TrimMode::RIGHT).is_empty());
    }
}
