use generational_arena::Index;
use thiserror::Error;

/// Errors reported by [`Tree`](crate::Tree) when a node handle is misused or when
/// [`Tree::validate`](crate::Tree::validate) finds a broken invariant.
///
/// A value that is simply missing from the tree is not an error, lookups report
/// that through `Option` or `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TreeError {
    /// The handle refers to a node that was removed or never belonged to this tree.
    #[error("node {0:?} is not in the tree")]
    StaleNode(Index),
    /// The tree already has a root.
    #[error("tree already has root {0:?}")]
    HasRoot(Index),
    /// The node already hangs off a parent, or is the top of the tree.
    #[error("node {0:?} is already attached")]
    AlreadyAttached(Index),
    /// Attaching `child` under `parent` would make a node its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle { parent: Index, child: Index },
    /// The node is still linked into a tree.
    #[error("node {0:?} is not detached")]
    NotDetached(Index),
    /// A rotation needs a child on the side it pivots around.
    #[error("node {0:?} has no child to pivot around")]
    MissingPivot(Index),
    /// `child` is linked below `node` but points back at a different parent.
    #[error("node {child:?} is a child of {node:?} but its parent link disagrees")]
    ParentMismatch { node: Index, child: Index },
    /// The cached top of the tree has a parent.
    #[error("top node {0:?} has a parent")]
    RootHasParent(Index),
    /// The node's value is out of order with respect to one of its ancestors.
    #[error("node {0:?} breaks the search order")]
    OrderViolation(Index),
    /// The subtree heights below the node differ by more than one.
    #[error("node {node:?} has balance factor {balance_factor}")]
    Unbalanced { node: Index, balance_factor: isize },
}
