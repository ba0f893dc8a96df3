use generational_arena::Arena;
use log::{debug, trace};
use std::cmp::Ordering;

mod error;

pub use error::TreeError;
pub use generational_arena::Index;

#[derive(PartialEq, Copy, Clone, Debug)]
enum NodeType {
    LeftChild(Index),
    RightChild(Index),
    Orphan,
}

#[derive(Debug)]
struct Node<T> {
    parent: Option<Index>,
    left: Option<Index>,
    right: Option<Index>,

    value: T,
}

impl<T> Node<T> {
    fn new(value: T, parent: Option<Index>) -> Self {
        Node {
            parent,
            left: None,
            right: None,
            value,
        }
    }
}

/// A height balanced (AVL) binary search tree.
///
/// Nodes are stored in a generational arena and addressed by [`Index`] handles, a handle
/// to a removed node never aliases a later one. Values equal to a node's value are placed
/// in its right subtree. Every mutation rebalances bottom-up so that the heights of the two
/// subtrees of any node differ by at most one.
pub struct Tree<T: Ord> {
    nodes: Arena<Node<T>>,
    root: Option<Index>,
}

impl<T: Ord> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> Tree<T> {
    /// Create a new empty tree
    pub fn new() -> Self {
        Tree {
            nodes: Arena::new(),
            root: None,
        }
    }

    /// Create a new empty tree with room for `capacity` nodes before the arena reallocates
    pub fn with_capacity(capacity: usize) -> Self {
        Tree {
            nodes: Arena::with_capacity(capacity),
            root: None,
        }
    }

    /// Number of nodes owned by the tree, detached nodes included. A subtree unlinked with
    /// [`Tree::set_left`] or [`Tree::set_right`] keeps counting until it is freed with
    /// [`Tree::drop_subtree`].
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Utility functon to check if the tree has a root node or not
    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    /// Returns the top of the tree, the one attached node without a parent.
    pub fn root(&self) -> Option<Index> {
        self.root
    }

    /// Removes every node. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Creates a new root node for the tree and returns the index of the created node.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to populate the new node with
    ///
    /// Fails with [`TreeError::HasRoot`] if the tree already has a root.
    pub fn create_root(&mut self, value: T) -> Result<Index, TreeError> {
        if let Some(root) = self.root {
            return Err(TreeError::HasRoot(root));
        }
        Ok(self.new_root(value))
    }

    fn new_root(&mut self, value: T) -> Index {
        let root = self.nodes.insert(Node::new(value, None));
        self.root = Some(root);
        root
    }

    /// Creates a parentless node that is not part of the tree yet. Attach it with
    /// [`Tree::set_left`] or [`Tree::set_right`].
    pub fn create_node(&mut self, value: T) -> Index {
        self.nodes.insert(Node::new(value, None))
    }

    /// Returns a reference to the value of the specified node, `None` for a stale handle
    pub fn value(&self, node: Index) -> Option<&T> {
        self.nodes.get(node).map(|node| &node.value)
    }

    pub fn left(&self, node: Index) -> Option<Index> {
        self.nodes.get(node).and_then(|node| node.left)
    }

    pub fn right(&self, node: Index) -> Option<Index> {
        self.nodes.get(node).and_then(|node| node.right)
    }

    pub fn parent(&self, node: Index) -> Option<Index> {
        self.nodes.get(node).and_then(|node| node.parent)
    }

    /// Walks parent links upward from `node` and returns the node at the top.
    ///
    /// # Panics
    ///
    /// Panics if `node` is a stale handle.
    pub fn head(&self, node: Index) -> Index {
        let mut current = node;
        while let Some(parent) = self.nodes[current].parent {
            current = parent;
        }
        current
    }

    /// Height of the subtree rooted at `node`: 0 for no node, 1 for a leaf.
    ///
    /// Heights are not cached, this walks the whole subtree.
    pub fn height(&self, node: Option<Index>) -> usize {
        match node {
            None => 0,
            Some(node) => {
                let node = &self.nodes[node];
                1 + self.height(node.left).max(self.height(node.right))
            }
        }
    }

    /// Height of the right subtree minus height of the left subtree. Positive means the
    /// node leans right.
    pub fn balance_factor(&self, node: Option<Index>) -> isize {
        match node {
            None => 0,
            Some(node) => {
                let node = &self.nodes[node];
                self.height(node.right) as isize - self.height(node.left) as isize
            }
        }
    }

    /// Compares the value held by `node` against `value`.
    pub fn compare_to(&self, node: Index, value: &T) -> Ordering {
        self.nodes[node].value.cmp(value)
    }

    /// Returns the first node holding `value` on the path down from the top of the tree.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to search for
    ///
    pub fn find(&self, value: &T) -> Option<Index> {
        let mut current = self.root;
        while let Some(node) = current {
            let node_ref = &self.nodes[node];
            current = match node_ref.value.cmp(value) {
                Ordering::Greater => node_ref.left,
                Ordering::Less => node_ref.right,
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    pub fn contains(&self, value: &T) -> bool {
        self.find(value).is_some()
    }

    /// Inserts `value` as a new leaf and rebalances every ancestor of that leaf.
    /// Returns the index of the newly created node.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to populate the newly created node with
    ///
    pub fn insert(&mut self, value: T) -> Index {
        let mut parent = match self.root {
            Some(root) => root,
            None => {
                let root = self.new_root(value);
                debug!("inserted {:?} as the root", root);
                return root;
            }
        };

        // Equal values go right
        loop {
            let node = &self.nodes[parent];
            let next = if value < node.value {
                node.left
            } else {
                node.right
            };
            match next {
                Some(next) => parent = next,
                None => break,
            }
        }

        let goes_left = value < self.nodes[parent].value;
        let new_node = self.nodes.insert(Node::new(value, Some(parent)));
        if goes_left {
            self.nodes[parent].left = Some(new_node);
        } else {
            self.nodes[parent].right = Some(new_node);
        }

        self.balance_upward(parent);
        debug!(
            "inserted {:?} under {:?}, tree holds {} nodes",
            new_node,
            parent,
            self.len()
        );
        new_node
    }

    /// Removes one node holding `value`. Returns false, leaving the tree untouched, when
    /// no node holds it.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.find(value) {
            Some(node) => self.remove_node(node).is_some(),
            None => {
                debug!("nothing to remove");
                false
            }
        }
    }

    /// Delete the specified node from the tree and rebalance every ancestor of the point
    /// where the structure changed. Returns the value the node held, or `None` if the
    /// handle is stale.
    ///
    /// # Arguments
    ///
    /// * `node` - The index of the node to delete from the tree
    ///
    pub fn remove_node(&mut self, node: Index) -> Option<T> {
        let (parent, left, right) = {
            let node = self.nodes.get(node)?;
            (node.parent, node.left, node.right)
        };

        let rebalance_start = match right {
            None => {
                // The left subtree, if any, moves up into the node's slot
                self.replace_in_parent(node, left);
                parent.or(left)
            }
            Some(right) if self.nodes[right].left.is_none() => {
                // The right child is the in-order successor, it adopts the left subtree
                self.link_left(right, left);
                self.replace_in_parent(node, Some(right));
                Some(right)
            }
            Some(right) => {
                // The in-order successor sits deeper, lift it out and put it in the node's place
                let mut successor = right;
                while let Some(next) = self.nodes[successor].left {
                    successor = next;
                }
                let successor_parent = self.nodes[successor].parent;
                let successor_right = self.nodes[successor].right;
                self.replace_in_parent(successor, successor_right);
                self.link_left(successor, left);
                self.link_right(successor, Some(right));
                self.replace_in_parent(node, Some(successor));
                successor_parent
            }
        };

        let removed = self.nodes.remove(node).map(|removed| removed.value);
        if let Some(start) = rebalance_start {
            self.balance_upward(start);
        }
        debug!("removed {:?}, tree holds {} nodes", node, self.len());
        removed
    }

    /// Frees a detached subtree and returns how many nodes it held.
    ///
    /// # Arguments
    ///
    /// * `node` - The top of the subtree, it must have no parent and must not be the root
    ///
    pub fn drop_subtree(&mut self, node: Index) -> Result<usize, TreeError> {
        let top = self.nodes.get(node).ok_or(TreeError::StaleNode(node))?;
        if top.parent.is_some() || self.root == Some(node) {
            return Err(TreeError::NotDetached(node));
        }

        let mut freed = 0;
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if let Some(removed) = self.nodes.remove(next) {
                stack.extend(removed.left);
                stack.extend(removed.right);
                freed += 1;
            }
        }
        debug!("dropped subtree {:?} of {} nodes", node, freed);
        Ok(freed)
    }

    /// Sets the left child of `node`, fixing up the parent link of the new child. The former
    /// child, if any, is detached with its parent link cleared and returned.
    ///
    /// # Arguments
    ///
    /// * `node` - The node whose left slot is assigned
    /// * `child` - A parentless node that is not the root, or `None` to empty the slot
    ///
    pub fn set_left(
        &mut self,
        node: Index,
        child: Option<Index>,
    ) -> Result<Option<Index>, TreeError> {
        let former = self.nodes.get(node).ok_or(TreeError::StaleNode(node))?.left;
        if former == child {
            return Ok(former);
        }
        self.check_attachable(node, child)?;
        if let Some(former) = former {
            self.nodes[former].parent = None;
        }
        self.link_left(node, child);
        Ok(former)
    }

    /// Sets the right child of `node`. Mirror image of [`Tree::set_left`].
    pub fn set_right(
        &mut self,
        node: Index,
        child: Option<Index>,
    ) -> Result<Option<Index>, TreeError> {
        let former = self.nodes.get(node).ok_or(TreeError::StaleNode(node))?.right;
        if former == child {
            return Ok(former);
        }
        self.check_attachable(node, child)?;
        if let Some(former) = former {
            self.nodes[former].parent = None;
        }
        self.link_right(node, child);
        Ok(former)
    }

    fn check_attachable(&self, node: Index, child: Option<Index>) -> Result<(), TreeError> {
        let child = match child {
            Some(child) => child,
            None => return Ok(()),
        };
        let child_node = self.nodes.get(child).ok_or(TreeError::StaleNode(child))?;
        if self.head(node) == child {
            return Err(TreeError::WouldCycle {
                parent: node,
                child,
            });
        }
        if child_node.parent.is_some() || self.root == Some(child) {
            return Err(TreeError::AlreadyAttached(child));
        }
        Ok(())
    }

    /// Restores the balance of a single node with a single or double rotation if its
    /// subtrees differ in height by more than one.
    pub fn rebalance(&mut self, node: Index) -> Result<(), TreeError> {
        if !self.nodes.contains(node) {
            return Err(TreeError::StaleNode(node));
        }
        self.balance_node(node);
        Ok(())
    }

    /// Rebalances `node` and then each of its ancestors up to the top of the tree.
    pub fn rebalance_from(&mut self, node: Index) -> Result<(), TreeError> {
        if !self.nodes.contains(node) {
            return Err(TreeError::StaleNode(node));
        }
        self.balance_upward(node);
        Ok(())
    }

    fn balance_node(&mut self, node: Index) {
        let balance = self.balance_factor(Some(node));
        if balance > 1 {
            if self.balance_factor(self.nodes[node].right) < 0 {
                self.right_left_rotate(node);
            } else {
                self.left_rotate(node);
            }
        } else if balance < -1 {
            if self.balance_factor(self.nodes[node].left) > 0 {
                self.left_right_rotate(node);
            } else {
                self.right_rotate(node);
            }
        }
    }

    fn balance_upward(&mut self, node: Index) {
        let mut current = Some(node);
        while let Some(node) = current {
            self.balance_node(node);
            // After a rotation the parent is the pivot that took the node's place
            current = self.nodes[node].parent;
        }
    }

    /// Rotates `node` down to the left, its right child takes its place.
    pub fn rotate_left(&mut self, node: Index) -> Result<(), TreeError> {
        self.nodes
            .get(node)
            .ok_or(TreeError::StaleNode(node))?
            .right
            .ok_or(TreeError::MissingPivot(node))?;
        self.left_rotate(node);
        Ok(())
    }

    /// Rotates `node` down to the right, its left child takes its place.
    pub fn rotate_right(&mut self, node: Index) -> Result<(), TreeError> {
        self.nodes
            .get(node)
            .ok_or(TreeError::StaleNode(node))?
            .left
            .ok_or(TreeError::MissingPivot(node))?;
        self.right_rotate(node);
        Ok(())
    }

    /// Right rotation of the right child followed by a left rotation of `node`.
    pub fn rotate_right_left(&mut self, node: Index) -> Result<(), TreeError> {
        let right = self
            .nodes
            .get(node)
            .ok_or(TreeError::StaleNode(node))?
            .right
            .ok_or(TreeError::MissingPivot(node))?;
        self.nodes[right].left.ok_or(TreeError::MissingPivot(right))?;
        self.right_left_rotate(node);
        Ok(())
    }

    /// Left rotation of the left child followed by a right rotation of `node`.
    pub fn rotate_left_right(&mut self, node: Index) -> Result<(), TreeError> {
        let left = self
            .nodes
            .get(node)
            .ok_or(TreeError::StaleNode(node))?
            .left
            .ok_or(TreeError::MissingPivot(node))?;
        self.nodes[left].right.ok_or(TreeError::MissingPivot(left))?;
        self.left_right_rotate(node);
        Ok(())
    }

    // Roates the nodes to the left
    //    p              q
    //   / \            / \
    //  a   q   -->    p   c
    //     / \        / \
    //    b   c      a   b
    fn left_rotate(&mut self, rotation_root: Index) {
        // Left rotation so pivot is to the right
        let pivot = match self.nodes[rotation_root].right {
            Some(pivot) => pivot,
            None => return,
        };
        trace!("rotating {:?} left around {:?}", rotation_root, pivot);
        self.replace_root(rotation_root, pivot);

        // The left child of the pivot becomes the right child of the rotation root
        let pivot_left = self.nodes[pivot].left;
        self.link_right(rotation_root, pivot_left);
        self.link_left(pivot, Some(rotation_root));
    }

    // Rotates the nodes to the right
    //     q             p
    //    / \           / \
    //   p   c  -->    a   q
    //  / \               / \
    // a   b             b   c
    fn right_rotate(&mut self, rotation_root: Index) {
        // Right rotation so pivot is to the left
        let pivot = match self.nodes[rotation_root].left {
            Some(pivot) => pivot,
            None => return,
        };
        trace!("rotating {:?} right around {:?}", rotation_root, pivot);
        self.replace_root(rotation_root, pivot);

        // The right child of the pivot becomes the left child of the rotation root
        let pivot_right = self.nodes[pivot].right;
        self.link_left(rotation_root, pivot_right);
        self.link_right(pivot, Some(rotation_root));
    }

    //   p               p              b
    //    \               \            / \
    //     q    -->        b    -->   p   q
    //    /                 \
    //   b                   q
    fn right_left_rotate(&mut self, rotation_root: Index) {
        if let Some(right) = self.nodes[rotation_root].right {
            self.right_rotate(right);
        }
        self.left_rotate(rotation_root);
    }

    fn left_right_rotate(&mut self, rotation_root: Index) {
        if let Some(left) = self.nodes[rotation_root].left {
            self.left_rotate(left);
        }
        self.right_rotate(rotation_root);
    }

    // Puts `new_root` in the slot `node` occupies under its parent and hangs `node` below it.
    // The caller is left to relink the children of both nodes.
    fn replace_root(&mut self, node: Index, new_root: Index) {
        let parent = self.nodes[node].parent;
        match self.get_node_type(node) {
            NodeType::LeftChild(parent) => self.nodes[parent].left = Some(new_root),
            NodeType::RightChild(parent) => self.nodes[parent].right = Some(new_root),
            NodeType::Orphan => {
                if self.root == Some(node) {
                    trace!("{:?} replaces {:?} at the top", new_root, node);
                    self.root = Some(new_root);
                }
            }
        }
        self.nodes[new_root].parent = parent;
        self.nodes[node].parent = Some(new_root);
    }

    // Links `replacement` into the slot `node` occupies, or makes it the new top
    fn replace_in_parent(&mut self, node: Index, replacement: Option<Index>) {
        match self.get_node_type(node) {
            NodeType::LeftChild(parent) => self.link_left(parent, replacement),
            NodeType::RightChild(parent) => self.link_right(parent, replacement),
            NodeType::Orphan => {
                if let Some(replacement) = replacement {
                    self.nodes[replacement].parent = None;
                }
                if self.root == Some(node) {
                    self.root = replacement;
                }
            }
        }
    }

    fn link_left(&mut self, node: Index, child: Option<Index>) {
        self.nodes[node].left = child;
        if let Some(child) = child {
            self.nodes[child].parent = Some(node);
        }
    }

    fn link_right(&mut self, node: Index, child: Option<Index>) {
        self.nodes[node].right = child;
        if let Some(child) = child {
            self.nodes[child].parent = Some(node);
        }
    }

    // Returns a NodeType enum indicating if the given node is a left child, right child in
    // relation to it's parent or an orphan. Decided by link identity so equal values can't
    // confuse it.
    fn get_node_type(&self, node: Index) -> NodeType {
        match self.nodes[node].parent {
            Some(parent) => {
                if self.nodes[parent].left == Some(node) {
                    NodeType::LeftChild(parent)
                } else {
                    NodeType::RightChild(parent)
                }
            }
            None => NodeType::Orphan,
        }
    }

    /// Checks every invariant of the tree hanging from the root: the root has no parent,
    /// every child points back at its parent, an in-order walk never decreases and no node
    /// leans more than one level to either side.
    pub fn validate(&self) -> Result<(), TreeError> {
        let root = match self.root {
            Some(root) => root,
            None => return Ok(()),
        };
        let top = self.nodes.get(root).ok_or(TreeError::StaleNode(root))?;
        if top.parent.is_some() {
            return Err(TreeError::RootHasParent(root));
        }
        self.validate_subtree(root, None, None).map(|_| ())
    }

    // Returns the height of the subtree. `lower` and `upper` are the values of the nearest
    // ancestors the subtree hangs right and left of.
    fn validate_subtree(
        &self,
        node: Index,
        lower: Option<&T>,
        upper: Option<&T>,
    ) -> Result<usize, TreeError> {
        let current = self.nodes.get(node).ok_or(TreeError::StaleNode(node))?;
        let below_lower = lower.map_or(false, |lower| current.value < *lower);
        let above_upper = upper.map_or(false, |upper| current.value > *upper);
        if below_lower || above_upper {
            return Err(TreeError::OrderViolation(node));
        }

        let left_height = match current.left {
            Some(left) => {
                self.check_parent(node, left)?;
                self.validate_subtree(left, lower, Some(&current.value))?
            }
            None => 0,
        };
        let right_height = match current.right {
            Some(right) => {
                self.check_parent(node, right)?;
                self.validate_subtree(right, Some(&current.value), upper)?
            }
            None => 0,
        };

        let balance_factor = right_height as isize - left_height as isize;
        if balance_factor.abs() > 1 {
            return Err(TreeError::Unbalanced {
                node,
                balance_factor,
            });
        }
        Ok(1 + left_height.max(right_height))
    }

    fn check_parent(&self, node: Index, child: Index) -> Result<(), TreeError> {
        let child_node = self.nodes.get(child).ok_or(TreeError::StaleNode(child))?;
        if child_node.parent != Some(node) {
            return Err(TreeError::ParentMismatch { node, child });
        }
        Ok(())
    }
}
