//! Arena-based syntax tree.
//!
//! All nodes of a document live in one [`indextree::Arena`]; the tree is
//! addressed by `NodeId` and structural edits are child-list mutations on
//! the arena, never pointer surgery. A node is either a leaf carrying its
//! token text or a composite whose text is the concatenation of its
//! children; composites cache their subtree text length so offset lookups
//! stay cheap.
//!
//! The tree carries a monotonic [`Generation`] stamp, bumped once per
//! committed change. External caches hold [`NodeRef`]s (id + generation)
//! and revalidate against the stamp instead of being cleared by callback.

use compact_str::CompactString;
use indextree::{Arena, NodeId};
use lockstep::{ChildList, Equality, ShallowCompare, TreeSource};
use smallvec::SmallVec;

use core::fmt;

/// Node type tag. Meaning is defined by the language that produced the
/// tree; the engine only ever compares tags and looks them up in a
/// [`crate::language::LanguageSpec`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntaxKind(pub u16);

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

/// Monotonic per-tree mutation stamp. Compares equal only if no commit
/// happened in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

/// Weak external handle into a tree: a node id plus the generation it was
/// taken at. Resolvable only while the tree is still at that generation;
/// after a commit the holder must revalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    /// The referenced node.
    pub node: NodeId,
    /// The tree generation at the time the reference was taken.
    pub generation: Generation,
}

#[derive(Debug, Clone)]
enum NodeContent {
    Leaf(CompactString),
    /// Cached subtree text length, kept in sync by every mutation.
    Composite { len: usize },
}

/// What goes in each arena slot.
#[derive(Debug, Clone)]
pub struct NodeData {
    kind: SyntaxKind,
    content: NodeContent,
}

impl NodeData {
    /// The node's type tag.
    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    /// Whether this is a leaf (token) node.
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf(_))
    }

    /// The leaf's token text, if this is a leaf.
    pub fn leaf_text(&self) -> Option<&str> {
        match &self.content {
            NodeContent::Leaf(text) => Some(text.as_str()),
            NodeContent::Composite { .. } => None,
        }
    }

    /// Length in bytes of the text this subtree covers.
    pub fn text_len(&self) -> usize {
        match &self.content {
            NodeContent::Leaf(text) => text.len(),
            NodeContent::Composite { len } => *len,
        }
    }
}

/// A document's syntax tree: arena + root + generation stamp.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    arena: Arena<NodeData>,
    root: NodeId,
    generation: Generation,
}

impl SyntaxTree {
    /// Create a tree holding a single empty composite root.
    pub fn new(root_kind: SyntaxKind) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData {
            kind: root_kind,
            content: NodeContent::Composite { len: 0 },
        });
        SyntaxTree {
            arena,
            root,
            generation: Generation::default(),
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The current mutation stamp.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// The node's parent, if it is not the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Iterate a node's children in source order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Append a leaf under `parent`. Ancestor length caches are updated.
    pub fn add_leaf(
        &mut self,
        parent: NodeId,
        kind: SyntaxKind,
        text: impl Into<CompactString>,
    ) -> NodeId {
        let text = text.into();
        let len = text.len();
        let id = self.arena.new_node(NodeData {
            kind,
            content: NodeContent::Leaf(text),
        });
        parent.append(id, &mut self.arena);
        self.apply_len_delta(parent, len as isize);
        id
    }

    /// Append an empty composite under `parent`.
    pub fn add_composite(&mut self, parent: NodeId, kind: SyntaxKind) -> NodeId {
        let id = self.arena.new_node(NodeData {
            kind,
            content: NodeContent::Composite { len: 0 },
        });
        parent.append(id, &mut self.arena);
        id
    }

    /// Length in bytes of the text covered by `id`.
    pub fn text_len(&self, id: NodeId) -> usize {
        self.get(id).text_len()
    }

    /// Concatenated leaf text of the whole tree.
    pub fn text(&self) -> String {
        self.node_text(self.root)
    }

    /// Concatenated leaf text of the subtree at `id`.
    pub fn node_text(&self, id: NodeId) -> String {
        let mut out = String::with_capacity(self.text_len(id));
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.get(id).leaf_text() {
            Some(text) => out.push_str(text),
            None => {
                for child in id.children(&self.arena) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Offset of the first byte covered by `id`, relative to the document
    /// start. Computed by summing preceding-sibling lengths up the
    /// ancestor chain.
    pub fn start_offset(&self, id: NodeId) -> usize {
        let mut offset = 0;
        let mut node = id;
        while let Some(parent) = self.parent(node) {
            for sibling in node.preceding_siblings(&self.arena).skip(1) {
                offset += self.text_len(sibling);
            }
            node = parent;
        }
        offset
    }

    /// The leaf covering byte `offset`. An offset at a leaf boundary
    /// resolves to the leaf *starting* there; an offset at or past the end
    /// of the document resolves to the last non-empty leaf. `None` only if
    /// the tree covers no text at all.
    pub fn leaf_at(&self, offset: usize) -> Option<NodeId> {
        let total = self.text_len(self.root);
        if total == 0 {
            return None;
        }
        let mut offset = offset.min(total - 1);
        let mut node = self.root;
        loop {
            if self.get(node).is_leaf() {
                return Some(node);
            }
            let mut acc = 0;
            let mut descend = None;
            let mut last_nonempty = None;
            for child in node.children(&self.arena) {
                let len = self.text_len(child);
                if len > 0 {
                    last_nonempty = Some((child, len));
                }
                if offset < acc + len {
                    descend = Some((child, acc));
                    break;
                }
                acc += len;
            }
            match (descend, last_nonempty) {
                (Some((child, start)), _) => {
                    offset -= start;
                    node = child;
                }
                (None, Some((child, len))) => {
                    offset = len - 1;
                    node = child;
                }
                (None, None) => return None,
            }
        }
    }

    /// Lowest common ancestor of two attached nodes.
    pub fn lowest_common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let chain: SmallVec<[NodeId; 16]> = a.ancestors(&self.arena).collect();
        b.ancestors(&self.arena)
            .find(|candidate| chain.contains(candidate))
            .unwrap_or(self.root)
    }

    /// Whether `id` is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id.ancestors(&self.arena).last() == Some(self.root)
    }

    /// Take a weak reference to `id` at the current generation.
    pub fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef {
            node: id,
            generation: self.generation,
        }
    }

    /// Resolve a weak reference. `None` if the tree has changed since the
    /// reference was taken or the node is no longer attached.
    pub fn resolve(&self, r: NodeRef) -> Option<NodeId> {
        (r.generation == self.generation && self.is_attached(r.node)).then_some(r.node)
    }

    /// Indented structural dump, for debugging and structural assertions
    /// in tests. Kinds print as raw tags, leaves with their text.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let data = self.get(id);
        match data.leaf_text() {
            Some(text) => out.push_str(&format!("{} {:?}\n", data.kind(), text)),
            None => {
                out.push_str(&format!("{}\n", data.kind()));
                for child in id.children(&self.arena) {
                    self.dump_node(child, depth + 1, out);
                }
            }
        }
    }

    /// Replace a leaf's token text in place, keeping ancestor length
    /// caches in sync. Panics if `id` is not a leaf.
    pub(crate) fn set_leaf_text(&mut self, id: NodeId, text: impl Into<CompactString>) {
        let text = text.into();
        let new_len = text.len() as isize;
        let data = self.arena[id].get_mut();
        let NodeContent::Leaf(old) = &mut data.content else {
            panic!("set_leaf_text on composite node");
        };
        let delta = new_len - old.len() as isize;
        *old = text;
        if delta != 0
            && let Some(parent) = self.parent(id)
        {
            self.apply_len_delta(parent, delta);
        }
    }

    /// Add `delta` to the cached length of `from` and every composite
    /// ancestor above it.
    pub(crate) fn apply_len_delta(&mut self, from: NodeId, delta: isize) {
        if delta == 0 {
            return;
        }
        let chain: SmallVec<[NodeId; 16]> = from.ancestors(&self.arena).collect();
        for id in chain {
            if let NodeContent::Composite { len } = &mut self.arena[id].get_mut().content {
                *len = (*len as isize + delta) as usize;
            }
        }
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = Generation(self.generation.0 + 1);
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub(crate) fn arena(&self) -> &Arena<NodeData> {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut Arena<NodeData> {
        &mut self.arena
    }
}

impl TreeSource for SyntaxTree {
    type Node = NodeId;

    fn is_composite(&self, node: NodeId) -> bool {
        !self.get(node).is_leaf()
    }

    fn children(&self, node: NodeId) -> ChildList<NodeId> {
        node.children(&self.arena).collect()
    }
}

/// Shallow comparator over syntax trees: leaves are equal iff kind and
/// text match, composites iff kind matches. A leaf never equals a
/// composite, whatever the kinds.
pub struct SyntaxCompare;

impl ShallowCompare<SyntaxTree, SyntaxTree> for SyntaxCompare {
    fn compare(&self, old: &SyntaxTree, o: NodeId, new: &SyntaxTree, n: NodeId) -> Equality {
        let (a, b) = (old.get(o), new.get(n));
        if a.kind() != b.kind() {
            return Equality::NotEqual;
        }
        match (a.leaf_text(), b.leaf_text()) {
            (None, None) => Equality::Equal,
            (Some(x), Some(y)) if x == y => Equality::Equal,
            _ => Equality::NotEqual,
        }
    }
}
