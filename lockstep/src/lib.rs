//! # Lockstep
//!
//! Shallow-compare tree diffing with bounded lookahead.
//!
//! Given two ordered trees — a long-lived "old" tree and a freshly built
//! "new" tree — lockstep produces an edit script (replace / insert / delete
//! callbacks) that transforms the old tree into the new one while keeping
//! every subtree that compares equal untouched. The two trees may be
//! entirely different concrete types; lockstep only sees them through the
//! [`TreeSource`] and [`ShallowCompare`] traits.
//!
//! ## Algorithm overview
//!
//! 1. If the roots are not shallow-equal, emit a single whole-tree replace.
//! 2. Otherwise walk the child lists of both trees in lockstep: equal pairs
//!    are kept (recursing into composites to find interior differences);
//!    on a mismatch, a small bounded lookahead window decides whether
//!    deleting the old child, inserting the new child, or replacing one
//!    with the other realigns the cursors fastest. Ties prefer replace,
//!    which produces fewer events than a delete/insert pair.
//! 3. Recursion bottoms out at leaves.
//!
//! The walk is deliberately *not* optimal tree-edit-distance: it is a fast
//! heuristic that keeps identity for unchanged siblings, which is what
//! incremental consumers care about.
//!
//! ## Safety bounds
//!
//! [`DiffLimits`] caps recursion depth, child-list width, and the lookahead
//! window. When a bound trips inside a subtree, the engine rolls the
//! builder back to the subtree boundary and substitutes a whole-subtree
//! replace — degraded but correct. When the bound trips at the entry
//! boundary itself, [`diff`] returns [`DiffAborted`] having emitted no
//! callbacks at all, and the caller must fall back to replacing the whole
//! tree.

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use smallvec;

mod tracing_macros;

mod walk;

pub use walk::diff;

use core::fmt;
use smallvec::SmallVec;

/// Snapshot of a node's ordered children.
///
/// Most syntax nodes have few children; the inline capacity avoids heap
/// traffic for the common case.
pub type ChildList<N> = SmallVec<[N; 8]>;

/// Read access to one side of a diff.
///
/// Implementations must present a well-formed ordered tree: every node is
/// reachable from the root exactly once, and a leaf has no children.
pub trait TreeSource {
    /// Handle to a node in this tree. Cheap to copy.
    type Node: Copy + PartialEq + fmt::Debug;

    /// Whether this node may have children.
    fn is_composite(&self, node: Self::Node) -> bool;

    /// The node's children, in source order. Empty for leaves.
    fn children(&self, node: Self::Node) -> ChildList<Self::Node>;
}

/// Verdict of a shallow node comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equality {
    /// The nodes match without descending into children.
    Equal,
    /// The nodes differ.
    NotEqual,
}

/// Cheap equality test between an old-tree node and a new-tree node,
/// without descending.
///
/// The intended asymmetry: leaves are equal iff their kind *and* text
/// match, while composites are equal iff their kind matches — children are
/// the diff engine's job. That lets the engine tentatively reuse a
/// composite wrapper and still discover interior differences by recursing.
pub trait ShallowCompare<O: TreeSource, N: TreeSource> {
    /// Compare one node from each side.
    fn compare(&self, old: &O, old_node: O::Node, new: &N, new_node: N::Node) -> Equality;
}

/// Where an inserted node lands among its new siblings.
///
/// Anchors are expressed in terms the builder can resolve at apply time:
/// either an old-tree sibling that survives the edit, or a new-tree node
/// that an earlier callback in the same script already placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor<O, N> {
    /// Insert as the first child of the parent.
    Start,
    /// Insert immediately after this old-tree sibling.
    OldSibling(O),
    /// Insert immediately after this new-tree node, which an earlier
    /// replace or insert callback in the same script has placed.
    NewSibling(N),
}

/// Receiver for the edit script produced by [`diff`].
///
/// Callbacks arrive in application order. `O` is the old tree's node
/// handle, `N` the new tree's. The checkpoint methods exist so the engine
/// can retract callbacks for a subtree whose diff aborted; a buffering
/// builder implements them as save/truncate on its entry list.
pub trait ChangeBuilder<O, N> {
    /// Opaque position in the callback stream.
    type Checkpoint;

    /// `old` is replaced by the whole `new` subtree.
    fn replaced(&mut self, old: O, new: N);

    /// The `new` subtree is inserted under `parent` after `anchor`.
    fn inserted(&mut self, parent: O, anchor: Anchor<O, N>, new: N);

    /// `child` is removed from `parent`.
    fn deleted(&mut self, parent: O, child: O);

    /// Current position in the callback stream.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Discard every callback recorded since `checkpoint`.
    fn rollback_to(&mut self, checkpoint: Self::Checkpoint);
}

/// Default lookahead window for hypothesis selection.
///
/// Empirically a small window is enough: a localized edit shifts siblings
/// by one or two positions, and anything larger is cheaper to handle as a
/// replace. Tunable per call via [`DiffLimits`].
pub const DEFAULT_LOOKAHEAD: usize = 3;

/// Default recursion depth bound.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default child-list width bound.
pub const DEFAULT_MAX_CHILDREN: usize = 4096;

/// Tunable safety bounds for the diff walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffLimits {
    /// How far ahead the delete/insert hypotheses may look to realign the
    /// cursors.
    pub lookahead: usize,
    /// Maximum recursion depth before a subtree degrades to a replace.
    pub max_depth: usize,
    /// Maximum sibling-list size before a subtree degrades to a replace.
    pub max_children: usize,
}

impl Default for DiffLimits {
    fn default() -> Self {
        DiffLimits {
            lookahead: DEFAULT_LOOKAHEAD,
            max_depth: DEFAULT_MAX_DEPTH,
            max_children: DEFAULT_MAX_CHILDREN,
        }
    }
}

/// The diff walk gave up before emitting any callback for the entry
/// boundary; the caller must substitute a whole-tree replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DiffAborted {
    /// Recursion exceeded [`DiffLimits::max_depth`].
    #[error("diff aborted: recursion depth limit exceeded")]
    DepthLimit,
    /// A sibling list exceeded [`DiffLimits::max_children`].
    #[error("diff aborted: child list width limit exceeded")]
    WidthLimit,
    /// A tree reported an impossible shape mid-walk (e.g. a node listing
    /// itself as a child).
    #[error("diff aborted: malformed tree")]
    Malformed,
}
