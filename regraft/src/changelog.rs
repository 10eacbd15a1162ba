//! Change-log builders and commit.
//!
//! The diff walk emits replace/insert/delete callbacks; the builders here
//! receive them and turn them into tree mutations plus listener
//! notifications. [`ChangeLog`] buffers the script and replays it later
//! under the caller's write access; [`ImmediateBuilder`] is the thin
//! variant for callers already inside their write transaction.
//!
//! Replay grafts the needed scratch subtrees into the long-lived arena and
//! splices them with detach/insert-before child-list edits. Each entry
//! fires its `before_*` notification while the tree is still in its
//! pre-mutation state, and the whole commit fires exactly one coalesced
//! [`TreeListener::after_change`] at the lowest common ancestor of every
//! touched node, then bumps the generation once.

use indextree::NodeId;
use lockstep::{Anchor, ChangeBuilder};
use rapidhash::RapidHashMap;
use smallvec::SmallVec;

use crate::tracing_macros::{debug, trace};
use crate::tree::{Generation, SyntaxTree};

/// Observer of structural tree changes, notified in lockstep with commit.
///
/// The `before_*` notifications fire while the tree still holds its
/// pre-mutation shape, so a listener may inspect the outgoing nodes;
/// [`TreeListener::after_change`] fires once per commit, after all
/// mutations, at the smallest subtree containing every change. Default
/// bodies are no-ops so listeners implement only what they need.
pub trait TreeListener {
    /// `child` is about to be spliced under `parent`.
    fn before_child_insertion(&mut self, _tree: &SyntaxTree, _parent: NodeId, _child: NodeId) {}

    /// `child` is about to be detached from `parent`.
    fn before_child_removal(&mut self, _tree: &SyntaxTree, _parent: NodeId, _child: NodeId) {}

    /// `old` is about to be swapped for `new` under `parent`. For a
    /// whole-tree replacement `parent` is the outgoing root itself.
    fn before_child_replacement(
        &mut self,
        _tree: &SyntaxTree,
        _parent: NodeId,
        _old: NodeId,
        _new: NodeId,
    ) {
    }

    /// All mutations of one commit are done; `subtree_root` is the lowest
    /// common ancestor of everything that changed.
    fn after_change(&mut self, _tree: &SyntaxTree, _subtree_root: NodeId) {}
}

/// One recorded edit. `new` handles point into the scratch tree until
/// replay grafts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntry {
    /// Swap the whole subtree at `old` for the scratch subtree at `new`.
    Replace {
        /// Node in the long-lived tree.
        old: NodeId,
        /// Root of the replacement subtree in the scratch tree.
        new: NodeId,
    },
    /// Splice the scratch subtree at `new` under `parent`.
    Insert {
        /// Parent in the long-lived tree.
        parent: NodeId,
        /// Position among the parent's children.
        anchor: Anchor<NodeId, NodeId>,
        /// Root of the inserted subtree in the scratch tree.
        new: NodeId,
    },
    /// Detach `child` from `parent`.
    Delete {
        /// Parent in the long-lived tree.
        parent: NodeId,
        /// Node in the long-lived tree.
        child: NodeId,
    },
}

/// Replay failed: the log no longer matches the tree. This indicates a
/// broken invariant upstream, is never retried, and obliges the caller to
/// rebuild the document with a full reparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("change log inconsistent with tree ({0}); document requires a full reparse")]
pub struct CommitError(pub &'static str);

/// What a commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Tree generation after the commit.
    pub generation: Generation,
    /// Number of edit operations applied. Zero means the commit was a
    /// no-op and the generation did not move.
    pub ops_applied: usize,
    /// Lowest common ancestor of every touched node; `None` for a no-op.
    pub changed: Option<NodeId>,
}

/// Deferred change-log builder: records the edit script without touching
/// the tree, then applies it all at once in [`ChangeLog::commit`].
///
/// Because the log is only replayed after the whole diff succeeded, no
/// listener ever observes a half-patched tree, and the events of one
/// commit are strictly sequential.
#[derive(Debug, Default)]
pub struct ChangeLog {
    entries: Vec<LogEntry>,
}

impl ChangeLog {
    /// An empty log.
    pub fn new() -> Self {
        ChangeLog::default()
    }

    /// The recorded entries, in application order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Whether nothing was recorded (the trees compared fully equal).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replay the log against `tree`, adopting subtrees out of `scratch`.
    ///
    /// Runs synchronously to completion under the caller's exclusive
    /// access (`&mut tree`); an empty log is a no-op that fires no events
    /// and leaves the generation untouched.
    pub fn commit(
        self,
        tree: &mut SyntaxTree,
        scratch: &SyntaxTree,
        listeners: &mut [&mut dyn TreeListener],
    ) -> Result<CommitOutcome, CommitError> {
        replay(&self.entries, tree, scratch, listeners)
    }
}

impl ChangeBuilder<NodeId, NodeId> for ChangeLog {
    type Checkpoint = usize;

    fn replaced(&mut self, old: NodeId, new: NodeId) {
        self.entries.push(LogEntry::Replace { old, new });
    }

    fn inserted(&mut self, parent: NodeId, anchor: Anchor<NodeId, NodeId>, new: NodeId) {
        self.entries.push(LogEntry::Insert {
            parent,
            anchor,
            new,
        });
    }

    fn deleted(&mut self, parent: NodeId, child: NodeId) {
        self.entries.push(LogEntry::Delete { parent, child });
    }

    fn checkpoint(&self) -> usize {
        self.entries.len()
    }

    fn rollback_to(&mut self, checkpoint: usize) {
        self.entries.truncate(checkpoint);
    }
}

/// Same callback contract as [`ChangeLog`], for callers that already hold
/// the exclusive write scope and want the mutations applied within the
/// same call that computed the diff.
///
/// Mutation cannot interleave with the immutable diff walk under Rust
/// aliasing rules, so the builder keeps a minimal op buffer and
/// [`ImmediateBuilder::apply_now`] drains it the moment the walk returns —
/// no change-log notification metadata is materialized. End state and
/// event order are identical to the deferred builder; only the visibility
/// timing during the walk differs, which is unobservable under the
/// single-writer model.
#[derive(Debug, Default)]
pub struct ImmediateBuilder {
    ops: SmallVec<[LogEntry; 8]>,
}

impl ImmediateBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        ImmediateBuilder::default()
    }

    /// Whether the walk produced no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply the buffered operations right away.
    pub fn apply_now(
        self,
        tree: &mut SyntaxTree,
        scratch: &SyntaxTree,
        listeners: &mut [&mut dyn TreeListener],
    ) -> Result<CommitOutcome, CommitError> {
        replay(&self.ops, tree, scratch, listeners)
    }
}

impl ChangeBuilder<NodeId, NodeId> for ImmediateBuilder {
    type Checkpoint = usize;

    fn replaced(&mut self, old: NodeId, new: NodeId) {
        self.ops.push(LogEntry::Replace { old, new });
    }

    fn inserted(&mut self, parent: NodeId, anchor: Anchor<NodeId, NodeId>, new: NodeId) {
        self.ops.push(LogEntry::Insert {
            parent,
            anchor,
            new,
        });
    }

    fn deleted(&mut self, parent: NodeId, child: NodeId) {
        self.ops.push(LogEntry::Delete { parent, child });
    }

    fn checkpoint(&self) -> usize {
        self.ops.len()
    }

    fn rollback_to(&mut self, checkpoint: usize) {
        self.ops.truncate(checkpoint);
    }
}

/// Move the subtree at `node` out of the scratch arena into `tree`'s
/// arena, preserving child order. Returns the adopted root; every adopted
/// node is recorded in `grafted` so later anchors can refer to it.
fn graft(
    tree: &mut SyntaxTree,
    scratch: &SyntaxTree,
    node: NodeId,
    grafted: &mut RapidHashMap<NodeId, NodeId>,
) -> NodeId {
    let data = scratch.get(node).clone();
    let id = tree.arena_mut().new_node(data);
    grafted.insert(node, id);
    let kids: SmallVec<[NodeId; 8]> = node.children(scratch.arena()).collect();
    for kid in kids {
        let adopted = graft(tree, scratch, kid, grafted);
        id.append(adopted, tree.arena_mut());
    }
    id
}

fn replay(
    entries: &[LogEntry],
    tree: &mut SyntaxTree,
    scratch: &SyntaxTree,
    listeners: &mut [&mut dyn TreeListener],
) -> Result<CommitOutcome, CommitError> {
    if entries.is_empty() {
        trace!("empty change log, commit is a no-op");
        return Ok(CommitOutcome {
            generation: tree.generation(),
            ops_applied: 0,
            changed: None,
        });
    }

    debug!(entries = entries.len(), "replaying change log");

    let mut grafted: RapidHashMap<NodeId, NodeId> = RapidHashMap::default();
    let mut touched: SmallVec<[NodeId; 8]> = SmallVec::new();

    for entry in entries {
        trace!(?entry, "replay entry");
        match *entry {
            LogEntry::Replace { old, new } => {
                let adopted = graft(tree, scratch, new, &mut grafted);
                match tree.parent(old) {
                    Some(parent) => {
                        let delta = tree.text_len(adopted) as isize - tree.text_len(old) as isize;
                        for l in listeners.iter_mut() {
                            l.before_child_replacement(tree, parent, old, adopted);
                        }
                        old.insert_before(adopted, tree.arena_mut());
                        old.detach(tree.arena_mut());
                        tree.apply_len_delta(parent, delta);
                        touched.push(parent);
                    }
                    None => {
                        if old != tree.root() {
                            return Err(CommitError("replaced node is already detached"));
                        }
                        for l in listeners.iter_mut() {
                            l.before_child_replacement(tree, old, old, adopted);
                        }
                        tree.set_root(adopted);
                        touched.push(adopted);
                    }
                }
            }
            LogEntry::Insert {
                parent,
                anchor,
                new,
            } => {
                if !tree.is_attached(parent) {
                    return Err(CommitError("insertion parent is not in the tree"));
                }
                let adopted = graft(tree, scratch, new, &mut grafted);
                for l in listeners.iter_mut() {
                    l.before_child_insertion(tree, parent, adopted);
                }
                match anchor {
                    Anchor::Start => parent.prepend(adopted, tree.arena_mut()),
                    Anchor::OldSibling(sibling) => {
                        if tree.parent(sibling) != Some(parent) {
                            return Err(CommitError("insertion anchor left the parent"));
                        }
                        sibling.insert_after(adopted, tree.arena_mut());
                    }
                    Anchor::NewSibling(scratch_sibling) => {
                        let Some(&placed) = grafted.get(&scratch_sibling) else {
                            return Err(CommitError("insertion anchor was never grafted"));
                        };
                        placed.insert_after(adopted, tree.arena_mut());
                    }
                }
                let len = tree.text_len(adopted) as isize;
                tree.apply_len_delta(parent, len);
                touched.push(parent);
            }
            LogEntry::Delete { parent, child } => {
                if tree.parent(child) != Some(parent) {
                    return Err(CommitError("deleted node is not under its recorded parent"));
                }
                for l in listeners.iter_mut() {
                    l.before_child_removal(tree, parent, child);
                }
                let len = tree.text_len(child) as isize;
                child.detach(tree.arena_mut());
                tree.apply_len_delta(parent, -len);
                touched.push(parent);
            }
        }
    }

    let mut changed = touched[0];
    for &node in &touched[1..] {
        changed = tree.lowest_common_ancestor(changed, node);
    }

    debug!(?changed, ops = entries.len(), "commit complete");
    for l in listeners.iter_mut() {
        l.after_change(tree, changed);
    }
    tree.bump_generation();

    Ok(CommitOutcome {
        generation: tree.generation(),
        ops_applied: entries.len(),
        changed: Some(changed),
    })
}
