//! Incremental reparse orchestrator.
//!
//! Drives one edit through the escalation ladder: single-leaf
//! substitution, then a scoped reparse of the smallest qualifying
//! ancestor, then a whole-file reparse. Each rung either succeeds, moves
//! to the next rung, or fails in a way that leaves the tree untouched;
//! mutations happen only in commit, which is all-or-nothing.

use indextree::NodeId;
use lockstep::{ChangeBuilder, DiffAborted, DiffLimits};

use crate::changelog::{ChangeLog, CommitError, CommitOutcome, ImmediateBuilder, TreeListener};
use crate::language::{LanguageSpec, ParseFailure, Parser};
use crate::scope::{self, Scope, TextEdit};
use crate::tracing_macros::debug;
use crate::tree::{Generation, SyntaxCompare, SyntaxTree};

/// How an edit ended up being absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The edit stayed inside one leaf token; its text was swapped in
    /// place without parsing or diffing.
    LeafSubstitution,
    /// A subtree was reparsed in isolation and merged.
    Scoped,
    /// The whole document was reparsed and merged.
    WholeFile,
}

/// A successful reparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReparseOutcome {
    /// Which rung of the escalation ladder absorbed the edit.
    pub strategy: Strategy,
    /// Tree generation after the reparse. Unchanged when the edit turned
    /// out to be a textual no-op.
    pub generation: Generation,
    /// Number of structural edit operations committed. Zero for leaf
    /// substitutions and for no-op reparses.
    pub ops_applied: usize,
}

/// Why a reparse made no progress. In every case the tree is exactly as
/// it was before the call, except [`ReparseError::Commit`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReparseError {
    /// The edit range does not lie within the old document.
    #[error("edit range {start}..{end} is outside the document (length {len})")]
    EditOutOfBounds {
        /// First byte of the replaced range.
        start: usize,
        /// One past the last replaced byte.
        end: usize,
        /// Old document length.
        len: usize,
    },
    /// `new_text` is not the old text with the edit applied.
    #[error("new text length {actual} does not match the edit (expected {expected})")]
    LengthMismatch {
        /// Length the edit implies.
        expected: usize,
        /// Length of the supplied new text.
        actual: usize,
    },
    /// The whole-document parse failed, or the parser cooperatively
    /// cancelled. A scoped syntax failure never surfaces here; it
    /// escalates instead.
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    /// Commit found the change log inconsistent with the tree. The tree
    /// may hold a partial commit; the document must be rebuilt from text.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// Knobs for one reparse call.
#[derive(Debug, Clone, Copy)]
pub struct ReparseOptions {
    /// Budgets for the diff walk. Exceeding them inside a scoped diff
    /// escalates; exceeding them at whole-file level degrades to a single
    /// root replacement.
    pub limits: DiffLimits,
    /// Reject leaf substitutions whose edit touches the leaf boundary,
    /// where new characters could fuse with a neighboring token.
    pub require_interior_edit: bool,
    /// Apply mutations as soon as the diff walk finishes instead of
    /// recording a deferred change log. Same end state and event order.
    pub immediate: bool,
}

impl Default for ReparseOptions {
    fn default() -> Self {
        ReparseOptions {
            limits: DiffLimits::default(),
            require_interior_edit: false,
            immediate: false,
        }
    }
}

/// Reparse after one text edit.
///
/// `new_text` is the complete post-edit document; `edit` locates what
/// changed within the old one. On success the tree's text equals
/// `new_text` and every node outside the committed changes keeps its
/// identity.
pub fn reparse(
    tree: &mut SyntaxTree,
    listeners: &mut [&mut dyn TreeListener],
    parser: &dyn Parser,
    spec: &LanguageSpec,
    new_text: &str,
    edit: &TextEdit,
    options: &ReparseOptions,
) -> Result<ReparseOutcome, ReparseError> {
    let old_len = tree.text_len(tree.root());
    if edit.start > edit.end || edit.end > old_len {
        return Err(ReparseError::EditOutOfBounds {
            start: edit.start,
            end: edit.end,
            len: old_len,
        });
    }
    let expected = old_len - (edit.end - edit.start) + edit.replacement_len;
    if new_text.len() != expected {
        return Err(ReparseError::LengthMismatch {
            expected,
            actual: new_text.len(),
        });
    }

    if let Some(_leaf) = scope::try_leaf_substitution(
        tree,
        listeners,
        parser,
        spec,
        new_text,
        edit,
        options.require_interior_edit,
    ) {
        return Ok(ReparseOutcome {
            strategy: Strategy::LeafSubstitution,
            generation: tree.generation(),
            ops_applied: 0,
        });
    }

    if let Scope::Node(node) = scope::locate(tree, spec, parser, new_text, edit) {
        let kind = tree.get(node).kind();
        let language = spec.info(kind).language;
        let start = tree.start_offset(node);
        let end = (start + tree.text_len(node)) as isize + edit.delta();
        let slice = &new_text[start..end as usize];

        match parser.parse(slice, language) {
            Ok(scratch) => {
                let root_data = scratch.get(scratch.root());
                if root_data.kind() == kind && scratch.text_len(scratch.root()) == slice.len() {
                    match diff_and_commit(tree, node, &scratch, listeners, options, false) {
                        Ok(outcome) => {
                            return Ok(ReparseOutcome {
                                strategy: Strategy::Scoped,
                                generation: outcome.generation,
                                ops_applied: outcome.ops_applied,
                            });
                        }
                        Err(Stage::Aborted(_)) => {
                            debug!("scoped diff over budget, escalating");
                        }
                        Err(Stage::Commit(e)) => return Err(ReparseError::Commit(e)),
                    }
                } else {
                    debug!(%kind, "scoped parse does not cover the scope, escalating");
                }
            }
            Err(ParseFailure::Cancelled) => return Err(ReparseError::Parse(ParseFailure::Cancelled)),
            Err(ParseFailure::Syntax(_)) => {
                debug!("scoped parse failed, escalating");
            }
        }
    }

    let root = tree.root();
    let language = spec.info(tree.get(root).kind()).language;
    let scratch = parser.parse(new_text, language)?;
    debug!("whole-file reparse");
    match diff_and_commit(tree, root, &scratch, listeners, options, true) {
        Ok(outcome) => Ok(ReparseOutcome {
            strategy: Strategy::WholeFile,
            generation: outcome.generation,
            ops_applied: outcome.ops_applied,
        }),
        Err(Stage::Commit(e)) => Err(ReparseError::Commit(e)),
        // degrade_on_abort turns every abort into a root replacement.
        Err(Stage::Aborted(_)) => unreachable!("whole-file diff degrades instead of aborting"),
    }
}

enum Stage {
    Aborted(DiffAborted),
    Commit(CommitError),
}

/// Diff `scratch` against the subtree at `old_root` and commit the
/// resulting script. With `degrade_on_abort`, a diff over budget becomes
/// a single replacement of `old_root`; otherwise the abort is returned
/// with the tree untouched.
fn diff_and_commit(
    tree: &mut SyntaxTree,
    old_root: NodeId,
    scratch: &SyntaxTree,
    listeners: &mut [&mut dyn TreeListener],
    options: &ReparseOptions,
    degrade_on_abort: bool,
) -> Result<CommitOutcome, Stage> {
    if options.immediate {
        let mut builder = ImmediateBuilder::new();
        run_diff(
            tree,
            old_root,
            scratch,
            &mut builder,
            &options.limits,
            degrade_on_abort,
        )
        .map_err(Stage::Aborted)?;
        builder
            .apply_now(tree, scratch, listeners)
            .map_err(Stage::Commit)
    } else {
        let mut log = ChangeLog::new();
        run_diff(
            tree,
            old_root,
            scratch,
            &mut log,
            &options.limits,
            degrade_on_abort,
        )
        .map_err(Stage::Aborted)?;
        log.commit(tree, scratch, listeners).map_err(Stage::Commit)
    }
}

fn run_diff<B: ChangeBuilder<NodeId, NodeId, Checkpoint = usize>>(
    tree: &SyntaxTree,
    old_root: NodeId,
    scratch: &SyntaxTree,
    builder: &mut B,
    limits: &DiffLimits,
    degrade_on_abort: bool,
) -> Result<(), DiffAborted> {
    match lockstep::diff(
        tree,
        old_root,
        scratch,
        scratch.root(),
        &SyntaxCompare,
        builder,
        limits,
    ) {
        Ok(()) => Ok(()),
        Err(_) if degrade_on_abort => {
            debug!("diff over budget, degrading to root replacement");
            builder.rollback_to(0);
            builder.replaced(old_root, scratch.root());
            Ok(())
        }
        Err(reason) => Err(reason),
    }
}
