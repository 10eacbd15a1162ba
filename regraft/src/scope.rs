//! Reparse scope location.
//!
//! Given an edit range, find the smallest ancestor that can be re-lexed
//! and re-parsed from its own text in isolation, or report that only a
//! whole-file reparse will do. Also hosts the single-leaf fast path that
//! sidesteps parsing and diffing entirely for edits confined to one token.

use indextree::NodeId;

use crate::changelog::TreeListener;
use crate::language::{LanguageSpec, Parser};
use crate::tracing_macros::{debug, trace};
use crate::tree::SyntaxTree;

/// A text edit: bytes `[start, end)` of the old document were replaced by
/// `replacement_len` bytes. The new document text is supplied separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
    /// First byte of the replaced range.
    pub start: usize,
    /// One past the last replaced byte.
    pub end: usize,
    /// Length of the replacement text.
    pub replacement_len: usize,
}

impl TextEdit {
    /// Replace `[start, end)` with `replacement_len` new bytes.
    pub fn replace(start: usize, end: usize, replacement_len: usize) -> Self {
        TextEdit {
            start,
            end,
            replacement_len,
        }
    }

    /// Insert `len` bytes at `at`.
    pub fn insert(at: usize, len: usize) -> Self {
        TextEdit {
            start: at,
            end: at,
            replacement_len: len,
        }
    }

    /// Delete `[start, end)`.
    pub fn delete(start: usize, end: usize) -> Self {
        TextEdit {
            start,
            end,
            replacement_len: 0,
        }
    }

    /// Net change in document length.
    pub fn delta(&self) -> isize {
        self.replacement_len as isize - (self.end - self.start) as isize
    }
}

/// Where a reparse can be contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The subtree at this node can absorb the edit on its own.
    Node(NodeId),
    /// No qualifying ancestor; the whole document must be reparsed.
    WholeFile,
}

/// Find the smallest independently reparseable ancestor around `edit`.
///
/// Walks upward from the lowest common ancestor of the leaves covering the
/// edit's endpoints, skipping ancestors that are not flagged reparseable
/// or whose prospective new text fails [`Parser::is_parsable`]. Meeting a
/// node of a different language than the root (an embedded or template
/// region boundary) forces [`Scope::WholeFile`].
pub fn locate(
    tree: &SyntaxTree,
    spec: &LanguageSpec,
    parser: &dyn Parser,
    new_text: &str,
    edit: &TextEdit,
) -> Scope {
    let (Some(start_leaf), Some(end_leaf)) = (tree.leaf_at(edit.start), tree.leaf_at(edit.end))
    else {
        return Scope::WholeFile;
    };

    let root = tree.root();
    let root_language = spec.info(tree.get(root).kind()).language;
    let mut node = tree.lowest_common_ancestor(start_leaf, end_leaf);

    while node != root {
        let kind = tree.get(node).kind();
        let info = spec.info(kind);

        if info.language != root_language {
            debug!(%kind, "embedded language boundary, forcing whole-file");
            return Scope::WholeFile;
        }

        if info.reparseable {
            let start = tree.start_offset(node);
            let end = start + tree.text_len(node);
            if start <= edit.start && edit.end <= end {
                let new_end = end as isize + edit.delta();
                if new_end >= start as isize && (new_end as usize) <= new_text.len() {
                    let slice = &new_text[start..new_end as usize];
                    if parser.is_parsable(kind, slice) {
                        trace!(%kind, start, end, "found reparse scope");
                        return Scope::Node(node);
                    }
                    debug!(%kind, "candidate scope text not parsable, walking up");
                }
            }
        }

        let Some(parent) = tree.parent(node) else {
            break;
        };
        node = parent;
    }

    Scope::WholeFile
}

/// Try the single-leaf fast path: if the edit is confined to one leaf and
/// the leaf's prospective new text still lexes to a single token of the
/// same kind, swap the text in place — no parse, no diff, no change log.
///
/// Fires one coalesced `after_change` at the substituted leaf and bumps
/// the generation. Returns the leaf on success.
pub(crate) fn try_leaf_substitution(
    tree: &mut SyntaxTree,
    listeners: &mut [&mut dyn TreeListener],
    parser: &dyn Parser,
    spec: &LanguageSpec,
    new_text: &str,
    edit: &TextEdit,
    require_interior_edit: bool,
) -> Option<NodeId> {
    let leaf = tree.leaf_at(edit.start)?;
    let start = tree.start_offset(leaf);
    let end = start + tree.text_len(leaf);

    if !(start <= edit.start && edit.end <= end) {
        return None;
    }
    // The strict policy also rejects edits touching the leaf's boundary,
    // where the new characters could fuse with a neighboring token.
    if require_interior_edit && !(start < edit.start && edit.end < end) {
        return None;
    }

    let new_end = end as isize + edit.delta();
    if new_end <= start as isize || new_end as usize > new_text.len() {
        return None;
    }
    let new_leaf_text = &new_text[start..new_end as usize];

    // Nothing actually changed: succeed without touching the tree, so a
    // no-op edit leaves the generation (and every cache keyed on it) alone.
    if tree.get(leaf).leaf_text() == Some(new_leaf_text) {
        return Some(leaf);
    }

    let kind = tree.get(leaf).kind();
    let language = spec.info(kind).language;
    if parser.lex_single(new_leaf_text, language) != Some(kind) {
        return None;
    }

    debug!(%kind, old = %tree.node_text(leaf), new = new_leaf_text, "leaf substitution");
    tree.set_leaf_text(leaf, new_leaf_text);
    for l in listeners.iter_mut() {
        l.after_change(tree, leaf);
    }
    tree.bump_generation();
    Some(leaf)
}
