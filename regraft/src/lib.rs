//! # Regraft
//!
//! Incremental syntax-tree merging: apply a text edit to a long-lived
//! syntax tree by reparsing as little as possible and grafting only the
//! changed subtrees, so unchanged nodes keep their identity across edits.
//!
//! The pipeline for one edit, in escalation order:
//!
//! 1. **Leaf substitution** ([`reparse`] internally): an edit confined to
//!    one token whose new text still lexes to the same kind is swapped in
//!    place. No parse, no diff.
//! 2. **Scoped reparse**: the scope locator walks up from the edit to the
//!    smallest ancestor flagged reparseable in the [`LanguageSpec`] whose
//!    prospective text passes [`Parser::is_parsable`]; that slice is
//!    reparsed into a scratch tree and diffed against the old subtree with
//!    [`lockstep`].
//! 3. **Whole-file reparse**: everything else, including documents with
//!    embedded foreign-language regions around the edit.
//!
//! Diff output is a change log committed all-or-nothing under the caller's
//! `&mut` access: [`TreeListener`]s observe each structural change before
//! it happens and one coalesced [`TreeListener::after_change`] at the end,
//! then the tree's [`Generation`] advances exactly once.
//!
//! The engine is language-agnostic. Language support supplies a
//! [`Parser`], a [`LanguageSpec`] classifying node kinds, and whatever
//! [`SyntaxKind`] vocabulary it likes; regraft never interprets kinds.

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

mod tracing_macros;

mod changelog;
mod language;
mod reparse;
mod scope;
mod tree;

pub use changelog::{
    ChangeLog, CommitError, CommitOutcome, ImmediateBuilder, LogEntry, TreeListener,
};
pub use language::{KindInfo, LanguageId, LanguageSpec, ParseFailure, Parser};
pub use reparse::{ReparseError, ReparseOptions, ReparseOutcome, Strategy, reparse};
pub use scope::{Scope, TextEdit, locate};
pub use tree::{Generation, NodeData, NodeRef, SyntaxCompare, SyntaxKind, SyntaxTree};

pub use indextree::NodeId;
pub use lockstep::{Anchor, DiffAborted, DiffLimits};
