//! Node-type classification and the external parser seam.
//!
//! The engine never interprets node kinds itself: a [`LanguageSpec`] side
//! table says which kinds open an independently reparseable boundary and
//! which language each kind belongs to, and a [`Parser`] turns text slices
//! back into trees. Both are supplied by the embedding language support.

use crate::tree::{SyntaxKind, SyntaxTree};

/// Identity of a language inside a document. Documents hosting embedded or
/// template languages carry more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguageId(pub u16);

/// Classification of one node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    /// Whether a node of this kind can be re-lexed and re-parsed from its
    /// own text in isolation.
    pub reparseable: bool,
    /// The language this kind belongs to.
    pub language: LanguageId,
}

/// Kind-indexed classification table. A plain dense table instead of
/// per-node dynamic dispatch: the diff and scope walks query it in inner
/// loops.
#[derive(Debug, Clone)]
pub struct LanguageSpec {
    default_language: LanguageId,
    kinds: Vec<KindInfo>,
}

impl LanguageSpec {
    /// A table where every kind belongs to `default_language` and nothing
    /// is reparseable.
    pub fn new(default_language: LanguageId) -> Self {
        LanguageSpec {
            default_language,
            kinds: Vec::new(),
        }
    }

    fn entry(&mut self, kind: SyntaxKind) -> &mut KindInfo {
        let index = kind.0 as usize;
        if index >= self.kinds.len() {
            self.kinds.resize(
                index + 1,
                KindInfo {
                    reparseable: false,
                    language: self.default_language,
                },
            );
        }
        &mut self.kinds[index]
    }

    /// Flag `kind` as an independently reparseable boundary.
    pub fn mark_reparseable(&mut self, kind: SyntaxKind) -> &mut Self {
        self.entry(kind).reparseable = true;
        self
    }

    /// Assign `kind` to a language other than the default.
    pub fn set_language(&mut self, kind: SyntaxKind, language: LanguageId) -> &mut Self {
        self.entry(kind).language = language;
        self
    }

    /// Look up a kind. Unregistered kinds fall back to the default
    /// language, not reparseable.
    pub fn info(&self, kind: SyntaxKind) -> KindInfo {
        self.kinds
            .get(kind.0 as usize)
            .copied()
            .unwrap_or(KindInfo {
                reparseable: false,
                language: self.default_language,
            })
    }
}

/// Why a parse produced no tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    /// The text does not parse. For a scoped slice this is survivable (the
    /// orchestrator escalates); for the whole document it is fatal.
    #[error("parse failed: {0}")]
    Syntax(String),
    /// The caller cooperatively cancelled the parse. Never raised once
    /// commit has begun, because commit does not call back into the
    /// parser.
    #[error("parse cancelled")]
    Cancelled,
}

/// External lexer/parser collaborator.
///
/// `parse` may run outside the exclusive write section: it only reads the
/// text snapshot it is given and builds an unshared scratch tree.
pub trait Parser {
    /// Parse `text` as `language`, producing a scratch tree whose root
    /// covers exactly `text`.
    fn parse(&self, text: &str, language: LanguageId) -> Result<SyntaxTree, ParseFailure>;

    /// Lex `text` as `language`; `Some(kind)` iff it forms exactly one
    /// token. Drives the single-leaf fast path.
    fn lex_single(&self, text: &str, language: LanguageId) -> Option<SyntaxKind>;

    /// Whether `text` is acceptable as the complete content of a node of
    /// `kind`. Gates the upward walk of the scope locator; cheaper than a
    /// full parse (typically a bracket-balance or token-shape check).
    fn is_parsable(&self, kind: SyntaxKind, text: &str) -> bool;
}
