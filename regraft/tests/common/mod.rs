//! Shared fixture language: a toy curly-brace language.
//!
//! Tokens are whitespace runs, identifier runs (`[A-Za-z0-9_]+`) and
//! single punctuation characters. Structure:
//!
//! - a statement starts at any non-whitespace, non-brace token and runs
//!   through the terminating `;` (or up to a closing brace or the end of
//!   input), swallowing nested brace groups along the way;
//! - `{ ... }` forms a block, the only node kind flagged reparseable;
//! - a text that is exactly one balanced brace group parses to a `BLOCK`
//!   root, anything else to a `FILE` root.

use regraft::{
    LanguageId, LanguageSpec, NodeId, ParseFailure, Parser, SyntaxKind, SyntaxTree, TreeListener,
};

pub const FILE: SyntaxKind = SyntaxKind(0);
pub const BLOCK: SyntaxKind = SyntaxKind(1);
pub const STMT: SyntaxKind = SyntaxKind(2);
pub const IDENT: SyntaxKind = SyntaxKind(3);
pub const WS: SyntaxKind = SyntaxKind(4);
pub const PUNCT: SyntaxKind = SyntaxKind(5);

pub const TOY: LanguageId = LanguageId(0);

pub fn toy_spec() -> LanguageSpec {
    let mut spec = LanguageSpec::new(TOY);
    spec.mark_reparseable(BLOCK);
    spec
}

fn lex(text: &str) -> Vec<(SyntaxKind, &str)> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let kind = if bytes[i].is_ascii_whitespace() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            WS
        } else if bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            IDENT
        } else {
            i += 1;
            PUNCT
        };
        tokens.push((kind, &text[start..i]));
    }
    tokens
}

/// Whether the token stream is exactly one balanced `{ ... }` group.
fn is_single_group(tokens: &[(SyntaxKind, &str)]) -> bool {
    if tokens.len() < 2 || tokens[0] != (PUNCT, "{") || tokens[tokens.len() - 1] != (PUNCT, "}") {
        return false;
    }
    let mut depth = 0isize;
    for (index, token) in tokens.iter().enumerate() {
        match *token {
            (PUNCT, "{") => depth += 1,
            (PUNCT, "}") => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
                if depth == 0 && index != tokens.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

pub struct ToyParser;

impl ToyParser {
    /// Parse items into `parent` starting at token `i`. With
    /// `stop_at_close`, stops at (without consuming) the first unmatched
    /// `}`; otherwise an unmatched `}` is a syntax error. Returns the
    /// index it stopped at.
    fn items(
        tree: &mut SyntaxTree,
        parent: NodeId,
        tokens: &[(SyntaxKind, &str)],
        mut i: usize,
        stop_at_close: bool,
    ) -> Result<usize, ParseFailure> {
        while i < tokens.len() {
            match tokens[i] {
                (WS, text) => {
                    tree.add_leaf(parent, WS, text);
                    i += 1;
                }
                (PUNCT, "{") => i = Self::block(tree, parent, tokens, i)?,
                (PUNCT, "}") => {
                    if stop_at_close {
                        return Ok(i);
                    }
                    return Err(ParseFailure::Syntax("unmatched '}'".into()));
                }
                _ => i = Self::stmt(tree, parent, tokens, i)?,
            }
        }
        if stop_at_close {
            return Err(ParseFailure::Syntax("unclosed '{'".into()));
        }
        Ok(i)
    }

    /// `tokens[i]` is the opening brace.
    fn block(
        tree: &mut SyntaxTree,
        parent: NodeId,
        tokens: &[(SyntaxKind, &str)],
        i: usize,
    ) -> Result<usize, ParseFailure> {
        let block = tree.add_composite(parent, BLOCK);
        tree.add_leaf(block, PUNCT, "{");
        let close = Self::items(tree, block, tokens, i + 1, true)?;
        if close >= tokens.len() {
            return Err(ParseFailure::Syntax("unclosed '{'".into()));
        }
        tree.add_leaf(block, PUNCT, "}");
        Ok(close + 1)
    }

    fn stmt(
        tree: &mut SyntaxTree,
        parent: NodeId,
        tokens: &[(SyntaxKind, &str)],
        mut i: usize,
    ) -> Result<usize, ParseFailure> {
        let stmt = tree.add_composite(parent, STMT);
        while i < tokens.len() {
            match tokens[i] {
                (PUNCT, ";") => {
                    tree.add_leaf(stmt, PUNCT, ";");
                    return Ok(i + 1);
                }
                (PUNCT, "{") => i = Self::block(tree, stmt, tokens, i)?,
                (PUNCT, "}") => return Ok(i),
                (kind, text) => {
                    tree.add_leaf(stmt, kind, text);
                    i += 1;
                }
            }
        }
        Ok(i)
    }
}

impl Parser for ToyParser {
    fn parse(&self, text: &str, _language: LanguageId) -> Result<SyntaxTree, ParseFailure> {
        let tokens = lex(text);
        if is_single_group(&tokens) {
            let mut tree = SyntaxTree::new(BLOCK);
            let root = tree.root();
            tree.add_leaf(root, PUNCT, "{");
            Self::items(&mut tree, root, &tokens[1..tokens.len() - 1], 0, false)?;
            tree.add_leaf(root, PUNCT, "}");
            Ok(tree)
        } else {
            let mut tree = SyntaxTree::new(FILE);
            let root = tree.root();
            Self::items(&mut tree, root, &tokens, 0, false)?;
            Ok(tree)
        }
    }

    fn lex_single(&self, text: &str, _language: LanguageId) -> Option<SyntaxKind> {
        let tokens = lex(text);
        (tokens.len() == 1).then(|| tokens[0].0)
    }

    fn is_parsable(&self, kind: SyntaxKind, text: &str) -> bool {
        kind == BLOCK && is_single_group(&lex(text))
    }
}

/// Lexes like [`ToyParser`] but reports cooperative cancellation for
/// every parse request.
pub struct CancelledParser;

impl Parser for CancelledParser {
    fn parse(&self, _text: &str, _language: LanguageId) -> Result<SyntaxTree, ParseFailure> {
        Err(ParseFailure::Cancelled)
    }

    fn lex_single(&self, text: &str, language: LanguageId) -> Option<SyntaxKind> {
        ToyParser.lex_single(text, language)
    }

    fn is_parsable(&self, kind: SyntaxKind, text: &str) -> bool {
        ToyParser.is_parsable(kind, text)
    }
}

/// [`ToyParser`] with scope qualification disabled, so every structural
/// edit escalates to a whole-file reparse.
pub struct NeverScoped;

impl Parser for NeverScoped {
    fn parse(&self, text: &str, language: LanguageId) -> Result<SyntaxTree, ParseFailure> {
        ToyParser.parse(text, language)
    }

    fn lex_single(&self, text: &str, language: LanguageId) -> Option<SyntaxKind> {
        ToyParser.lex_single(text, language)
    }

    fn is_parsable(&self, _kind: SyntaxKind, _text: &str) -> bool {
        false
    }
}

/// [`ToyParser`] that chokes on any text forming a single brace group, so
/// a block slice never parses while the surrounding document still does.
pub struct RejectsBraceGroups;

impl Parser for RejectsBraceGroups {
    fn parse(&self, text: &str, language: LanguageId) -> Result<SyntaxTree, ParseFailure> {
        if is_single_group(&lex(text)) {
            return Err(ParseFailure::Syntax("brace groups unsupported".into()));
        }
        ToyParser.parse(text, language)
    }

    fn lex_single(&self, text: &str, language: LanguageId) -> Option<SyntaxKind> {
        ToyParser.lex_single(text, language)
    }

    fn is_parsable(&self, kind: SyntaxKind, text: &str) -> bool {
        ToyParser.is_parsable(kind, text)
    }
}

/// [`ToyParser`] that roots every parse at `FILE`, even for a text that is
/// exactly one brace group.
pub struct FileRootsOnly;

impl Parser for FileRootsOnly {
    fn parse(&self, text: &str, _language: LanguageId) -> Result<SyntaxTree, ParseFailure> {
        let tokens = lex(text);
        let mut tree = SyntaxTree::new(FILE);
        let root = tree.root();
        ToyParser::items(&mut tree, root, &tokens, 0, false)?;
        Ok(tree)
    }

    fn lex_single(&self, text: &str, language: LanguageId) -> Option<SyntaxKind> {
        ToyParser.lex_single(text, language)
    }

    fn is_parsable(&self, kind: SyntaxKind, text: &str) -> bool {
        ToyParser.is_parsable(kind, text)
    }
}

/// Records listener events as strings and checks that every node handed
/// to a `before_*` event still resolves against the pre-mutation tree.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<String>,
}

impl TreeListener for Recorder {
    fn before_child_insertion(&mut self, tree: &SyntaxTree, parent: NodeId, child: NodeId) {
        assert!(tree.is_attached(parent), "insertion parent must be live");
        self.events.push(format!("ins {}", tree.node_text(child)));
    }

    fn before_child_removal(&mut self, tree: &SyntaxTree, parent: NodeId, child: NodeId) {
        assert!(tree.is_attached(parent), "removal parent must be live");
        assert!(tree.is_attached(child), "outgoing child must still be live");
        self.events.push(format!("del {}", tree.node_text(child)));
    }

    fn before_child_replacement(
        &mut self,
        tree: &SyntaxTree,
        _parent: NodeId,
        old: NodeId,
        new: NodeId,
    ) {
        assert!(tree.is_attached(old), "outgoing node must still be live");
        self.events.push(format!(
            "rep {} -> {}",
            tree.node_text(old),
            tree.node_text(new)
        ));
    }

    fn after_change(&mut self, tree: &SyntaxTree, subtree_root: NodeId) {
        assert!(tree.is_attached(subtree_root));
        self.events.push(format!("after {}", tree.node_text(subtree_root)));
    }
}

/// Parse `text` as a document with [`ToyParser`].
pub fn parse_doc(text: &str) -> SyntaxTree {
    ToyParser
        .parse(text, TOY)
        .expect("fixture text must parse")
}
