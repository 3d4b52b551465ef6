//! Tokenization through tree-sitter grammars
//!
//! tree-sitter recovers from syntax errors, so a tree comes back for any
//! input. The token stream is the sequence of leaf nodes in source order.
//! Grammars hide layout tokens, so block structure and statement ends are
//! put back as zero-width `indent`, `dedent` and `newline` markers.

use super::{Language, Token, TokenizeError, Tokenizer};
use tree_sitter::{Node, Parser, Point};

/// Emits the leaves of a tree-sitter parse tree as tokens
pub struct SyntaxTokenizer {
    parser: Parser,
    /// Node kinds emitted whole instead of descending into their children
    atomic: &'static [&'static str],
    /// Node kinds bracketed by zero-width `indent`/`dedent` markers
    scopes: &'static [&'static str],
    /// Node kinds whose statements each end with a `newline` marker
    statement_lists: &'static [&'static str],
}

impl SyntaxTokenizer {
    /// Create a tokenizer for the given grammar
    pub fn new(
        language: Language,
        grammar: tree_sitter::Language,
        atomic: &'static [&'static str],
        scopes: &'static [&'static str],
        statement_lists: &'static [&'static str],
    ) -> Result<Self, TokenizeError> {
        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| TokenizeError::Grammar {
                language,
                message: e.to_string(),
            })?;

        Ok(Self {
            parser,
            atomic,
            scopes,
            statement_lists,
        })
    }

    fn collect<'a>(&self, node: Node, source: &'a str, tokens: &mut Vec<Token<'a>>) {
        // Zero-width nodes inserted by error recovery
        if node.is_missing() {
            return;
        }

        let kind = node.kind();
        if node.child_count() == 0 || self.atomic.contains(&kind) {
            if let Some(text) = source.get(node.byte_range()) {
                if !text.is_empty() {
                    tokens.push(token(kind, text, node.start_position()));
                }
            }
            return;
        }

        let scoped = self.scopes.contains(&kind);
        if scoped {
            tokens.push(token("indent", "", node.start_position()));
        }

        let statements = self.statement_lists.contains(&kind);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect(child, source, tokens);
            // Comments are extras; punctuation such as `;` is unnamed
            if statements && child.is_named() && !child.is_extra() {
                tokens.push(token("newline", "", child.end_position()));
            }
        }

        if scoped {
            tokens.push(token("dedent", "", node.end_position()));
        }
    }
}

fn token<'a>(kind: &'static str, text: &'a str, at: Point) -> Token<'a> {
    Token {
        kind,
        text,
        line: at.row + 1,
        column: at.column,
    }
}

impl Tokenizer for SyntaxTokenizer {
    fn tokenize<'a>(&mut self, source: &'a str) -> Result<Vec<Token<'a>>, TokenizeError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or(TokenizeError::NoTree)?;

        let mut tokens = Vec::new();
        self.collect(tree.root_node(), source, &mut tokens);
        Ok(tokens)
    }
}
