//! Error-tolerant tokenizers
//!
//! Source files handed to codehash come from arbitrary points in project
//! history and frequently do not compile. Every tokenizer here therefore
//! returns a best-effort token sequence for malformed input; an `Err` is
//! reserved for the tokenizer itself being unable to run.

pub mod ruby;
pub mod syntax;

pub use ruby::RubyLexer;
pub use syntax::SyntaxTokenizer;

use crate::error::Error;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// A lexical unit tagged with its position in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Classification tag from the language's token taxonomy
    pub kind: &'static str,
    /// Literal source text covered by the token
    pub text: &'a str,
    /// 1-based line of the first byte
    pub line: usize,
    /// 0-based byte offset within the line
    pub column: usize,
}

/// Failure of a tokenizer to produce any token sequence at all
#[derive(Debug, ThisError)]
pub enum TokenizeError {
    #[error("failed to load {language} grammar: {message}")]
    Grammar { language: Language, message: String },

    #[error("parser produced no syntax tree")]
    NoTree,

    #[error("lexer made no progress at byte {offset}")]
    Stalled { offset: usize },
}

/// Turns source text into a token sequence
pub trait Tokenizer {
    fn tokenize<'a>(&mut self, source: &'a str) -> Result<Vec<Token<'a>>, TokenizeError>;
}

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    Ruby,
    Python,
}

impl Language {
    /// All supported languages
    pub const ALL: [Language; 2] = [Language::Ruby, Language::Python];

    /// Look up a language by its work-list tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.tag() == tag)
    }

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rb" | "rake" | "gemspec" | "ru" => Some(Language::Ruby),
            "py" => Some(Language::Python),
            _ => None,
        }
    }

    /// Tag used for this language in work lists and output records
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Ruby => "RUBY",
            Language::Python => "PYTHON",
        }
    }

    /// Token kinds that do not affect the semantic identity of a file
    pub fn ignored_kinds(&self) -> &'static [&'static str] {
        match self {
            Language::Ruby => ruby::IGNORED,
            Language::Python => &["comment", "line_continuation"],
        }
    }

    /// Create a fresh tokenizer for this language
    pub fn tokenizer(&self) -> Result<Box<dyn Tokenizer>, TokenizeError> {
        match self {
            Language::Ruby => Ok(Box::new(RubyLexer::new())),
            Language::Python => Ok(Box::new(SyntaxTokenizer::new(
                *self,
                tree_sitter_python::LANGUAGE.into(),
                &["string", "comment"],
                &["block"],
                &["module", "block"],
            )?)),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| Error::UnsupportedLanguage(s.to_string()))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
