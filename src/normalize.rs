//! Token-level normalization and hashing
//!
//! A file is reduced to the text of its significant tokens, each terminated
//! by a NUL byte, with carriage returns removed. The SHA-1 of that buffer is
//! the file's code hash: two files that differ only in comments, spacing or
//! line endings share it.

use crate::tokenize::{Language, Token, TokenizeError, Tokenizer};
use sha1::{Digest, Sha1};
use std::borrow::Cow;

/// Code hash of an empty token sequence
pub const EMPTY_HASH: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

/// Fingerprint and size of a normalized file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeHash {
    /// Lowercase hex SHA-1 of the normalized buffer
    pub fingerprint: String,
    /// Number of significant tokens
    pub token_count: usize,
}

impl CodeHash {
    /// The result for a file without significant tokens
    pub fn empty() -> Self {
        Self {
            fingerprint: EMPTY_HASH.to_string(),
            token_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }
}

/// Normalizes and hashes source text of one language
pub struct Normalizer {
    language: Language,
    tokenizer: Box<dyn Tokenizer>,
    ignored: &'static [&'static str],
}

impl Normalizer {
    /// Create a normalizer using the language's own tokenizer
    pub fn new(language: Language) -> Result<Self, TokenizeError> {
        Ok(Self::with_tokenizer(language, language.tokenizer()?))
    }

    /// Create a normalizer with a custom tokenizer. The ignored kinds are
    /// still the language's.
    pub fn with_tokenizer(language: Language, tokenizer: Box<dyn Tokenizer>) -> Self {
        Self {
            language,
            tokenizer,
            ignored: language.ignored_kinds(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Hash `content`. A tokenizer failure yields the empty result.
    pub fn normalize(&mut self, content: &str) -> CodeHash {
        self.normalize_as(content, Encoding::Utf8)
    }

    /// Decode raw file content and hash it
    pub fn normalize_bytes(&mut self, content: &[u8]) -> CodeHash {
        let source = decode(content);
        self.normalize_as(&source.text, source.encoding)
    }

    fn normalize_as(&mut self, content: &str, encoding: Encoding) -> CodeHash {
        match self.tokenizer.tokenize(content) {
            Ok(tokens) => hash_encoded(&tokens, self.ignored, encoding),
            Err(e) => {
                tracing::debug!("{} tokenizer failed, treating file as empty: {}", self.language, e);
                CodeHash::empty()
            }
        }
    }
}

/// Hash the tokens whose kind is not in `ignored`
pub fn hash_tokens(tokens: &[Token<'_>], ignored: &[&str]) -> CodeHash {
    hash_encoded(tokens, ignored, Encoding::Utf8)
}

/// Hash the tokens whose kind is not in `ignored`, writing token text back
/// in the file's own encoding
pub fn hash_encoded(tokens: &[Token<'_>], ignored: &[&str], encoding: Encoding) -> CodeHash {
    let mut buffer = Vec::new();
    let mut token_count = 0;

    for token in tokens.iter().filter(|t| !ignored.contains(&t.kind)) {
        encoding.encode_into(token.text, &mut buffer);
        buffer.push(0);
        token_count += 1;
    }

    let mut hasher = Sha1::new();
    hasher.update(&buffer);

    CodeHash {
        fingerprint: hex::encode(hasher.finalize()),
        token_count,
    }
}

/// How decoded text maps back to bytes for hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Text is hashed as UTF-8
    Utf8,
    /// Content was not valid in any recognized encoding. Each byte was
    /// decoded to the char with the same value and is hashed as that byte.
    Bytes,
}

impl Encoding {
    /// Append `text` in this encoding, without carriage returns
    fn encode_into(self, text: &str, buffer: &mut Vec<u8>) {
        match self {
            Encoding::Utf8 => buffer.extend(text.bytes().filter(|&b| b != b'\r')),
            Encoding::Bytes => buffer.extend(
                text.chars()
                    .filter_map(|c| u8::try_from(c).ok())
                    .filter(|&b| b != b'\r'),
            ),
        }
    }
}

/// File content decoded for tokenization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source<'a> {
    pub text: Cow<'a, str>,
    pub encoding: Encoding,
}

/// Decode file content for tokenization.
///
/// Byte order marks select the encoding (the mark itself is dropped);
/// everything else is read as UTF-8. Content that does not decode cleanly
/// is kept byte for byte, so distinct files never decode to the same text.
pub fn decode(bytes: &[u8]) -> Source<'_> {
    let utf16 = match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => return decode_utf8(rest),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        _ => return decode_utf8(bytes),
    };

    match utf16 {
        Some(text) => Source {
            text: Cow::Owned(text),
            encoding: Encoding::Utf8,
        },
        None => decode_bytes(bytes),
    }
}

fn decode_utf8(bytes: &[u8]) -> Source<'_> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Source {
            text: Cow::Borrowed(text),
            encoding: Encoding::Utf8,
        },
        Err(_) => decode_bytes(bytes),
    }
}

fn decode_bytes(bytes: &[u8]) -> Source<'_> {
    Source {
        text: Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
        encoding: Encoding::Bytes,
    }
}

/// `None` for an odd length or unpaired surrogates
fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruby(content: &str) -> CodeHash {
        Normalizer::new(Language::Ruby).unwrap().normalize(content)
    }

    struct Broken;

    impl Tokenizer for Broken {
        fn tokenize<'a>(&mut self, _source: &'a str) -> Result<Vec<Token<'a>>, TokenizeError> {
            Err(TokenizeError::NoTree)
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(ruby(""), CodeHash::empty());
        assert_eq!(ruby("").fingerprint, EMPTY_HASH);
    }

    #[test]
    fn test_comments_only_is_empty() {
        let hash = ruby("# just a comment\n\n=begin\ndocs\n=end\n   \n");
        assert!(hash.is_empty());
        assert_eq!(hash.fingerprint, EMPTY_HASH);
    }

    #[test]
    fn test_simple_assignment() {
        let one = ruby("x = 1");
        let two = ruby("x = 2");

        assert_eq!(one.token_count, 3);
        assert_eq!(one.fingerprint.len(), 40);
        assert_ne!(one.fingerprint, two.fingerprint);
        // "x\0=\0" "1\0"
        let mut hasher = Sha1::new();
        hasher.update(b"x\0=\x001\0");
        assert_eq!(one.fingerprint, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_deterministic() {
        let source = "def greet(name)\n  puts \"hi #{name}\"\nend\n";
        assert_eq!(ruby(source), ruby(source));
    }

    #[test]
    fn test_whitespace_and_comments_do_not_matter() {
        let plain = "def add(a, b)\n  a + b\nend\n";
        let noisy = "# Adds numbers\ndef add( a,b )   # inline\n\n\n    a  +  b\n=begin\nmore docs\n=end\nend\n";
        assert_eq!(ruby(plain), ruby(noisy));
    }

    #[test]
    fn test_line_endings_do_not_matter() {
        let unix = "class Foo\n  def bar\n    :baz\n  end\nend\n";
        let windows = unix.replace('\n', "\r\n");
        assert_eq!(ruby(unix), ruby(&windows));
    }

    #[test]
    fn test_separator_prevents_merging_tokens() {
        let tokens = [
            Token { kind: "ident", text: "ab", line: 1, column: 0 },
            Token { kind: "ident", text: "c", line: 1, column: 3 },
        ];
        let split = [
            Token { kind: "ident", text: "a", line: 1, column: 0 },
            Token { kind: "ident", text: "bc", line: 1, column: 2 },
        ];
        assert_ne!(hash_tokens(&tokens, &[]), hash_tokens(&split, &[]));
    }

    #[test]
    fn test_count_is_taken_before_carriage_returns_are_removed() {
        let tokens = [
            Token { kind: "nl", text: "\r\n", line: 1, column: 0 },
            Token { kind: "tstring_content", text: "\r", line: 2, column: 0 },
        ];
        let hash = hash_tokens(&tokens, &[]);
        assert_eq!(hash.token_count, 2);

        let mut hasher = Sha1::new();
        hasher.update(b"\n\0\0");
        assert_eq!(hash.fingerprint, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_tokenizer_failure_degrades_to_empty() {
        let mut normalizer = Normalizer::with_tokenizer(Language::Ruby, Box::new(Broken));
        assert_eq!(normalizer.normalize("x = 1"), CodeHash::empty());
    }

    #[test]
    fn test_python_comments_do_not_matter() {
        let mut normalizer = Normalizer::new(Language::Python).unwrap();
        let a = normalizer.normalize("x = 1\n");
        let b = normalizer.normalize("# header\n\nx = 1  # trailing\n");
        assert_eq!(a, b);
        assert_eq!(a.token_count, 4);
    }

    #[test]
    fn test_python_statement_ends_matter() {
        let mut normalizer = Normalizer::new(Language::Python).unwrap();
        assert_ne!(normalizer.normalize("a\n-b\n"), normalizer.normalize("a - b\n"));
        assert_ne!(
            normalizer.normalize("return_value = f\n(x)\n"),
            normalizer.normalize("return_value = f(x)\n")
        );
        assert_eq!(
            normalizer.normalize("a = 1\nb = 2\n"),
            normalizer.normalize("a = 1\n\n\nb = 2  # two\n")
        );
    }

    #[test]
    fn test_ruby_statement_ends_matter() {
        assert_ne!(
            ruby("def f\n  return\n  x\nend\n"),
            ruby("def f\n  return x\nend\n")
        );
        assert_ne!(
            ruby("def each\n  yield\n  x\nend\n"),
            ruby("def each\n  yield x\nend\n")
        );
        assert_eq!(ruby("c ? a : b\n"), ruby("c ? a:b\n"));
    }

    #[test]
    fn test_python_indentation_matters() {
        let mut normalizer = Normalizer::new(Language::Python).unwrap();
        let inside = normalizer.normalize("if x:\n    a\n    b\n");
        let after = normalizer.normalize("if x:\n    a\nb\n");
        assert_ne!(inside, after);
    }

    #[test]
    fn test_decode_byte_order_marks() {
        assert_eq!(decode(b"\xEF\xBB\xBFputs 1").text, "puts 1");
        assert_eq!(decode(b"\xFE\xFF\x00a\x00b").text, "ab");
        assert_eq!(decode(b"\xFF\xFEa\x00b\x00").text, "ab");

        let source = decode(b"caf\xC3\xA9");
        assert_eq!(source.text, "café");
        assert_eq!(source.encoding, Encoding::Utf8);
    }

    #[test]
    fn test_decode_keeps_invalid_bytes() {
        let source = decode(b"bad\xFF");
        assert_eq!(source.text, "bad\u{FF}");
        assert_eq!(source.encoding, Encoding::Bytes);

        // Odd length after a UTF-16 mark
        assert_eq!(decode(b"\xFF\xFEa").encoding, Encoding::Bytes);
        // Unpaired surrogate
        assert_eq!(decode(b"\xFE\xFF\xD8\x00").encoding, Encoding::Bytes);
    }

    #[test]
    fn test_non_utf8_bytes_are_hashed_as_is() {
        let mut normalizer = Normalizer::new(Language::Ruby).unwrap();
        let latin1_e = normalizer.normalize_bytes(b"s = \"caf\xE9\"\n");
        let latin1_u = normalizer.normalize_bytes(b"s = \"caf\xFC\"\n");
        let utf8 = normalizer.normalize_bytes("s = \"café\"\n".as_bytes());

        assert_ne!(latin1_e, latin1_u);
        assert_ne!(latin1_e, utf8);
        assert_eq!(latin1_e.token_count, 6);

        let mut hasher = Sha1::new();
        hasher.update(b"s\0=\0\"\0caf\xE9\0\"\0\n\0");
        assert_eq!(latin1_e.fingerprint, hex::encode(hasher.finalize()));
    }
}
