//! Ruby lexer
//!
//! Token kinds follow the naming of Ruby's own Ripper lexer (`sp`, `nl`,
//! `ignored_nl`, `tstring_content`, ...) so the ignored set reads the same
//! as it would against Ripper output. The lexer never rejects input: an
//! unterminated literal runs to the end of the file and an unknown character
//! becomes a one-character `op` token. Apart from the data section after
//! `__END__`, the token texts concatenate back to the source.

use super::{Token, TokenizeError, Tokenizer};

/// Ruby token kinds without semantic weight
pub const IGNORED: &[&str] = &[
    "comment",
    "ignored_nl",
    "sp",
    "embdoc",
    "embdoc_beg",
    "embdoc_end",
];

const KEYWORDS: &[&str] = &[
    "BEGIN", "END", "__ENCODING__", "__FILE__", "__LINE__", "alias", "and", "begin", "break",
    "case", "class", "def", "defined?", "do", "else", "elsif", "end", "ensure", "false", "for",
    "if", "in", "module", "next", "nil", "not", "or", "redo", "rescue", "retry", "return", "self",
    "super", "then", "true", "undef", "unless", "until", "when", "while", "yield",
];

/// Keywords that complete a value, so no expression starts right after them
const VALUE_KEYWORDS: &[&str] = &[
    "end", "self", "nil", "true", "false", "__FILE__", "__LINE__", "__ENCODING__", "redo", "retry",
];

/// Keywords that take an optional argument; a newline right after them
/// still ends the statement
const MID_KEYWORDS: &[&str] = &["break", "next", "return", "super", "yield"];

/// Longest first
const OPERATORS: &[&str] = &[
    "**=", "<=>", "===", "...", "<<=", ">>=", "&&=", "||=", "**", "==", "!=", ">=", "<=", "&&",
    "||", "<<", ">>", "=~", "!~", "..", "+=", "-=", "*=", "/=", "%=", "|=", "&=", "^=", "=>",
    "+", "-", "*", "/", "%", "=", "<", ">", "!", "&", "|", "^", "~", "?", ":",
];

/// Error-tolerant lexer for Ruby source
#[derive(Debug, Default, Clone, Copy)]
pub struct RubyLexer;

impl RubyLexer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for RubyLexer {
    fn tokenize<'a>(&mut self, source: &'a str) -> Result<Vec<Token<'a>>, TokenizeError> {
        Scanner::new(source).run()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralKind {
    String,
    Regexp,
    Words,
}

#[derive(Debug, Clone, Copy)]
struct Literal {
    kind: LiteralKind,
    open: Option<char>,
    close: char,
    depth: usize,
    interpolate: bool,
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    /// Code, either top level or inside `#{}`; counts unmatched `{`
    Code { braces: usize },
    Literal(Literal),
}

#[derive(Debug)]
struct Heredoc {
    id: String,
    /// `<<-` and `<<~` allow an indented terminator
    indented: bool,
}

enum Flow {
    Continue,
    Stop,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token<'a>>,
    frames: Vec<Frame>,
    heredocs: Vec<Heredoc>,
    /// Position bookkeeping for emitted tokens
    line: usize,
    line_start: usize,
    scanned: usize,
    /// An expression may begin at the current position
    beg: bool,
    /// A significant token appeared since the last newline
    line_has_code: bool,
    /// The previous token was `.`, `&.` or `::`
    after_dot: bool,
    /// The previous token was one of `MID_KEYWORDS`
    mid: bool,
    /// Open `(`, `[`, `{` and `#{`
    nesting: usize,
    /// Nesting level of each `?` still waiting for its `:`
    ternaries: Vec<usize>,
    prev: Option<&'static str>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            frames: vec![Frame::Code { braces: 0 }],
            heredocs: Vec::new(),
            line: 1,
            line_start: 0,
            scanned: 0,
            beg: true,
            line_has_code: false,
            after_dot: false,
            mid: false,
            nesting: 0,
            ternaries: Vec::new(),
            prev: None,
        }
    }

    fn run(mut self) -> Result<Vec<Token<'a>>, TokenizeError> {
        while self.pos < self.src.len() {
            let before = self.pos;
            let flow = match self.frames.last() {
                Some(Frame::Literal(lit)) => {
                    let lit = *lit;
                    self.literal(lit);
                    Flow::Continue
                }
                _ => self.code(),
            };
            if let Flow::Stop = flow {
                break;
            }
            if self.pos == before {
                return Err(TokenizeError::Stalled { offset: before });
            }
        }
        Ok(self.tokens)
    }

    fn rest(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, f: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Consume through the next newline, or to the end of input
    fn skip_line(&mut self) {
        match self.rest().find('\n') {
            Some(i) => self.pos += i + 1,
            None => self.pos = self.src.len(),
        }
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src.as_bytes()[self.pos - 1] == b'\n'
    }

    fn spaced(&self) -> bool {
        self.pos > 0 && matches!(self.src.as_bytes()[self.pos - 1], b' ' | b'\t')
    }

    /// Whether an operand rather than a binary operator is expected for a
    /// token of `width` bytes starting here. Besides the plain "expression
    /// start" state this covers command arguments such as `puts /x/`.
    fn value_expected(&self, width: usize) -> bool {
        if self.beg {
            return true;
        }
        let glued = self.rest()[width.min(self.rest().len())..]
            .chars()
            .next()
            .is_some_and(|c| !c.is_whitespace());
        self.prev == Some("ident") && self.spaced() && glued
    }

    fn emit(&mut self, kind: &'static str, start: usize) {
        if start == self.pos {
            return;
        }
        for (i, b) in self.src.as_bytes()[self.scanned..start].iter().enumerate() {
            if *b == b'\n' {
                self.line += 1;
                self.line_start = self.scanned + i + 1;
            }
        }
        self.scanned = start;

        let src: &'a str = self.src;
        self.tokens.push(Token {
            kind,
            text: &src[start..self.pos],
            line: self.line,
            column: start - self.line_start,
        });
    }

    /// Emit a significant token and update the expression state
    fn significant(&mut self, kind: &'static str, start: usize, beg: bool) {
        self.emit(kind, start);
        self.beg = beg;
        self.line_has_code = true;
        self.after_dot = false;
        self.mid = false;
        self.prev = Some(kind);
    }

    fn close_group(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
        while self.ternaries.last().is_some_and(|&level| level > self.nesting) {
            self.ternaries.pop();
        }
    }

    /// A `?` at the current nesting level has not met its `:` yet
    fn in_ternary(&self) -> bool {
        self.ternaries.last() == Some(&self.nesting)
    }

    fn punct(&mut self, kind: &'static str, beg: bool) {
        let start = self.pos;
        self.pos += 1;
        self.significant(kind, start, beg);
    }

    fn code(&mut self) -> Flow {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Flow::Stop;
        };

        if self.at_line_start() {
            if keyword_line(self.rest(), "=begin") {
                self.embdoc();
                return Flow::Continue;
            }
            let rest = self.rest();
            if rest == "__END__" || rest.starts_with("__END__\n") || rest.starts_with("__END__\r\n") {
                self.skip_line();
                self.emit("__end__", start);
                return Flow::Stop;
            }
        }

        match c {
            '\n' => {
                self.pos += 1;
                self.newline(start);
            }
            '\r' if self.peek_nth(1) == Some('\n') => {
                self.pos += 2;
                self.newline(start);
            }
            ' ' | '\t' | '\r' | '\x0b' | '\x0c' => {
                self.eat_while(|c| matches!(c, ' ' | '\t' | '\x0b' | '\x0c') || c == '\r');
                // A lone trailing '\r' before '\n' belongs to the newline
                if self.src.as_bytes()[self.pos - 1] == b'\r' && self.peek() == Some('\n') {
                    self.pos -= 1;
                }
                self.emit("sp", start);
            }
            '\\' if matches!(self.peek_nth(1), Some('\n')) => {
                self.pos += 2;
                self.emit("sp", start);
            }
            '\\' if self.rest().starts_with("\\\r\n") => {
                self.pos += 3;
                self.emit("sp", start);
            }
            '#' => {
                self.eat_while(|c| c != '\n');
                if self.src.as_bytes()[self.pos - 1] == b'\r' && self.peek() == Some('\n') {
                    self.pos -= 1;
                }
                self.emit("comment", start);
            }
            c if is_ident_start(c) => self.identifier(start),
            c if c.is_ascii_digit() => self.number(start),
            '@' | '$' => self.variable(start),
            '"' => self.open_literal(start, 1, "tstring_beg", LiteralKind::String, '"', true),
            '\'' => self.open_literal(start, 1, "tstring_beg", LiteralKind::String, '\'', false),
            '`' => self.open_literal(start, 1, "backtick", LiteralKind::String, '`', true),
            '(' => {
                self.nesting += 1;
                self.punct("lparen", true);
            }
            ')' => {
                self.close_group();
                self.punct("rparen", false);
            }
            '[' => {
                self.nesting += 1;
                self.punct("lbracket", true);
            }
            ']' => {
                self.close_group();
                self.punct("rbracket", false);
            }
            ',' => self.punct("comma", true),
            ';' => self.punct("semicolon", true),
            '{' => {
                if let Some(Frame::Code { braces }) = self.frames.last_mut() {
                    *braces += 1;
                }
                self.nesting += 1;
                self.pos += 1;
                self.significant("lbrace", start, true);
            }
            '}' => self.close_brace(start),
            '.' if self.peek_nth(1) != Some('.') => {
                self.pos += 1;
                self.significant("period", start, true);
                self.after_dot = true;
            }
            '&' if self.peek_nth(1) == Some('.') => {
                self.pos += 2;
                self.significant("op", start, true);
                self.after_dot = true;
            }
            ':' => self.colon(start),
            '?' if self.char_literal_ahead() => {
                self.pos += 1;
                if self.bump() == Some('\\') {
                    self.bump();
                }
                self.significant("CHAR", start, false);
            }
            '/' if self.value_expected(1) && (self.beg || self.peek_nth(1) != Some('=')) => {
                self.open_literal(start, 1, "regexp_beg", LiteralKind::Regexp, '/', true)
            }
            '%' if self.value_expected(1) => {
                if !self.percent_literal(start) {
                    self.operator(start);
                }
            }
            '<' if self.rest().starts_with("<<") && self.value_expected(2) => {
                if !self.heredoc_start(start) {
                    self.operator(start);
                }
            }
            '-' | '+'
                if self.value_expected(1)
                    && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) =>
            {
                self.pos += 1;
                self.number(start);
            }
            '-' if self.peek_nth(1) == Some('>') => {
                self.pos += 2;
                self.significant("tlambda", start, true);
            }
            _ => self.operator(start),
        }
        Flow::Continue
    }

    fn newline(&mut self, start: usize) {
        let significant =
            self.line_has_code && (!self.beg || self.mid) && !self.continues_on_next_line();
        self.mid = false;
        if significant {
            self.emit("nl", start);
            self.beg = true;
        } else {
            self.emit("ignored_nl", start);
        }
        self.line_has_code = false;

        if !self.heredocs.is_empty() {
            self.heredoc_bodies();
        }
    }

    /// A leading `.foo` / `&.foo` on the next code line continues the
    /// expression across the newline. Comment lines may sit in between.
    fn continues_on_next_line(&self) -> bool {
        if !self.heredocs.is_empty() {
            return false;
        }
        for line in self.rest().split('\n') {
            let trimmed = line.trim_start_matches(|c: char| c == ' ' || c == '\t');
            if trimmed.trim_end_matches('\r').is_empty() {
                return false;
            }
            if trimmed.starts_with('#') {
                continue;
            }
            return (trimmed.starts_with('.') && !trimmed.starts_with(".."))
                || trimmed.starts_with("&.");
        }
        false
    }

    fn embdoc(&mut self) {
        let start = self.pos;
        self.skip_line();
        self.emit("embdoc_beg", start);

        while self.pos < self.src.len() {
            let start = self.pos;
            let is_end = keyword_line(self.rest(), "=end");
            self.skip_line();
            if is_end {
                self.emit("embdoc_end", start);
                break;
            }
            self.emit("embdoc", start);
        }
    }

    fn identifier(&mut self, start: usize) {
        self.eat_while(is_ident_char);
        if matches!(self.peek(), Some('?' | '!')) && self.peek_nth(1) != Some('=') {
            self.pos += 1;
        }

        // `key:` in hashes and keyword arguments, but not `c ? a:b`
        if !self.after_dot
            && !self.in_ternary()
            && self.peek() == Some(':')
            && self.peek_nth(1) != Some(':')
        {
            self.pos += 1;
            self.significant("label", start, true);
            return;
        }

        let text = &self.src[start..self.pos];
        let (kind, beg) = if !self.after_dot && KEYWORDS.contains(&text) {
            ("kw", !VALUE_KEYWORDS.contains(&text))
        } else if text.starts_with(|c: char| c.is_uppercase()) {
            ("const", false)
        } else {
            ("ident", false)
        };
        let mid = kind == "kw" && MID_KEYWORDS.contains(&text);
        self.significant(kind, start, beg);
        self.mid = mid;
    }

    fn number(&mut self, start: usize) {
        let mut kind = "int";
        if self.peek() == Some('0')
            && matches!(
                self.peek_nth(1),
                Some('x' | 'X' | 'b' | 'B' | 'o' | 'O' | 'd' | 'D')
            )
        {
            self.pos += 2;
            self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
        } else {
            self.eat_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
                self.eat_while(|c| c.is_ascii_digit() || c == '_');
                kind = "float";
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let digit_at = if matches!(self.peek_nth(1), Some('+' | '-')) { 2 } else { 1 };
                if self.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += digit_at;
                    self.eat_while(|c| c.is_ascii_digit() || c == '_');
                    kind = "float";
                }
            }
        }

        let suffix = |s: &Self, ch: char| {
            s.peek() == Some(ch) && !s.peek_nth(1).is_some_and(is_ident_char)
        };
        if suffix(self, 'r') {
            self.pos += 1;
            kind = "rational";
        }
        if suffix(self, 'i') {
            self.pos += 1;
            kind = "imaginary";
        }
        self.significant(kind, start, false);
    }

    /// `@ivar`, `@@cvar`, `$gvar`, `$1`, `$~`, `$-w`
    fn variable(&mut self, start: usize) {
        let sigil = self.bump();
        let kind = match sigil {
            Some('@') => {
                let kind = if self.peek() == Some('@') && self.peek_nth(1).is_some_and(is_ident_start) {
                    self.pos += 1;
                    "cvar"
                } else {
                    "ivar"
                };
                if !self.peek().is_some_and(is_ident_start) {
                    self.pos = start + 1;
                    self.significant("op", start, true);
                    return;
                }
                self.eat_while(is_ident_char);
                kind
            }
            _ => match self.peek() {
                Some(c) if is_ident_start(c) => {
                    self.eat_while(is_ident_char);
                    "gvar"
                }
                Some(c) if c.is_ascii_digit() => {
                    self.eat_while(|c| c.is_ascii_digit());
                    "backref"
                }
                Some('&' | '`' | '\'' | '+') => {
                    self.pos += 1;
                    "backref"
                }
                Some('-') if self.peek_nth(1).is_some_and(is_ident_char) => {
                    self.pos += 1;
                    self.bump();
                    "gvar"
                }
                Some(c) if "~*$?!@/\\;,.=:<>\"0".contains(c) => {
                    self.pos += 1;
                    "gvar"
                }
                _ => "gvar",
            },
        };
        self.significant(kind, start, false);
    }

    fn open_literal(
        &mut self,
        start: usize,
        width: usize,
        kind: &'static str,
        literal: LiteralKind,
        delimiter: char,
        interpolate: bool,
    ) {
        self.pos = start + width;
        let (open, close) = match delimiter {
            '(' => (Some('('), ')'),
            '[' => (Some('['), ']'),
            '{' => (Some('{'), '}'),
            '<' => (Some('<'), '>'),
            d => (None, d),
        };
        self.significant(kind, start, false);
        self.frames.push(Frame::Literal(Literal {
            kind: literal,
            open,
            close,
            depth: 0,
            interpolate,
        }));
    }

    /// One step inside a string-like literal
    fn literal(&mut self, lit: Literal) {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return;
        };

        if c == lit.close && lit.depth == 0 {
            self.pos += c.len_utf8();
            let kind = if lit.kind == LiteralKind::Regexp {
                self.eat_while(|c| c.is_ascii_alphabetic());
                "regexp_end"
            } else {
                "tstring_end"
            };
            self.frames.pop();
            self.significant(kind, start, false);
            return;
        }

        if lit.kind == LiteralKind::Words && c.is_whitespace() {
            self.eat_while(char::is_whitespace);
            self.emit("words_sep", start);
            return;
        }

        if lit.interpolate && c == '#' {
            match self.peek_nth(1) {
                Some('{') => {
                    self.pos += 2;
                    self.emit("embexpr_beg", start);
                    self.frames.push(Frame::Code { braces: 0 });
                    self.nesting += 1;
                    self.beg = true;
                    return;
                }
                Some('@' | '$') if self.embedded_variable_ahead() => {
                    self.pos += 1;
                    self.emit("embvar", start);
                    let var_start = self.pos;
                    self.variable(var_start);
                    return;
                }
                _ => {}
            }
        }

        let mut depth = lit.depth;
        while let Some(ch) = self.peek() {
            match ch {
                '\\' => {
                    self.pos += 1;
                    self.bump();
                }
                ch if ch == lit.close && depth == 0 => break,
                ch if ch == lit.close => {
                    depth -= 1;
                    self.pos += ch.len_utf8();
                }
                ch if Some(ch) == lit.open => {
                    depth += 1;
                    self.pos += ch.len_utf8();
                }
                '#' if lit.interpolate
                    && self.pos != start
                    && matches!(self.peek_nth(1), Some('{' | '@' | '$')) =>
                {
                    break
                }
                ch if lit.kind == LiteralKind::Words && ch.is_whitespace() => break,
                ch => self.pos += ch.len_utf8(),
            }
        }

        if let Some(Frame::Literal(top)) = self.frames.last_mut() {
            top.depth = depth;
        }
        self.emit("tstring_content", start);
    }

    fn embedded_variable_ahead(&self) -> bool {
        match (self.peek_nth(1), self.peek_nth(2), self.peek_nth(3)) {
            (Some('@'), Some('@'), Some(c)) => is_ident_start(c),
            (Some('@'), Some(c), _) => is_ident_start(c),
            (Some('$'), Some(c), _) => is_ident_start(c),
            _ => false,
        }
    }

    fn close_brace(&mut self, start: usize) {
        self.close_group();
        let nested = self.frames.len() > 1;
        match self.frames.last_mut() {
            Some(Frame::Code { braces }) if *braces == 0 && nested => {
                self.pos += 1;
                self.emit("embexpr_end", start);
                self.frames.pop();
            }
            Some(Frame::Code { braces }) => {
                *braces = braces.saturating_sub(1);
                self.pos += 1;
                self.significant("rbrace", start, false);
            }
            _ => {
                self.pos += 1;
                self.significant("rbrace", start, false);
            }
        }
    }

    fn colon(&mut self, start: usize) {
        if self.in_ternary() && !self.beg && self.peek_nth(1) != Some(':') {
            self.ternaries.pop();
            self.pos += 1;
            self.significant("op", start, true);
            return;
        }

        match self.peek_nth(1) {
            Some(':') => {
                self.pos += 2;
                self.significant("op", start, true);
                self.after_dot = true;
            }
            Some(q @ ('"' | '\'')) => {
                self.open_literal(start, 2, "symbeg", LiteralKind::String, q, q == '"');
            }
            Some(c) if is_ident_start(c) || c == '@' || c == '$' => {
                self.pos += 1;
                self.significant("symbeg", start, false);
                let name = self.pos;
                if c == '@' || c == '$' {
                    self.variable(name);
                    return;
                }
                self.eat_while(is_ident_char);
                if matches!(self.peek(), Some('?' | '!'))
                    || self.peek() == Some('=') && !matches!(self.peek_nth(1), Some('=' | '~' | '>'))
                {
                    self.pos += 1;
                }
                let text = &self.src[name..self.pos];
                let kind = if KEYWORDS.contains(&text) {
                    "kw"
                } else if text.starts_with(|c: char| c.is_uppercase()) {
                    "const"
                } else {
                    "ident"
                };
                self.significant(kind, name, false);
            }
            Some(c) if "+-*/%<=>!~^&|[".contains(c) && (self.beg || self.spaced()) => {
                self.pos += 1;
                self.significant("symbeg", start, false);
                let name = self.pos;
                if self.rest().starts_with("[]=") {
                    self.pos += 3;
                } else if self.rest().starts_with("[]") {
                    self.pos += 2;
                } else {
                    self.operator(name);
                    self.beg = false;
                    return;
                }
                self.significant("op", name, false);
            }
            _ => {
                self.pos += 1;
                self.significant("op", start, true);
            }
        }
    }

    fn char_literal_ahead(&self) -> bool {
        if !self.value_expected(1) {
            return false;
        }
        match (self.peek_nth(1), self.peek_nth(2)) {
            (Some('\\'), Some(_)) => true,
            (Some(c), next) => !c.is_whitespace() && !next.is_some_and(is_ident_char),
            _ => false,
        }
    }

    /// `%w[...]`, `%q(...)`, `%r{...}`, `%(...)`. Returns false when the
    /// `%` does not open a literal, leaving the position untouched.
    fn percent_literal(&mut self, start: usize) -> bool {
        let (letter, delimiter) = match (self.peek_nth(1), self.peek_nth(2)) {
            (Some(l), Some(d)) if l.is_ascii_alphabetic() => (Some(l), d),
            (Some(d), _) => (None, d),
            _ => return false,
        };
        if delimiter.is_alphanumeric() || delimiter.is_whitespace() {
            return false;
        }
        if delimiter == '=' && !self.beg {
            return false;
        }

        let width = if letter.is_some() { 3 } else { 2 };
        let width = width - 1 + delimiter.len_utf8();
        let (kind, literal, interpolate) = match letter {
            None | Some('Q') => ("tstring_beg", LiteralKind::String, true),
            Some('q') => ("tstring_beg", LiteralKind::String, false),
            Some('w') => ("qwords_beg", LiteralKind::Words, false),
            Some('W') => ("words_beg", LiteralKind::Words, true),
            Some('i') => ("qsymbols_beg", LiteralKind::Words, false),
            Some('I') => ("symbols_beg", LiteralKind::Words, true),
            Some('s') => ("symbeg", LiteralKind::String, false),
            Some('r') => ("regexp_beg", LiteralKind::Regexp, true),
            Some('x') => ("backtick", LiteralKind::String, true),
            Some(_) => return false,
        };
        self.open_literal(start, width, kind, literal, delimiter, interpolate);
        true
    }

    /// `<<ID`, `<<-ID`, `<<~ID`, `<<"ID"`, `<<'ID'`. The body is read once
    /// the current line ends.
    fn heredoc_start(&mut self, start: usize) -> bool {
        let mut at = self.pos + 2;
        let bytes = self.src.as_bytes();
        let indented = matches!(bytes.get(at), Some(b'-' | b'~'));
        if indented {
            at += 1;
        }

        let rest = &self.src[at..];
        let (id, end) = match rest.chars().next() {
            Some(q @ ('"' | '\'' | '`')) => {
                let line = &rest[1..rest.find('\n').unwrap_or(rest.len())];
                match line.find(q) {
                    Some(close) if close > 0 => (&line[..close], at + 1 + close + 1),
                    _ => return false,
                }
            }
            Some(c) if is_ident_start(c) => {
                let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
                (&rest[..len], at + len)
            }
            _ => return false,
        };

        self.heredocs.push(Heredoc {
            id: id.to_string(),
            indented,
        });
        self.pos = end;
        self.significant("heredoc_beg", start, false);
        true
    }

    fn heredoc_bodies(&mut self) {
        let pending = std::mem::take(&mut self.heredocs);
        for doc in pending {
            let body = self.pos;
            loop {
                if self.pos >= self.src.len() {
                    self.emit("tstring_content", body);
                    break;
                }
                let line_end = self.rest().find('\n').unwrap_or(self.rest().len());
                let line = self.rest()[..line_end].trim_end_matches('\r');
                let candidate = if doc.indented {
                    line.trim_start_matches(|c: char| c == ' ' || c == '\t')
                } else {
                    line
                };
                if candidate == doc.id {
                    self.emit("tstring_content", body);
                    let terminator = self.pos;
                    self.skip_line();
                    self.emit("heredoc_end", terminator);
                    break;
                }
                self.skip_line();
            }
        }
    }

    fn operator(&mut self, start: usize) {
        let width = OPERATORS
            .iter()
            .find(|op| self.rest().starts_with(**op))
            .map(|op| op.len())
            .unwrap_or_else(|| self.peek().map_or(1, char::len_utf8));
        self.pos += width;
        if &self.src[start..self.pos] == "?" {
            self.ternaries.push(self.nesting);
        }
        self.significant("op", start, true);
    }
}

/// `rest` starts with `word` followed by whitespace or end of input
fn keyword_line(rest: &str, word: &str) -> bool {
    rest.starts_with(word)
        && rest[word.len()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace)
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic() || (!c.is_ascii() && !c.is_whitespace())
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric() || (!c.is_ascii() && !c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<(&'static str, String)> {
        RubyLexer::new()
            .tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    fn kinds(source: &str) -> Vec<&'static str> {
        lex(source).into_iter().map(|(k, _)| k).collect()
    }

    fn pairs(expected: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
        expected.iter().map(|(k, t)| (*k, t.to_string())).collect()
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            lex("x = 1"),
            pairs(&[("ident", "x"), ("sp", " "), ("op", "="), ("sp", " "), ("int", "1")])
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        assert_eq!(
            lex("a # c\n\nb\n"),
            pairs(&[
                ("ident", "a"),
                ("sp", " "),
                ("comment", "# c"),
                ("nl", "\n"),
                ("ignored_nl", "\n"),
                ("ident", "b"),
                ("nl", "\n"),
            ])
        );
    }

    #[test]
    fn test_embedded_documentation() {
        assert_eq!(
            lex("=begin\ndoc\n=end\nx\n"),
            pairs(&[
                ("embdoc_beg", "=begin\n"),
                ("embdoc", "doc\n"),
                ("embdoc_end", "=end\n"),
                ("ident", "x"),
                ("nl", "\n"),
            ])
        );
    }

    #[test]
    fn test_string_interpolation() {
        assert_eq!(
            lex("\"a#{b}c\""),
            pairs(&[
                ("tstring_beg", "\""),
                ("tstring_content", "a"),
                ("embexpr_beg", "#{"),
                ("ident", "b"),
                ("embexpr_end", "}"),
                ("tstring_content", "c"),
                ("tstring_end", "\""),
            ])
        );
    }

    #[test]
    fn test_heredoc_body_follows_line() {
        assert_eq!(
            lex("x = <<~EOS\n  hi\nEOS\ny\n"),
            pairs(&[
                ("ident", "x"),
                ("sp", " "),
                ("op", "="),
                ("sp", " "),
                ("heredoc_beg", "<<~EOS"),
                ("nl", "\n"),
                ("tstring_content", "  hi\n"),
                ("heredoc_end", "EOS\n"),
                ("ident", "y"),
                ("nl", "\n"),
            ])
        );
    }

    #[test]
    fn test_newline_after_operator_is_ignored() {
        assert_eq!(
            kinds("a +\n  b\n"),
            vec!["ident", "sp", "op", "ignored_nl", "sp", "ident", "nl"]
        );
    }

    #[test]
    fn test_leading_dot_continues_expression() {
        assert_eq!(
            kinds("a\n  .b\n"),
            vec!["ident", "ignored_nl", "sp", "period", "ident", "nl"]
        );
    }

    #[test]
    fn test_regexp_versus_division() {
        assert_eq!(
            kinds("a = b / c"),
            vec!["ident", "sp", "op", "sp", "ident", "sp", "op", "sp", "ident"]
        );
        assert_eq!(
            lex("x = /ab/i")[4..].to_vec(),
            pairs(&[
                ("regexp_beg", "/"),
                ("tstring_content", "ab"),
                ("regexp_end", "/i"),
            ])
        );
    }

    #[test]
    fn test_percent_words() {
        assert_eq!(
            lex("%w[a b]"),
            pairs(&[
                ("qwords_beg", "%w["),
                ("tstring_content", "a"),
                ("words_sep", " "),
                ("tstring_content", "b"),
                ("tstring_end", "]"),
            ])
        );
    }

    #[test]
    fn test_nested_percent_delimiters() {
        assert_eq!(
            lex("%q(a (b) c)"),
            pairs(&[
                ("tstring_beg", "%q("),
                ("tstring_content", "a (b) c"),
                ("tstring_end", ")"),
            ])
        );
    }

    #[test]
    fn test_data_section_is_not_tokenized() {
        assert_eq!(
            lex("x\n__END__\ndata\n"),
            pairs(&[("ident", "x"), ("nl", "\n"), ("__end__", "__END__\n")])
        );
    }

    #[test]
    fn test_keywords_and_method_names() {
        assert_eq!(
            kinds("if x then end"),
            vec!["kw", "sp", "ident", "sp", "kw", "sp", "kw"]
        );
        assert_eq!(kinds("foo.class"), vec!["ident", "period", "ident"]);
        assert_eq!(kinds("Foo::Bar"), vec!["const", "op", "const"]);
    }

    #[test]
    fn test_labels_symbols_and_variables() {
        assert_eq!(
            kinds("{a: :b, @c => $d}"),
            vec![
                "lbrace", "label", "sp", "symbeg", "ident", "comma", "sp", "ivar", "sp", "op",
                "sp", "gvar", "rbrace",
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = RubyLexer::new().tokenize("a\n  bc").unwrap();
        let bc = tokens.iter().find(|t| t.text == "bc").unwrap();
        assert_eq!((bc.line, bc.column), (2, 2));
    }

    #[test]
    fn test_malformed_input_covers_source() {
        let inputs = [
            "\"unterminated #{ x",
            "puts <<EOS\nno terminator",
            "%w",
            "x ? y",
            "$ @ @@ ?",
            "'a\\",
            "=begin\nnever ends",
            "def é(\\) ; end }}}",
            "a = b\r\nc = d\r\n",
            "%r{a{b}c}xi /",
        ];
        for input in inputs {
            let tokens = RubyLexer::new().tokenize(input).unwrap();
            let joined: String = tokens.iter().map(|t| t.text).collect();
            assert_eq!(joined, input);
            assert!(tokens.iter().all(|t| !t.text.is_empty()));
        }
    }

    #[test]
    fn test_newline_after_argument_keyword_ends_statement() {
        assert_eq!(
            kinds("return\nx\n"),
            vec!["kw", "nl", "ident", "nl"]
        );
        assert_eq!(
            kinds("yield # done\nx\n"),
            vec!["kw", "sp", "comment", "nl", "ident", "nl"]
        );
        assert_eq!(kinds("return -1\n"), vec!["kw", "sp", "int", "nl"]);
        assert_eq!(
            kinds("x = 1 +\n  2\n"),
            vec!["ident", "sp", "op", "sp", "int", "sp", "op", "ignored_nl", "sp", "int", "nl"]
        );
    }

    #[test]
    fn test_ternary_colon_is_not_a_label() {
        assert_eq!(
            lex("c ? a:b"),
            pairs(&[
                ("ident", "c"),
                ("sp", " "),
                ("op", "?"),
                ("sp", " "),
                ("ident", "a"),
                ("op", ":"),
                ("ident", "b"),
            ])
        );
        assert_eq!(
            kinds("c ? f(a: 1) : b"),
            vec![
                "ident", "sp", "op", "sp", "ident", "lparen", "label", "sp", "int", "rparen",
                "sp", "op", "sp", "ident",
            ]
        );
        assert_eq!(kinds("{a: 1}"), vec!["lbrace", "label", "sp", "int", "rbrace"]);
    }

    #[test]
    fn test_crlf_newlines() {
        assert_eq!(
            lex("a\r\n"),
            pairs(&[("ident", "a"), ("nl", "\r\n")])
        );
    }
}
