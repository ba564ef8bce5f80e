//! Tokenizer for LAP plan source.
//!
//! Lexing runs in three tiers per position: quoted comments (which need no
//! surrounding separators), single separator characters, and finally the
//! maximal run of non-separator characters, classified by the first pattern
//! in [`WORD_PATTERNS`] that matches the whole run. Reserved words therefore
//! win over generic names. Illegal characters are recorded, logged and
//! skipped so that lexing always terminates.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::LexError;
use crate::lap::token::{Token, TokenKind};

const SEPARATORS: [char; 6] = [' ', '(', ')', '\n', '\r', '\t'];

static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#;][^\n]*").expect("line comment regex"));

static QUOTED_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\A"[^"]*""#).expect("quoted comment regex"));

/// Ordered by priority: the first full match wins.
const WORD_PATTERNS: [(&str, TokenKind); 23] = [
    (r"AP", TokenKind::Ap),
    (r"C", TokenKind::C),
    (r"DC", TokenKind::Dc),
    (r"RDC", TokenKind::Rdc),
    (r"SDC", TokenKind::Sdc),
    (r"SRDC", TokenKind::Srdc),
    (r"nil", TokenKind::Nil),
    (r"(?i)drives", TokenKind::Drives),
    (r"(?i)elements", TokenKind::Elements),
    (r"(?i)trigger", TokenKind::Trigger),
    (r"(?i)goal", TokenKind::Goal),
    (r"(?i)hours", TokenKind::Hours),
    (r"(?i)minutes", TokenKind::Minutes),
    (r"(?i)seconds", TokenKind::Seconds),
    (r"(?i)hz", TokenKind::Hz),
    (r"(?i)pm", TokenKind::Pm),
    (r"(?i)none", TokenKind::NoUnit),
    (r"(?i)documentation", TokenKind::Documentation),
    (r"==|=|!=|<|>|<=|>=", TokenKind::Predicate),
    (r"-?(\d*\.\d+|\d+\.)([eE][+-]?\d+)?", TokenKind::NumFloat),
    (r"-?[0-9]+", TokenKind::NumInt),
    (r"(?i)[a-z][a-z0-9_-]*", TokenKind::Name),
    (r"(?i)'?[a-z][a-z0-9_-]*", TokenKind::StringValue),
];

static WORD_RES: LazyLock<Vec<(Regex, TokenKind)>> = LazyLock::new(|| {
    WORD_PATTERNS
        .iter()
        .map(|(pattern, kind)| {
            let anchored = format!(r"\A(?:{pattern})\z");
            (Regex::new(&anchored).expect("word token regex"), *kind)
        })
        .collect()
});

/// Restartable LAP tokenizer. Iterating yields tokens until input runs out.
#[derive(Debug, Clone)]
pub struct Lexer {
    input: String,
    pos: usize,
    line: usize,
    errors: Vec<LexError>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut lexer = Self {
            input: String::new(),
            pos: 0,
            line: 1,
            errors: Vec::new(),
        };
        lexer.set_input(source);
        lexer
    }

    /// Replace the input and restart from the first line.
    pub fn set_input(&mut self, source: &str) {
        self.input = LINE_COMMENT_RE.replace_all(source, "").into_owned();
        self.pos = 0;
        self.line = 1;
        self.errors.clear();
    }

    /// Current 1-based line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Illegal characters skipped so far.
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    pub fn next_token(&mut self) -> Option<Token> {
        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];

            if let Some(found) = QUOTED_COMMENT_RE.find(rest) {
                let text = found.as_str().to_string();
                return Some(self.emit(TokenKind::Comment, text));
            }

            let ch = rest.chars().next()?;
            if SEPARATORS.contains(&ch) {
                self.pos += ch.len_utf8();
                match ch {
                    '\n' => self.line += 1,
                    '(' => return Some(self.token(TokenKind::LParen, "(")),
                    ')' => return Some(self.token(TokenKind::RParen, ")")),
                    _ => {}
                }
                continue;
            }

            let run_len = rest.find(SEPARATORS).unwrap_or(rest.len());
            let run = &rest[..run_len];
            if let Some(kind) = classify_word(run) {
                let text = run.to_string();
                return Some(self.emit(kind, text));
            }

            self.pos += ch.len_utf8();
            let err = LexError {
                line: self.line,
                ch,
            };
            warn!(line = err.line, ch = %err.ch, "illegal character in plan source");
            self.errors.push(err);
        }
        None
    }

    fn emit(&mut self, kind: TokenKind, text: String) -> Token {
        self.pos += text.len();
        self.line += text.matches('\n').count();
        Token {
            kind,
            text,
            line: self.line,
        }
    }

    fn token(&self, kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_string(),
            line: self.line,
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Classify a separator-free run by the first pattern matching all of it.
pub fn classify_word(run: &str) -> Option<TokenKind> {
    WORD_RES
        .iter()
        .find(|(re, _)| re.is_match(run))
        .map(|(_, kind)| *kind)
}

/// Lex `source` to completion, returning tokens and skipped characters.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer::new(source);
    let tokens: Vec<Token> = lexer.by_ref().collect();
    (tokens, lexer.errors().to_vec())
}
