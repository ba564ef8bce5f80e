//! Token kinds produced by the LAP lexer.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    LParen,
    RParen,
    Comment,
    Ap,
    C,
    Dc,
    Rdc,
    Sdc,
    Srdc,
    Nil,
    Drives,
    Elements,
    Trigger,
    Goal,
    Hours,
    Minutes,
    Seconds,
    Hz,
    Pm,
    /// The `none` unit keyword (plain milliseconds).
    NoUnit,
    Documentation,
    Predicate,
    NumFloat,
    NumInt,
    Name,
    StringValue,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Comment => "COMMENT",
            TokenKind::Ap => "AP",
            TokenKind::C => "C",
            TokenKind::Dc => "DC",
            TokenKind::Rdc => "RDC",
            TokenKind::Sdc => "SDC",
            TokenKind::Srdc => "SRDC",
            TokenKind::Nil => "NIL",
            TokenKind::Drives => "DRIVES",
            TokenKind::Elements => "ELEMENTS",
            TokenKind::Trigger => "TRIGGER",
            TokenKind::Goal => "GOAL",
            TokenKind::Hours => "HOURS",
            TokenKind::Minutes => "MINUTES",
            TokenKind::Seconds => "SECONDS",
            TokenKind::Hz => "HZ",
            TokenKind::Pm => "PM",
            TokenKind::NoUnit => "NONE",
            TokenKind::Documentation => "DOCUMENTATION",
            TokenKind::Predicate => "PREDICATE",
            TokenKind::NumFloat => "NUMFLOAT",
            TokenKind::NumInt => "NUMINT",
            TokenKind::Name => "NAME",
            TokenKind::StringValue => "STRINGVALUE",
        }
    }

    pub fn is_drive_collection(self) -> bool {
        matches!(
            self,
            TokenKind::Dc | TokenKind::Rdc | TokenKind::Sdc | TokenKind::Srdc
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lexed token. `line` is the 1-based line on which the token ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}
