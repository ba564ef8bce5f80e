//! Property tests for the LAP lexer.
//!
//! The lexer must accept any input without panicking, and re-lexing the
//! text of its own tokens must reproduce them.

use proptest::prelude::*;
use sposh::lap::{Lexer, Token, TokenKind, tokenize};

/// Characters that exercise every token class plus comments and junk.
const PLAN_ALPHABET: &str = "[()a-zA-Z0-9_ '\".=<>!;#$\\-\n\t]{0,120}";

fn kinds_and_text(tokens: &[Token]) -> Vec<(TokenKind, String)> {
    tokens.iter().map(|t| (t.kind, t.text.clone())).collect()
}

proptest! {
    #[test]
    fn lexing_is_total(source in "\\PC{0,200}") {
        let (tokens, _) = tokenize(&source);
        for token in &tokens {
            prop_assert!(!token.text.is_empty());
        }
    }

    #[test]
    fn relexing_token_text_is_stable(source in PLAN_ALPHABET) {
        let (tokens, _) = tokenize(&source);
        let joined = tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ");
        let (again, errors) = tokenize(&joined);
        prop_assert!(errors.is_empty(), "{joined:?} produced {errors:?}");
        prop_assert_eq!(kinds_and_text(&again), kinds_and_text(&tokens));
    }

    #[test]
    fn lines_never_go_backwards(source in PLAN_ALPHABET) {
        let (tokens, errors) = tokenize(&source);
        let max_line = 1 + source.matches('\n').count();
        let mut last = 1;
        for token in &tokens {
            prop_assert!(token.line >= last);
            prop_assert!(token.line <= max_line);
            last = token.line;
        }
        for err in &errors {
            prop_assert!(err.line <= max_line);
        }
    }

    #[test]
    fn set_input_restarts(first in PLAN_ALPHABET, second in PLAN_ALPHABET) {
        let mut lexer = Lexer::new(&first);
        let _ = lexer.next_token();
        lexer.set_input(&second);
        let restarted: Vec<Token> = lexer.by_ref().collect();
        prop_assert_eq!(restarted, tokenize(&second).0);
    }
}

#[test]
fn comments_and_separators_are_skipped() {
    let (tokens, errors) = tokenize("; heading\n(SDC # note\n\t\"quoted\r\ntext\")");
    assert!(errors.is_empty());
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::LParen, TokenKind::Sdc, TokenKind::Comment, TokenKind::RParen]
    );
    assert_eq!(tokens[2].line, 4);
}
