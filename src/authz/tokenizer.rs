use crate::authz::check::Check;
use crate::authz::parser::parse_check;
use crate::authz::resolve::unquote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Check,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Pre-parsed leaf, set only for `TokenKind::Check`.
    pub check: Option<Check>,
}

impl Token {
    fn punct(kind: TokenKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            check: None,
        }
    }
}

/// Split a rule string into tokens. Parentheses glued to a word are
/// detached first, so `(role:a` yields `(` then a check.
pub fn tokenize(rule: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    for chunk in rule.split_whitespace() {
        let clean = chunk.trim_start_matches('(');
        for _ in 0..(chunk.len() - clean.len()) {
            tokens.push(Token::punct(TokenKind::LParen, "("));
        }
        if clean.is_empty() {
            continue;
        }

        let word = clean.trim_end_matches(')');
        let trailing = clean.len() - word.len();

        if !word.is_empty() {
            let keyword = match word.to_ascii_lowercase().as_str() {
                "and" => Some(TokenKind::And),
                "or" => Some(TokenKind::Or),
                "not" => Some(TokenKind::Not),
                _ => None,
            };
            let token = if let Some(kind) = keyword {
                Token::punct(kind, word)
            } else if let Some(inner) = unquote(word) {
                Token::punct(TokenKind::String, inner)
            } else {
                Token {
                    kind: TokenKind::Check,
                    text: word.to_string(),
                    check: Some(parse_check(word)),
                }
            };
            tokens.push(token);
        }

        for _ in 0..trailing {
            tokens.push(Token::punct(TokenKind::RParen, ")"));
        }
    }

    tokens
}
