#![forbid(unsafe_code)]

//! Tokenizer for attribute expressions.

use std::fmt;

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Undefined,
    TypeOf,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    BraceOpen,
    BraceClose,
    Dot,
    Comma,
    Colon,
    Semicolon,
    Question,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Increment,
    Decrement,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
    Nullish,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Number(n) => return write!(f, "{n}"),
            Self::Str(s) => return write!(f, "{s:?}"),
            Self::Ident(name) => return f.write_str(name),
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::TypeOf => "typeof",
            Self::ParenOpen => "(",
            Self::ParenClose => ")",
            Self::BracketOpen => "[",
            Self::BracketClose => "]",
            Self::BraceOpen => "{",
            Self::BraceClose => "}",
            Self::Dot => ".",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Semicolon => ";",
            Self::Question => "?",
            Self::Arrow => "=>",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::StarAssign => "*=",
            Self::SlashAssign => "/=",
            Self::Increment => "++",
            Self::Decrement => "--",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
        };
        f.write_str(text)
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Longest-match operator table, three-character operators first.
const OPERATORS: &[(&str, Token)] = &[
    ("===", Token::StrictEq),
    ("!==", Token::StrictNotEq),
    ("=>", Token::Arrow),
    ("==", Token::Eq),
    ("!=", Token::NotEq),
    ("<=", Token::LessEq),
    (">=", Token::GreaterEq),
    ("&&", Token::And),
    ("||", Token::Or),
    ("??", Token::Nullish),
    ("++", Token::Increment),
    ("--", Token::Decrement),
    ("+=", Token::PlusAssign),
    ("-=", Token::MinusAssign),
    ("*=", Token::StarAssign),
    ("/=", Token::SlashAssign),
    ("(", Token::ParenOpen),
    (")", Token::ParenClose),
    ("[", Token::BracketOpen),
    ("]", Token::BracketClose),
    ("{", Token::BraceOpen),
    ("}", Token::BraceClose),
    (".", Token::Dot),
    (",", Token::Comma),
    (":", Token::Colon),
    (";", Token::Semicolon),
    ("?", Token::Question),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Star),
    ("/", Token::Slash),
    ("%", Token::Percent),
    ("!", Token::Bang),
    ("=", Token::Assign),
    ("<", Token::Less),
    (">", Token::Greater),
];

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < source.len() {
        let rest = &source[pos..];
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        let start = pos;
        let token = if c.is_ascii_digit()
            || (c == '.' && rest[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            let (n, len) = lex_number(rest, start)?;
            pos += len;
            Token::Number(n)
        } else if c == '"' || c == '\'' {
            let (s, len) = lex_string(rest, c, start)?;
            pos += len;
            Token::Str(s)
        } else if is_ident_start(c) {
            let len = rest
                .char_indices()
                .find(|&(_, ch)| !is_ident_continue(ch))
                .map_or(rest.len(), |(i, _)| i);
            pos += len;
            match &rest[..len] {
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                "undefined" => Token::Undefined,
                "typeof" => Token::TypeOf,
                word => Token::Ident(word.to_string()),
            }
        } else {
            let Some((text, token)) = OPERATORS.iter().find(|(text, _)| rest.starts_with(text))
            else {
                return Err(ExpressionError::syntax(
                    format!("unexpected character {c:?}"),
                    start,
                ));
            };
            pos += text.len();
            token.clone()
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
    }
    Ok(tokens)
}

fn lex_number(rest: &str, start: usize) -> Result<(f64, usize), ExpressionError> {
    let bytes = rest.as_bytes();
    let mut len = 0;
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };
    len += digits(len);
    if bytes.get(len) == Some(&b'.') {
        len += 1;
        len += digits(len);
    }
    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let mut exp = len + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let count = digits(exp);
        if count > 0 {
            len = exp + count;
        }
    }
    rest[..len]
        .parse()
        .map(|n| (n, len))
        .map_err(|_| ExpressionError::syntax(format!("invalid number {:?}", &rest[..len]), start))
}

fn lex_string(rest: &str, quote: char, start: usize) -> Result<(String, usize), ExpressionError> {
    let mut out = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, i + c.len_utf8())),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
    Err(ExpressionError::syntax("unterminated string literal", start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn operators_use_longest_match() {
        assert_eq!(
            kinds("a === b !== c => d ?? e"),
            vec![
                Token::Ident("a".into()),
                Token::StrictEq,
                Token::Ident("b".into()),
                Token::StrictNotEq,
                Token::Ident("c".into()),
                Token::Arrow,
                Token::Ident("d".into()),
                Token::Nullish,
                Token::Ident("e".into()),
            ]
        );
        assert_eq!(kinds("i++"), vec![Token::Ident("i".into()), Token::Increment]);
    }

    #[test]
    fn numbers() {
        assert_eq!(kinds("10 1.5 .5 2e3"), vec![
            Token::Number(10.0),
            Token::Number(1.5),
            Token::Number(0.5),
            Token::Number(2000.0),
        ]);
        assert_eq!(kinds("a.b"), vec![
            Token::Ident("a".into()),
            Token::Dot,
            Token::Ident("b".into())
        ]);
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(kinds(r#"'it\'s' "a\nb""#), vec![
            Token::Str("it's".into()),
            Token::Str("a\nb".into()),
        ]);
    }

    #[test]
    fn keywords_and_dollar_identifiers() {
        assert_eq!(kinds("true null undefined typeof $event"), vec![
            Token::True,
            Token::Null,
            Token::Undefined,
            Token::TypeOf,
            Token::Ident("$event".into()),
        ]);
    }

    #[test]
    fn errors_carry_offsets() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.position, Some(2));
        let err = tokenize("'open").unwrap_err();
        assert_eq!(err.position, Some(0));
    }
}
