#![forbid(unsafe_code)]

//! Pratt parser over the token stream.
//!
//! Binding powers, loosest first:
//!
//! | Level | Operators | Assoc |
//! |------:|-----------|-------|
//! | 2 | `=` `+=` `-=` `*=` `/=` | right |
//! | 3 | `? :` | right |
//! | 4 | `??` | left |
//! | 5 | `\|\|` | left |
//! | 6 | `&&` | left |
//! | 7 | `==` `!=` `===` `!==` | left |
//! | 8 | `<` `<=` `>` `>=` | left |
//! | 9 | `+` `-` | left |
//! | 10 | `*` `/` `%` | left |
//! | 11 | prefix `!` `-` `+` `typeof` `++` `--` | |
//! | 12 | postfix `++` `--` | |
//! | 13 | `.` `[]` `()` | left |
//!
//! Top-level `;` separates a sequence of expressions; the value of the
//! sequence is its last expression.

use crate::ast::{AssignOp, BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use crate::error::ExpressionError;
use crate::lexer::{Spanned, Token, tokenize};

const PREFIX_BP: u8 = 11;
const POSTFIX_BP: u8 = 12;
const ACCESS_BP: u8 = 13;

/// Deepest expression nesting the recursive descent accepts.
pub const MAX_DEPTH: usize = 128;

/// Parse a full expression source.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
        depth: 0,
    };
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExpressionError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected `{token}`")))
        }
    }

    fn unexpected(&self, context: &str) -> ExpressionError {
        match self.peek() {
            Some(token) => {
                ExpressionError::syntax(format!("{context}, found `{token}`"), self.offset())
            }
            None => ExpressionError::syntax(format!("{context}, found end of input"), self.end),
        }
    }

    fn parse_program(&mut self) -> Result<Expr, ExpressionError> {
        let mut items = Vec::new();
        loop {
            while self.eat(&Token::Semicolon) {}
            if self.peek().is_none() {
                break;
            }
            items.push(self.parse_expr(0)?);
            if self.peek().is_some() && !self.eat(&Token::Semicolon) {
                return Err(self.unexpected("expected end of expression"));
            }
        }
        Ok(match items.len() {
            0 => Expr::Literal(Literal::Undefined),
            1 => items.remove(0),
            _ => Expr::Sequence(items),
        })
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::syntax(
                "expression nested too deeply",
                self.offset(),
            ));
        }
        self.depth += 1;
        let result = self.parse_operators(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_operators(&mut self, min_bp: u8) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_prefix()?;
        loop {
            let Some(token) = self.peek().cloned() else {
                break;
            };
            match token {
                Token::Dot | Token::BracketOpen | Token::ParenOpen => {
                    if ACCESS_BP < min_bp {
                        break;
                    }
                    self.pos += 1;
                    lhs = match token {
                        Token::Dot => Expr::Member(Box::new(lhs), self.property_name()?),
                        Token::BracketOpen => {
                            let index = self.parse_expr(0)?;
                            self.expect(&Token::BracketClose)?;
                            Expr::Index(Box::new(lhs), Box::new(index))
                        }
                        _ => Expr::Call(Box::new(lhs), self.parse_list(&Token::ParenClose)?),
                    };
                }
                Token::Increment | Token::Decrement => {
                    if POSTFIX_BP < min_bp {
                        break;
                    }
                    let offset = self.offset();
                    self.pos += 1;
                    lhs = update(token == Token::Increment, false, lhs, offset)?;
                }
                Token::Question => {
                    if 3 < min_bp {
                        break;
                    }
                    self.pos += 1;
                    let then = self.parse_expr(0)?;
                    self.expect(&Token::Colon)?;
                    let otherwise = self.parse_expr(3)?;
                    lhs = Expr::Conditional(Box::new(lhs), Box::new(then), Box::new(otherwise));
                }
                _ => {
                    if let Some(op) = assign_op(&token) {
                        if 2 < min_bp {
                            break;
                        }
                        let offset = self.offset();
                        if !lhs.is_assignable() {
                            return Err(ExpressionError::syntax(
                                "invalid assignment target",
                                offset,
                            ));
                        }
                        self.pos += 1;
                        let rhs = self.parse_expr(2)?;
                        lhs = Expr::Assign(op, Box::new(lhs), Box::new(rhs));
                        continue;
                    }
                    let Some((bp, kind)) = infix(&token) else {
                        break;
                    };
                    if bp < min_bp {
                        break;
                    }
                    self.pos += 1;
                    let rhs = self.parse_expr(bp + 1)?;
                    lhs = match kind {
                        Infix::Binary(op) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                        Infix::Logical(op) => Expr::Logical(op, Box::new(lhs), Box::new(rhs)),
                    };
                }
            }
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.offset();
        if self.is_arrow_ahead() {
            return self.parse_arrow();
        }
        let Some(token) = self.bump() else {
            return Err(self.unexpected("expected an expression"));
        };
        let expr = match token {
            Token::Number(n) => Expr::Literal(Literal::Number(n)),
            Token::Str(s) => Expr::Literal(Literal::Str(s)),
            Token::True => Expr::Literal(Literal::Bool(true)),
            Token::False => Expr::Literal(Literal::Bool(false)),
            Token::Null => Expr::Literal(Literal::Null),
            Token::Undefined => Expr::Literal(Literal::Undefined),
            Token::Ident(name) => Expr::Ident(name),
            Token::ParenOpen => {
                let inner = self.parse_expr(0)?;
                self.expect(&Token::ParenClose)?;
                inner
            }
            Token::BracketOpen => Expr::Array(self.parse_list(&Token::BracketClose)?),
            Token::BraceOpen => self.parse_object()?,
            Token::Bang => unary(UnaryOp::Not, self.parse_expr(PREFIX_BP)?),
            Token::Minus => unary(UnaryOp::Neg, self.parse_expr(PREFIX_BP)?),
            Token::Plus => unary(UnaryOp::Plus, self.parse_expr(PREFIX_BP)?),
            Token::TypeOf => unary(UnaryOp::TypeOf, self.parse_expr(PREFIX_BP)?),
            Token::Increment => update(true, true, self.parse_expr(PREFIX_BP)?, offset)?,
            Token::Decrement => update(false, true, self.parse_expr(PREFIX_BP)?, offset)?,
            other => {
                return Err(ExpressionError::syntax(
                    format!("unexpected `{other}`"),
                    offset,
                ));
            }
        };
        Ok(expr)
    }

    /// `ident =>` or `( [ident {, ident}] ) =>` at the cursor.
    fn is_arrow_ahead(&self) -> bool {
        match self.peek() {
            Some(Token::Ident(_)) => self.peek_at(1) == Some(&Token::Arrow),
            Some(Token::ParenOpen) => {
                let mut i = 1;
                loop {
                    match self.peek_at(i) {
                        Some(Token::ParenClose) => return self.peek_at(i + 1) == Some(&Token::Arrow),
                        Some(Token::Ident(_)) => match self.peek_at(i + 1) {
                            Some(Token::Comma) => i += 2,
                            Some(Token::ParenClose) => i += 1,
                            _ => return false,
                        },
                        _ => return false,
                    }
                }
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr, ExpressionError> {
        let mut params = Vec::new();
        if self.eat(&Token::ParenOpen) {
            while let Some(Token::Ident(name)) = self.peek().cloned() {
                params.push(name);
                self.pos += 1;
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::ParenClose)?;
        } else if let Some(Token::Ident(name)) = self.bump() {
            params.push(name);
        }
        self.expect(&Token::Arrow)?;
        let body = self.parse_expr(2)?;
        Ok(Expr::Arrow(params, Box::new(body)))
    }

    fn property_name(&mut self) -> Result<String, ExpressionError> {
        let name = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            Some(
                keyword @ (Token::True
                | Token::False
                | Token::Null
                | Token::Undefined
                | Token::TypeOf),
            ) => keyword.to_string(),
            _ => return Err(self.unexpected("expected a property name")),
        };
        self.pos += 1;
        Ok(name)
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn parse_list(&mut self, close: &Token) -> Result<Vec<Expr>, ExpressionError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.parse_expr(2)?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ExpressionError> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&Token::BraceClose) {
                break;
            }
            let offset = self.offset();
            let key = match self.bump() {
                Some(Token::Ident(name)) => {
                    if matches!(self.peek(), Some(Token::Comma | Token::BraceClose)) {
                        entries.push((name.clone(), Expr::Ident(name)));
                        if !self.eat(&Token::Comma) {
                            self.expect(&Token::BraceClose)?;
                            break;
                        }
                        continue;
                    }
                    name
                }
                Some(Token::Str(s)) => s,
                Some(Token::Number(n)) => alpen_reactive::format_number(n),
                Some(
                    keyword @ (Token::True
                    | Token::False
                    | Token::Null
                    | Token::Undefined
                    | Token::TypeOf),
                ) => keyword.to_string(),
                _ => return Err(ExpressionError::syntax("expected a property key", offset)),
            };
            self.expect(&Token::Colon)?;
            let value = self.parse_expr(2)?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(&Token::BraceClose)?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn infix(token: &Token) -> Option<(u8, Infix)> {
    let entry = match token {
        Token::Nullish => (4, Infix::Logical(LogicalOp::Nullish)),
        Token::Or => (5, Infix::Logical(LogicalOp::Or)),
        Token::And => (6, Infix::Logical(LogicalOp::And)),
        Token::Eq => (7, Infix::Binary(BinaryOp::Eq)),
        Token::NotEq => (7, Infix::Binary(BinaryOp::NotEq)),
        Token::StrictEq => (7, Infix::Binary(BinaryOp::StrictEq)),
        Token::StrictNotEq => (7, Infix::Binary(BinaryOp::StrictNotEq)),
        Token::Less => (8, Infix::Binary(BinaryOp::Less)),
        Token::LessEq => (8, Infix::Binary(BinaryOp::LessEq)),
        Token::Greater => (8, Infix::Binary(BinaryOp::Greater)),
        Token::GreaterEq => (8, Infix::Binary(BinaryOp::GreaterEq)),
        Token::Plus => (9, Infix::Binary(BinaryOp::Add)),
        Token::Minus => (9, Infix::Binary(BinaryOp::Sub)),
        Token::Star => (10, Infix::Binary(BinaryOp::Mul)),
        Token::Slash => (10, Infix::Binary(BinaryOp::Div)),
        Token::Percent => (10, Infix::Binary(BinaryOp::Rem)),
        _ => return None,
    };
    Some(entry)
}

fn assign_op(token: &Token) -> Option<AssignOp> {
    match token {
        Token::Assign => Some(AssignOp::Assign),
        Token::PlusAssign => Some(AssignOp::Add),
        Token::MinusAssign => Some(AssignOp::Sub),
        Token::StarAssign => Some(AssignOp::Mul),
        Token::SlashAssign => Some(AssignOp::Div),
        _ => None,
    }
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary(op, Box::new(operand))
}

fn update(increment: bool, prefix: bool, target: Expr, offset: usize) -> Result<Expr, ExpressionError> {
    if !target.is_assignable() {
        return Err(ExpressionError::syntax(
            "invalid increment/decrement operand",
            offset,
        ));
    }
    Ok(Expr::Update {
        increment,
        prefix,
        target: Box::new(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExpressionErrorKind;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Number(n)))
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                num(1.0),
                Box::new(Expr::Binary(BinaryOp::Mul, num(2.0), num(3.0)))
            )
        );
        assert_eq!(
            parse("a - b - c").unwrap(),
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, ident("a"), ident("b"))),
                ident("c")
            )
        );
        assert_eq!(
            parse("a = b = 1").unwrap(),
            Expr::Assign(
                AssignOp::Assign,
                ident("a"),
                Box::new(Expr::Assign(AssignOp::Assign, ident("b"), num(1.0)))
            )
        );
    }

    #[test]
    fn member_chains_and_calls() {
        assert_eq!(
            parse("items.push(item.id)").unwrap(),
            Expr::Call(
                Box::new(Expr::Member(ident("items"), "push".into())),
                vec![Expr::Member(ident("item"), "id".into())]
            )
        );
        assert_eq!(
            parse("rows[0]").unwrap(),
            Expr::Index(ident("rows"), num(0.0))
        );
    }

    #[test]
    fn ternary_binds_loosely() {
        assert_eq!(
            parse("open ? 'a' : 'b'").unwrap(),
            Expr::Conditional(
                ident("open"),
                Box::new(Expr::Literal(Literal::Str("a".into()))),
                Box::new(Expr::Literal(Literal::Str("b".into())))
            )
        );
    }

    #[test]
    fn object_literals_with_shorthand() {
        assert_eq!(
            parse("{ open: false, items, 'x-y': 1, }").unwrap(),
            Expr::Object(vec![
                ("open".into(), Expr::Literal(Literal::Bool(false))),
                ("items".into(), Expr::Ident("items".into())),
                ("x-y".into(), Expr::Literal(Literal::Number(1.0))),
            ])
        );
        assert_eq!(parse("{}").unwrap(), Expr::Object(Vec::new()));
    }

    #[test]
    fn arrow_arguments() {
        assert_eq!(
            parse("items.filter(i => i.done)").unwrap(),
            Expr::Call(
                Box::new(Expr::Member(ident("items"), "filter".into())),
                vec![Expr::Arrow(
                    vec!["i".into()],
                    Box::new(Expr::Member(ident("i"), "done".into()))
                )]
            )
        );
        assert!(matches!(
            parse("(a, b) => a").unwrap(),
            Expr::Arrow(params, _) if params == ["a", "b"]
        ));
        assert_eq!(parse("(a)").unwrap(), Expr::Ident("a".into()));
    }

    #[test]
    fn sequences_and_empty_input() {
        assert!(matches!(parse("a = 1; b = 2;").unwrap(), Expr::Sequence(items) if items.len() == 2));
        assert_eq!(parse("  ").unwrap(), Expr::Literal(Literal::Undefined));
    }

    #[test]
    fn update_operators() {
        assert_eq!(
            parse("count++").unwrap(),
            Expr::Update {
                increment: true,
                prefix: false,
                target: ident("count")
            }
        );
        assert_eq!(
            parse("--count").unwrap(),
            Expr::Update {
                increment: false,
                prefix: true,
                target: ident("count")
            }
        );
    }

    #[test]
    fn syntax_errors() {
        for source in ["1 +", "(a", "1 = 2", "a b", "{ a: }", "[1,,]", "a."] {
            let err = parse(source).unwrap_err();
            assert_eq!(err.kind, ExpressionErrorKind::Syntax, "{source}");
            assert!(err.position.is_some());
        }
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&shallow).unwrap(), Expr::Literal(Literal::Number(1.0)));

        for source in [
            format!("{}1{}", "(".repeat(300), ")".repeat(300)),
            format!("{}1{}", "[".repeat(300), "]".repeat(300)),
            format!("{}x", "!".repeat(300)),
            "a = ".repeat(300) + "1",
        ] {
            let err = parse(&source).unwrap_err();
            assert_eq!(err.kind, ExpressionErrorKind::Syntax);
            assert!(err.message.contains("nested too deeply"), "{}", err.message);
        }
    }
}
