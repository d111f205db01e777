//! Recursive descent parser.
//!
//! Precedence, lowest to highest:
//! conditional `?:`, `||`, `&&`, `== !=`, `< <= > >=`, `+ -`, `* / %`,
//! unary `- !`, postfix method calls, primaries.

use vtab_model::{Value, ValueType};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::lexer::{SyntaxError, Token, TokenKind, tokenize};
use crate::library;

/// Deepest expression tree the parser builds. Parentheses, prefix
/// operators, conditionals and each operator of a binary chain count one
/// level, which also bounds the evaluator's recursion.
pub const MAX_DEPTH: usize = 128;

pub(crate) fn parse(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    let token = parser.peek();
    if token.kind != TokenKind::End {
        return Err(SyntaxError::new(token.position, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with an End token
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::End {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, SyntaxError> {
        let token = self.advance();
        if &token.kind == kind {
            Ok(token)
        } else {
            Err(SyntaxError::new(token.position, format!("expected {what}")))
        }
    }

    fn descend(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SyntaxError::new(
                self.peek().position,
                format!("expression nested deeper than {MAX_DEPTH} levels"),
            ));
        }
        Ok(())
    }

    fn conditional(&mut self) -> Result<Expr, SyntaxError> {
        self.descend()?;
        let expr = self.conditional_body()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn conditional_body(&mut self) -> Result<Expr, SyntaxError> {
        let condition = self.or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let then = self.conditional()?;
        self.expect(&TokenKind::Colon, "':' in conditional")?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, SyntaxError>,
    ) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = next(self)?;
        'outer: loop {
            for (kind, op) in operators {
                if self.eat(kind) {
                    // a left-associative chain deepens the tree by one per operator
                    self.descend()?;
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            self.depth = base;
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&[(TokenKind::OrOr, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&[(TokenKind::AndAnd, BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                (TokenKind::EqEq, BinaryOp::Equal),
                (TokenKind::NotEq, BinaryOp::NotEqual),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                (TokenKind::Le, BinaryOp::LessEqual),
                (TokenKind::Lt, BinaryOp::Less),
                (TokenKind::Ge, BinaryOp::GreaterEqual),
                (TokenKind::Gt, BinaryOp::Greater),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Subtract),
            ],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Multiply),
                (TokenKind::Slash, BinaryOp::Divide),
                (TokenKind::Percent, BinaryOp::Remainder),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = if self.eat(&TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.eat(&TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.postfix();
        };
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `receiver.method(args)` is sugar for `method(receiver, args)`.
    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        let base = self.depth;
        while self.eat(&TokenKind::Dot) {
            self.descend()?;
            let token = self.advance();
            let TokenKind::Ident(method) = token.kind else {
                return Err(SyntaxError::new(token.position, "expected method name"));
            };
            self.expect(&TokenKind::LParen, "'(' after method name")?;
            let mut args = vec![expr];
            args.extend(self.arguments()?);
            library::check_call(&method, args.len())
                .map_err(|message| SyntaxError::new(token.position, message))?;
            expr = Expr::Call {
                function: method,
                args,
            };
        }
        self.depth = base;
        Ok(expr)
    }

    /// Comma separated arguments after an opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.conditional()?);
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(&TokenKind::Comma, "',' or ')'")?;
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Integer(number) => Ok(Expr::Literal(Value::integer(number))),
            TokenKind::Decimal(number) => Ok(Expr::Literal(Value::decimal(number))),
            TokenKind::Str(text) => Ok(Expr::Literal(Value::text(text))),
            TokenKind::LParen => {
                let expr = self.conditional()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Dollar => {
                self.expect(&TokenKind::LParen, "'(' after '$'")?;
                let name = self.advance();
                let TokenKind::Str(name) = name.kind else {
                    return Err(SyntaxError::new(name.position, "expected quoted variable name"));
                };
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::Variable(name))
            }
            TokenKind::Ident(ident) => match ident.as_str() {
                "true" => Ok(Expr::Literal(Value::boolean(true))),
                "false" => Ok(Expr::Literal(Value::boolean(false))),
                "null" => Ok(Expr::Literal(ValueType::Text.null_value())),
                _ => {
                    self.expect(&TokenKind::LParen, "'(' after function name")?;
                    let args = self.arguments()?;
                    library::check_call(&ident, args.len())
                        .map_err(|message| SyntaxError::new(token.position, message))?;
                    Ok(Expr::Call {
                        function: ident,
                        args,
                    })
                }
            },
            TokenKind::End => Err(SyntaxError::new(token.position, "unexpected end of input")),
            other => Err(SyntaxError::new(
                token.position,
                format!("unexpected token {other:?}"),
            )),
        }
    }
}
