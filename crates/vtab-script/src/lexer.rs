//! Tokenizer for script expressions.

/// Parse failure with the byte offset it was detected at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError {
    pub position: usize,
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Integer(i64),
    Decimal(f64),
    Str(String),
    Ident(String),
    Dollar,
    LParen,
    RParen,
    Comma,
    Dot,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, ch) = chars[i];
        let peek = chars.get(i + 1).map(|(_, next)| *next);
        let mut push = |kind: TokenKind, width: usize| {
            tokens.push(Token { kind, position });
            width
        };
        let width = match ch {
            c if c.is_whitespace() => 1,
            '(' => push(TokenKind::LParen, 1),
            ')' => push(TokenKind::RParen, 1),
            ',' => push(TokenKind::Comma, 1),
            '.' if !peek.is_some_and(|c| c.is_ascii_digit()) => push(TokenKind::Dot, 1),
            '?' => push(TokenKind::Question, 1),
            ':' => push(TokenKind::Colon, 1),
            '$' => push(TokenKind::Dollar, 1),
            '+' => push(TokenKind::Plus, 1),
            '-' => push(TokenKind::Minus, 1),
            '*' => push(TokenKind::Star, 1),
            '/' => push(TokenKind::Slash, 1),
            '%' => push(TokenKind::Percent, 1),
            '=' if peek == Some('=') => push(TokenKind::EqEq, 2),
            '!' if peek == Some('=') => push(TokenKind::NotEq, 2),
            '!' => push(TokenKind::Bang, 1),
            '<' if peek == Some('=') => push(TokenKind::Le, 2),
            '<' => push(TokenKind::Lt, 1),
            '>' if peek == Some('=') => push(TokenKind::Ge, 2),
            '>' => push(TokenKind::Gt, 1),
            '&' if peek == Some('&') => push(TokenKind::AndAnd, 2),
            '|' if peek == Some('|') => push(TokenKind::OrOr, 2),
            '\'' | '"' => {
                let (text, width) = read_string(&chars[i..], position)?;
                push(TokenKind::Str(text), width)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let (kind, width) = read_number(&chars[i..], position)?;
                push(kind, width)
            }
            c if c.is_alphabetic() || c == '_' => {
                let width = chars[i..]
                    .iter()
                    .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
                    .count();
                let ident: String = chars[i..i + width].iter().map(|(_, c)| *c).collect();
                push(TokenKind::Ident(ident), width)
            }
            other => {
                return Err(SyntaxError::new(
                    position,
                    format!("unexpected character '{other}'"),
                ));
            }
        };
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: input.len(),
    });
    Ok(tokens)
}

/// Quoted string with `\` escapes for the quote, backslash, `n` and `t`.
fn read_string(chars: &[(usize, char)], position: usize) -> Result<(String, usize), SyntaxError> {
    let quote = chars[0].1;
    let mut text = String::new();
    let mut i = 1;
    while let Some((_, ch)) = chars.get(i) {
        match ch {
            c if *c == quote => return Ok((text, i + 1)),
            '\\' => {
                let Some((at, escaped)) = chars.get(i + 1) else {
                    break;
                };
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    '\\' | '\'' | '"' => text.push(*escaped),
                    other => {
                        return Err(SyntaxError::new(*at, format!("unknown escape '\\{other}'")));
                    }
                }
                i += 2;
            }
            c => {
                text.push(*c);
                i += 1;
            }
        }
    }
    Err(SyntaxError::new(position, "unterminated string"))
}

fn read_number(chars: &[(usize, char)], position: usize) -> Result<(TokenKind, usize), SyntaxError> {
    let width = chars
        .iter()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .count();
    let text: String = chars[..width].iter().map(|(_, c)| *c).collect();
    if text.contains('.') {
        text.parse::<f64>()
            .map(|number| (TokenKind::Decimal(number), width))
            .map_err(|_| SyntaxError::new(position, format!("invalid number '{text}'")))
    } else {
        text.parse::<i64>()
            .map(|number| (TokenKind::Integer(number), width))
            .map_err(|_| SyntaxError::new(position, format!("integer out of range '{text}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn tokenizes_variable_lookup() {
        assert_eq!(
            kinds("$('age') >= 18"),
            [
                TokenKind::Dollar,
                TokenKind::LParen,
                TokenKind::Str("age".to_string()),
                TokenKind::RParen,
                TokenKind::Ge,
                TokenKind::Integer(18),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn distinguishes_method_dot_from_decimal() {
        assert_eq!(
            kinds("x.year() + .5"),
            [
                TokenKind::Ident("x".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("year".to_string()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Plus,
                TokenKind::Decimal(0.5),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn reports_unterminated_string() {
        let err = tokenize("concat('abc").unwrap_err();
        assert_eq!(err.position, 7);
    }

    #[test]
    fn rejects_lone_ampersand() {
        let err = tokenize("a & b").unwrap_err();
        assert_eq!(err.position, 2);
    }
}
