//! Restricted arithmetic expressions.
//!
//! The grammar only knows numbers, `+ - * /`, unary signs and parentheses:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | '(' expr ')'
//! ```
//!
//! There are no identifiers, so formula text imported from a file cannot
//! reach anything beyond arithmetic.

use super::eval::EvalError;

/// Deepest allowed nesting of parentheses and unary signs.
pub const MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, EvalError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        let token = match b {
            b' ' | b'\t' => {
                pos += 1;
                continue;
            }
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'0'..=b'9' | b'.' => {
                let start = pos;
                pos = scan_number(bytes, pos);
                let text = &input[start..pos];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::InvalidNumber(text.to_string()))?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('\u{fffd}');
                return Err(EvalError::UnexpectedChar { ch, pos });
            }
        };
        tokens.push((token, pos));
        pos += 1;
    }

    Ok(tokens)
}

/// Return the end offset of a numeric literal starting at `pos`.
fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
        pos += 1;
    }
    // Exponent only counts when digits follow, so "2e" stays an error.
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut end = pos + 1;
        if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
            end += 1;
        }
        if end < bytes.len() && bytes[end].is_ascii_digit() {
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            pos = end;
        }
    }
    pos
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.bump();
            let rhs = self.term()?;
            acc = if op == Token::Plus { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.bump();
            let rhs = self.unary()?;
            acc = if op == Token::Star {
                acc * rhs
            } else {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                acc / rhs
            };
        }
        Ok(acc)
    }

    fn unary(&mut self) -> Result<f64, EvalError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.bump();
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                Ok(v)
            }
            Some(Token::Minus) => {
                self.bump();
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                Ok(-v)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, EvalError> {
        let at = self.tokens.get(self.pos).map(|(_, p)| *p);
        match self.bump() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                self.descend()?;
                let v = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => {
                        self.depth -= 1;
                        Ok(v)
                    }
                    _ => Err(EvalError::UnbalancedParens),
                }
            }
            Some(Token::RParen) => Err(EvalError::UnbalancedParens),
            Some(other) => Err(EvalError::UnexpectedToken {
                found: other.describe(),
                pos: at.unwrap_or(0),
            }),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn eval_arithmetic(input: &str) -> Result<f64, EvalError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;

    if let Some((token, pos)) = parser.tokens.get(parser.pos) {
        if *token == Token::RParen {
            return Err(EvalError::UnbalancedParens);
        }
        return Err(EvalError::UnexpectedToken {
            found: token.describe(),
            pos: *pos,
        });
    }

    if !value.is_finite() {
        return Err(EvalError::NonFinite);
    }
    Ok(value)
}
