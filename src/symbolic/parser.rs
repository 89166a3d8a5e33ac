//! Recursive-descent parser for informal math notation.
//!
//! Accepts `^` and `**` for powers, implicit multiplication (`3x`, `2(x+1)`,
//! `x sin(x)`), function application with or without parentheses
//! (`sin(x)`, `sin x`), and the constants `pi` and `e`.
//!
//! Identifiers that are not function or constant names are split into
//! single-letter symbols, so `xy` reads as `x*y`. A letter followed by digits
//! or an underscore suffix stays one symbol (`x1`, `x_2`).

use super::EngineError;
use super::expr::{Constant, Expr, Func};

/// Deepest nesting of parentheses, signs, powers and function applications.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

/// Parses an expression.
pub fn parse(input: &str) -> Result<Expr, EngineError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EngineError::Parse("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.expression()?;
    if let Some(tok) = parser.peek() {
        return Err(EngineError::Parse(format!(
            "unexpected token {tok:?} at position {}",
            parser.pos
        )));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, EngineError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| EngineError::Parse(format!("invalid number '{text}'")))?;
                tokens.push(Token::Num(value));
            },
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                split_identifier(&word, &mut tokens);
            },
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            },
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            },
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                i += 2;
            },
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            },
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            },
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            },
            '(' | '{' => {
                tokens.push(Token::LParen);
                i += 1;
            },
            ')' | '}' => {
                tokens.push(Token::RParen);
                i += 1;
            },
            other => {
                return Err(EngineError::Parse(format!(
                    "unexpected character '{other}' at position {i}"
                )));
            },
        }
    }

    Ok(tokens)
}

/// Pushes tokens for an identifier, splitting unknown words into letters.
fn split_identifier(word: &str, tokens: &mut Vec<Token>) {
    let lower = word.to_ascii_lowercase();
    if Func::parse(&lower).is_some() || lower == "pi" || lower == "e" {
        tokens.push(Token::Ident(lower));
        return;
    }
    // Trailing function name glued to a coefficient symbol, e.g. `xsin`.
    for f in ["sqrt", "sin", "cos", "tan", "exp", "log", "ln"] {
        if lower.len() > f.len() && lower.ends_with(f) {
            split_identifier(&word[..word.len() - f.len()], tokens);
            tokens.push(Token::Ident(f.to_string()));
            return;
        }
    }

    let chars: Vec<char> = word.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let mut j = i + 1;
        if chars.get(j) == Some(&'_') {
            j += 1;
        }
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        // A dangling underscore with no digits is not a subscript.
        if j == i + 2 && chars[i + 1] == '_' {
            j = i + 1;
        }
        let name: String = chars[i..j].iter().collect();
        tokens.push(Token::Ident(name));
        i = j;
        while i < chars.len() && chars[i] == '_' {
            i += 1;
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expression(&mut self) -> Result<Expr, EngineError> {
        let mut terms = vec![self.term()?];
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    terms.push(self.term()?);
                },
                Some(Token::Minus) => {
                    self.pos += 1;
                    terms.push(Expr::neg(self.term()?));
                },
                _ => break,
            }
        }
        Ok(collapse(terms, Expr::Add))
    }

    fn term(&mut self) -> Result<Expr, EngineError> {
        let mut factors = vec![self.unary()?];
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    factors.push(self.unary()?);
                },
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    factors.push(Expr::pow(divisor, Expr::num(-1.0)));
                },
                // Implicit multiplication binds like `*` but never swallows a sign.
                Some(Token::Num(_) | Token::Ident(_) | Token::LParen) => {
                    factors.push(self.power()?);
                },
                _ => break,
            }
        }
        Ok(collapse(factors, Expr::Mul))
    }

    fn unary(&mut self) -> Result<Expr, EngineError> {
        self.nested(Self::signed)
    }

    /// Runs `rule` one level deeper, failing past [`MAX_DEPTH`].
    fn nested(&mut self, rule: fn(&mut Self) -> Result<Expr, EngineError>) -> Result<Expr, EngineError> {
        if self.depth >= MAX_DEPTH {
            return Err(EngineError::Parse("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn signed(&mut self) -> Result<Expr, EngineError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::neg(self.unary()?))
            },
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            },
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, EngineError> {
        self.nested(Self::exponentiation)
    }

    fn exponentiation(&mut self) -> Result<Expr, EngineError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, EngineError> {
        match self.advance() {
            Some(Token::Num(v)) => Ok(Expr::num(v)),
            Some(Token::Ident(name)) => self.identifier(&name),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(EngineError::Parse("missing closing parenthesis".to_string())),
                }
            },
            Some(tok) => Err(EngineError::Parse(format!(
                "unexpected token {tok:?} at position {}",
                self.pos - 1
            ))),
            None => Err(EngineError::Parse("unexpected end of input".to_string())),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<Expr, EngineError> {
        match name {
            "pi" => return Ok(Expr::Const(Constant::Pi)),
            "e" => return Ok(Expr::Const(Constant::E)),
            _ => {},
        }
        let Some(func) = Func::parse(name) else {
            return Ok(Expr::sym(name));
        };
        // `sin(x)^2` squares the application; `sin x^2` applies to `x^2`.
        if self.peek() == Some(&Token::LParen) {
            let arg = self.primary()?;
            let applied = Expr::func(func, arg);
            if self.peek() == Some(&Token::Caret) {
                self.pos += 1;
                let exponent = self.unary()?;
                return Ok(Expr::pow(applied, exponent));
            }
            return Ok(applied);
        }
        let arg = self.power()?;
        Ok(Expr::func(func, arg))
    }
}

fn collapse(mut items: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syms(e: &Expr) -> Vec<String> {
        e.free_symbols().into_iter().collect()
    }

    #[test]
    fn test_parse_power_caret_and_double_star() {
        assert_eq!(parse("x^2").unwrap(), parse("x**2").unwrap());
    }

    #[test]
    fn test_implicit_multiplication() {
        let e = parse("3x").unwrap();
        assert_eq!(e, Expr::mul(Expr::num(3.0), Expr::sym("x")));
    }

    #[test]
    fn test_implicit_multiplication_with_parens() {
        let e = parse("2(x+1)").unwrap();
        assert!(matches!(e, Expr::Mul(ref f) if f.len() == 2));
    }

    #[test]
    fn test_juxtaposed_letters_split() {
        let e = parse("xy + 3").unwrap();
        assert_eq!(syms(&e), vec!["x", "y"]);
    }

    #[test]
    fn test_subscripted_symbols_kept() {
        let e = parse("x1 + x_2").unwrap();
        assert_eq!(syms(&e), vec!["x1", "x_2"]);
    }

    #[test]
    fn test_functions_and_constants() {
        let e = parse("sin(x) + e^x + pi").unwrap();
        assert_eq!(syms(&e), vec!["x"]);
    }

    #[test]
    fn test_function_without_parens() {
        let e = parse("sin x").unwrap();
        assert_eq!(e, Expr::func(Func::Sin, Expr::sym("x")));
    }

    #[test]
    fn test_negative_exponent() {
        let e = parse("x^-1").unwrap();
        assert_eq!(e, Expr::pow(Expr::sym("x"), Expr::neg(Expr::num(1.0))));
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        let e = parse("-x^2").unwrap();
        assert_eq!(
            e,
            Expr::neg(Expr::pow(Expr::sym("x"), Expr::num(2.0)))
        );
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let deep = format!("{}x{}", "(".repeat(20_000), ")".repeat(20_000));
        assert_eq!(
            parse(&deep),
            Err(EngineError::Parse("expression nested too deeply".to_string()))
        );
        assert!(parse(&format!("{}x", "-".repeat(20_000))).is_err());
        assert!(parse(&format!("x{}", "^-x".repeat(20_000))).is_err());
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let nested = format!("{}x{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&nested).unwrap(), Expr::sym("x"));
        assert!(parse(&format!("{}x", "-".repeat(50))).is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("(x + 1").is_err());
        assert!(parse("x + ").is_err());
        assert!(parse("x $ y").is_err());
    }
}
