use crate::error::{FormatError, Result};

/// Recursive descent evaluator for arithmetic expressions
///
/// Grammar:
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := factor (('*' | '/') factor)*
/// factor  := ('+' | '-') factor | number | '?' name '?' | '(' expr ')'
/// ```
///
/// Placeholders are handed to `lookup` as they are reached.
pub struct Parser<'a, F> {
    input: &'a str,
    pos: usize,
    lookup: F,
}

impl<'a, F> Parser<'a, F>
where
    F: FnMut(&str) -> Result<f64>,
{
    /// Create a parser over `input`
    pub const fn new(input: &'a str, lookup: F) -> Self {
        Self {
            input,
            pos: 0,
            lookup,
        }
    }

    /// Evaluate the whole input
    pub fn evaluate(mut self) -> Result<f64> {
        let value = self.parse_expr()?;
        self.skip_whitespace();
        if let Some(ch) = self.peek() {
            return Err(self.unexpected(ch));
        }
        Ok(value)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn unexpected(&self, ch: char) -> FormatError {
        FormatError::UnsupportedExpression(format!(
            "unexpected '{ch}' at position {} in '{}'",
            self.pos, self.input
        ))
    }

    fn parse_expr(&mut self) -> Result<f64> {
        let mut value = self.parse_term()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some('-') => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_term(&mut self) -> Result<f64> {
        let mut value = self.parse_factor()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    value *= self.parse_factor()?;
                }
                Some('/') => {
                    self.pos += 1;
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return Err(FormatError::UnsupportedExpression(format!(
                            "division by zero in '{}'",
                            self.input
                        )));
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_factor(&mut self) -> Result<f64> {
        self.skip_whitespace();
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.parse_factor()?)
            }
            Some('+') => {
                self.pos += 1;
                self.parse_factor()
            }
            Some('(') => {
                self.pos += 1;
                let value = self.parse_expr()?;
                self.skip_whitespace();
                match self.peek() {
                    Some(')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(ch) => Err(self.unexpected(ch)),
                    None => Err(self.unexpected_end()),
                }
            }
            Some('?') => self.parse_placeholder(),
            Some(ch) if ch.is_ascii_digit() => self.parse_number(),
            Some(ch) => Err(self.unexpected(ch)),
            None => Err(self.unexpected_end()),
        }
    }

    fn parse_number(&mut self) -> Result<f64> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].parse::<f64>().map_err(|e| {
            FormatError::UnsupportedExpression(format!(
                "invalid number at position {start} in '{}': {e}",
                self.input
            ))
        })
    }

    fn parse_placeholder(&mut self) -> Result<f64> {
        let start = self.pos + 1;
        let length = self.input[start..].find('?').ok_or_else(|| {
            FormatError::UnsupportedExpression(format!(
                "unterminated placeholder in '{}'",
                self.input
            ))
        })?;
        let name = self.input[start..start + length].trim();
        self.pos = start + length + 1;
        if name.is_empty() {
            return Err(FormatError::UnsupportedExpression(format!(
                "empty placeholder in '{}'",
                self.input
            )));
        }
        (self.lookup)(name)
    }

    fn unexpected_end(&self) -> FormatError {
        FormatError::UnsupportedExpression(format!("unexpected end of '{}'", self.input))
    }
}
