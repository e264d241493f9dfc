use std::cell::Cell;

use crate::error::{LineMark, ParseError, ParseErrorKind, ParsePhase};

/// A whitespace-delimited token and where it starts in the input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub start: usize,
    pub text: &'a [u8],
}

impl Token<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn lossy(&self) -> String {
        String::from_utf8_lossy(self.text).to_string()
    }
}

/// Cursor over the raw file. Both VCD grammars are sequences of tokens
/// separated by arbitrary whitespace, so all the lexer does is find them.
pub(crate) struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    phase: ParsePhase,
    /// Where the last error was, so errors later in the file don't rescan
    /// it from the start.
    last_error: Cell<LineMark>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8], pos: usize, phase: ParsePhase) -> Self {
        Self {
            input,
            pos: pos.min(input.len()),
            phase,
            last_error: Cell::new(LineMark::default()),
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.input.get(self.pos) {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    pub fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(b) = self.input.get(self.pos) {
            if b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            None
        } else {
            Some(Token {
                start,
                text: &self.input[start..self.pos],
            })
        }
    }

    /// Read all tokens up to the next `$end`, which is consumed but not
    /// returned.
    pub fn tokens_until_end(&mut self, command: &str) -> Result<Vec<Token<'a>>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Some(t) if t.text == b"$end" => return Ok(tokens),
                Some(t) => tokens.push(t),
                None => {
                    return Err(self.error(
                        self.pos,
                        ParseErrorKind::UnexpectedEof {
                            expected: format!("$end to close {command}"),
                        },
                    ))
                }
            }
        }
    }

    /// The text between the current position and the next `$end`, with
    /// surrounding whitespace trimmed but inner whitespace kept as is.
    pub fn text_until_end(&mut self, command: &str) -> Result<String, ParseError> {
        let tokens = self.tokens_until_end(command)?;
        Ok(match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => {
                String::from_utf8_lossy(&self.input[first.start..last.end()]).to_string()
            }
            _ => String::new(),
        })
    }

    /// Consume a token that must be `$end`.
    pub fn expect_end(&mut self, command: &str) -> Result<(), ParseError> {
        match self.next_token() {
            Some(t) if t.text == b"$end" => Ok(()),
            Some(t) => Err(self.error(
                t.start,
                ParseErrorKind::Expected {
                    expected: format!("$end to close {command}"),
                    found: t.lossy(),
                },
            )),
            None => Err(self.error(
                self.pos,
                ParseErrorKind::UnexpectedEof {
                    expected: format!("$end to close {command}"),
                },
            )),
        }
    }

    pub fn error(&self, offset: usize, kind: ParseErrorKind) -> ParseError {
        let mark = self.last_error.get().advance(self.input, offset);
        self.last_error.set(mark);
        ParseError::at_mark(mark, self.phase, kind)
    }
}
