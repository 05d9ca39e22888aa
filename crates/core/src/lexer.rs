//! Character-level tokenizer.
//!
//! Scans an input byte buffer into `End`, `Equal`, and string tokens. A
//! stack of states drives the scan: quoted groups may nest (only the
//! outermost pair is stripped), an escape forces the next character to be
//! taken literally, and symbol references of the form
//! `<prefix><open>name<close>` are expanded inline through a [`Resolver`].

use std::rc::Rc;

use crate::config::{valid, Config, Special};
use crate::error::Error;

/// A tokenized piece of text together with its resolution status.
///
/// `resolved` is true iff every symbol reference encountered while building
/// the text was found in the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SymVal {
    pub(crate) resolved: bool,
    pub(crate) text: String,
}

impl SymVal {
    pub(crate) fn resolved(text: impl Into<String>) -> SymVal {
        SymVal {
            resolved: true,
            text: text.into(),
        }
    }

    pub(crate) fn unresolved(text: impl Into<String>) -> SymVal {
        SymVal {
            resolved: false,
            text: text.into(),
        }
    }
}

/// Source of symbol values for inline resolution.
pub(crate) trait Resolver {
    /// Look up `name`; `None` when the symbol is unknown.
    fn get(&mut self, name: &str) -> Result<Option<SymVal>, Error>;
}

/// Tokens produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    End,
    Equal,
    Str(SymVal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Str,
    Bracket,
    Symbol,
    Prefix,
    Escape,
    Failed,
}

const ERROR_CONTEXT_LEN: usize = 15;

pub(crate) struct Tokenizer {
    config: Rc<Config>,
    input: Vec<u8>,
    pos: usize,
    resolved: bool,
    buf: String,
    sym_buf: String,
    stack: Vec<State>,
}

impl Tokenizer {
    pub(crate) fn new(config: Rc<Config>) -> Tokenizer {
        Tokenizer {
            config,
            input: Vec::new(),
            pos: 0,
            resolved: true,
            buf: String::new(),
            sym_buf: String::new(),
            stack: Vec::new(),
        }
    }

    /// Make the tokenizer ready to process a new input.
    pub(crate) fn reset(&mut self, input: impl Into<Vec<u8>>) {
        self.input = input.into();
        self.pos = 0;
        self.resolved = true;
        self.buf.clear();
        self.sym_buf.clear();
        self.stack.clear();
    }

    /// Scan the next token.
    ///
    /// # Panics
    ///
    /// Panics when called again after an error was returned; the caller must
    /// stop at the first error.
    pub(crate) fn next(&mut self, resolver: &mut dyn Resolver) -> Result<Token, Error> {
        if !self.stack.is_empty() {
            if self.top() == Some(State::Failed) {
                panic!("next() called after an error, context: {}", self.context());
            }
            panic!("next() called mid-token (stack size {})", self.stack.len());
        }
        self.buf.clear();
        self.resolved = true;
        loop {
            if let Some(token) = self.scan(resolver)? {
                return Ok(token);
            }
        }
    }

    /// Input context preceding the current position, for error messages.
    pub(crate) fn context(&self) -> String {
        let upto = &self.input[..self.pos];
        if upto.len() > ERROR_CONTEXT_LEN {
            format!(
                "...{}",
                String::from_utf8_lossy(&upto[upto.len() - ERROR_CONTEXT_LEN..])
            )
        } else {
            String::from_utf8_lossy(upto).into_owned()
        }
    }

    fn top(&self) -> Option<State> {
        self.stack.last().copied()
    }

    fn push_if_empty(&mut self, state: State) {
        if self.stack.is_empty() {
            self.stack.push(state);
        }
    }

    fn take_symval(&mut self) -> SymVal {
        SymVal {
            resolved: self.resolved,
            text: std::mem::take(&mut self.buf),
        }
    }

    fn fail(&mut self, message: impl Into<String>) -> Error {
        self.stack.push(State::Failed);
        Error::Syntax {
            context: self.context(),
            message: message.into(),
        }
    }

    fn fail_char(&mut self, message: &str) -> Error {
        self.stack.push(State::Failed);
        Error::Syntax {
            context: format!("{}\u{fffd}", self.context()),
            message: message.to_string(),
        }
    }

    fn symbol_char_error(&mut self, c: char) -> Error {
        self.fail(format!("character invalid in symbol: '{c}'"))
    }

    /// Decode the next character; `None` at end of input.
    fn read_char(&mut self) -> Result<Option<char>, Error> {
        if self.pos >= self.input.len() {
            return Ok(None);
        }
        match decode_utf8(&self.input[self.pos..]) {
            Some((c, width)) => {
                if c == '\u{feff}' {
                    return Err(self.fail_char("byte order mark character not supported"));
                }
                self.pos += width;
                Ok(Some(c))
            }
            None => Err(self.fail_char("invalid character")),
        }
    }

    /// One step of the state machine: consume a character, return a token
    /// when one is complete.
    fn scan(&mut self, resolver: &mut dyn Resolver) -> Result<Option<Token>, Error> {
        let prefix = self.config.special(Special::SymbolPrefix);
        let open = self.config.special(Special::OpenQuote);
        let close = self.config.special(Special::CloseQuote);
        let sep = self.config.special(Special::Separator);
        let escape = self.config.special(Special::Escape);

        let c = self.read_char()?;
        match c {
            None => match self.top() {
                None => Ok(Some(Token::End)),
                Some(State::Str) => {
                    self.stack.pop();
                    Ok(Some(Token::Str(self.take_symval())))
                }
                Some(State::Bracket | State::Symbol | State::Prefix | State::Escape) => {
                    Err(self.fail("premature end of input"))
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },

            Some(c) if c.is_whitespace() => match self.top() {
                None => Ok(None),
                Some(State::Str) => {
                    self.stack.pop();
                    Ok(Some(Token::Str(self.take_symval())))
                }
                Some(State::Bracket) => {
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Symbol | State::Prefix) => Err(self.symbol_char_error(c)),
                Some(State::Escape) => {
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },

            Some(c) if c == sep => match self.top() {
                None => Ok(Some(Token::Equal)),
                Some(State::Str) => {
                    // re-read as Equal on the next call
                    self.pos -= c.len_utf8();
                    self.stack.pop();
                    Ok(Some(Token::Str(self.take_symval())))
                }
                Some(State::Bracket) => {
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Symbol | State::Prefix) => Err(self.symbol_char_error(c)),
                Some(State::Escape) => {
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },

            Some(c) if c == escape => match self.top() {
                None | Some(State::Str | State::Bracket) => {
                    self.stack.push(State::Escape);
                    Ok(None)
                }
                Some(State::Symbol | State::Prefix) => Err(self.symbol_char_error(c)),
                Some(State::Escape) => {
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },

            Some(c) if c == open => match self.top() {
                None | Some(State::Str) => {
                    self.stack.push(State::Bracket);
                    Ok(None)
                }
                Some(State::Bracket) => {
                    self.stack.push(State::Bracket);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Symbol) => Err(self.symbol_char_error(c)),
                Some(State::Prefix) => {
                    self.stack.pop();
                    self.stack.push(State::Symbol);
                    Ok(None)
                }
                Some(State::Escape) => {
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },

            Some(c) if c == close => match self.top() {
                None | Some(State::Str) => Err(self.fail(format!("premature '{c}'"))),
                Some(State::Bracket) => {
                    self.stack.pop();
                    if self.top() == Some(State::Bracket) {
                        // only the outermost bracket pair is stripped
                        self.buf.push(c);
                    } else {
                        self.push_if_empty(State::Str);
                    }
                    Ok(None)
                }
                Some(State::Symbol) => self.finish_symbol(resolver, prefix, open, close),
                Some(State::Prefix) => Err(self.symbol_char_error(c)),
                Some(State::Escape) => {
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },

            Some(c) if c == prefix => match self.top() {
                None | Some(State::Str | State::Bracket) => {
                    self.stack.push(State::Prefix);
                    Ok(None)
                }
                Some(State::Symbol | State::Prefix) => Err(self.symbol_char_error(c)),
                Some(State::Escape) => {
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },

            Some(c) => match self.top() {
                None => {
                    self.stack.push(State::Str);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Str | State::Bracket) => {
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Symbol) => {
                    if valid(c) {
                        self.sym_buf.push(c);
                        Ok(None)
                    } else {
                        Err(self.symbol_char_error(c))
                    }
                }
                Some(State::Prefix) => {
                    // a lone prefix followed by a name character starts an
                    // ordinary string, e.g. a symbol definition name
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(prefix);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Escape) => {
                    // escaping an ordinary character keeps the escape
                    self.stack.pop();
                    self.push_if_empty(State::Str);
                    self.buf.push(escape);
                    self.buf.push(c);
                    Ok(None)
                }
                Some(State::Failed) => unreachable!("scan after failure"),
            },
        }
    }

    /// A symbol reference just closed: look it up and splice the result (or
    /// its literal form when unknown) into the current buffer.
    fn finish_symbol(
        &mut self,
        resolver: &mut dyn Resolver,
        prefix: char,
        open: char,
        close: char,
    ) -> Result<Option<Token>, Error> {
        self.stack.pop();
        self.push_if_empty(State::Str);
        let symbol = std::mem::take(&mut self.sym_buf);
        match resolver.get(&symbol) {
            Err(err) => {
                self.stack.push(State::Failed);
                match err {
                    Error::SymbolCycle(_) => Err(err),
                    other => Err(Error::Syntax {
                        context: self.context(),
                        message: format!(r#"error resolving "{symbol}": {other}"#),
                    }),
                }
            }
            Ok(Some(sv)) => {
                if !sv.resolved {
                    self.resolved = false;
                }
                self.buf.push_str(&sv.text);
                Ok(None)
            }
            Ok(None) => {
                self.resolved = false;
                self.buf.push(prefix);
                self.buf.push(open);
                self.buf.push_str(&symbol);
                self.buf.push(close);
                Ok(None)
            }
        }
    }
}

/// Decode one UTF-8 character from the front of `bytes`.
fn decode_utf8(bytes: &[u8]) -> Option<(char, usize)> {
    let width = match bytes[0] {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => return None,
    };
    if bytes.len() < width {
        return None;
    }
    let s = std::str::from_utf8(&bytes[..width]).ok()?;
    s.chars().next().map(|c| (c, width))
}
