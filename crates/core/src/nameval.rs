//! Name-value pair extraction on top of the tokenizer.

use std::rc::Rc;

use crate::config::{Config, Special};
use crate::error::Error;
use crate::lexer::{SymVal, Token, Tokenizer};
use crate::symbols::Symtab;

/// Pulls `(name, value)` pairs out of an input. A pair with no name is a
/// standalone value. At most one token is buffered between calls.
pub(crate) struct NameVal {
    lexer: Tokenizer,
    sep: char,
    pending: Option<SymVal>,
}

impl NameVal {
    pub(crate) fn new(config: Rc<Config>, input: &[u8]) -> NameVal {
        let sep = config.special(Special::Separator);
        let mut lexer = Tokenizer::new(config);
        lexer.reset(input);
        NameVal {
            lexer,
            sep,
            pending: None,
        }
    }

    /// The next pair; `None` at end of input. The name half is `None` for a
    /// standalone value.
    pub(crate) fn next(
        &mut self,
        symbols: &mut Symtab,
    ) -> Result<Option<(Option<SymVal>, SymVal)>, Error> {
        let name = match self.pending.take() {
            Some(n) => n,
            None => match self.lexer.next(symbols)? {
                Token::End => return Ok(None),
                Token::Equal => {
                    return Err(Error::Syntax {
                        context: self.lexer.context(),
                        message: format!(r#""{}" unexpected"#, self.sep),
                    });
                }
                Token::Str(s) => s,
            },
        };

        // one string so far; a second string means the first was in fact a
        // standalone value
        match self
            .lexer
            .next(symbols)
            .map_err(|e| e.on_param(&name.text))?
        {
            Token::End => return Ok(Some((None, name))),
            Token::Str(s) => {
                self.pending = Some(s);
                return Ok(Some((None, name)));
            }
            Token::Equal => {}
        }

        // after name and separator, a value must follow
        match self
            .lexer
            .next(symbols)
            .map_err(|e| e.on_param(&name.text))?
        {
            Token::End => Err(Error::Syntax {
                context: self.lexer.context(),
                message: "premature end of input".to_string(),
            }),
            Token::Equal => Err(Error::Syntax {
                context: self.lexer.context(),
                message: format!(r#""{}" unexpected"#, self.sep),
            }),
            Token::Str(value) => Ok(Some((Some(name), value))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(input: &str) -> Vec<(Option<String>, String)> {
        let config = Rc::new(Config::new());
        let mut symbols = Symtab::new(Rc::clone(&config));
        let mut nv = NameVal::new(config, input.as_bytes());
        let mut out = Vec::new();
        while let Some((name, value)) = nv.next(&mut symbols).expect("pair") {
            out.push((name.map(|n| n.text), value.text));
        }
        out
    }

    fn error(input: &str) -> Error {
        let config = Rc::new(Config::new());
        let mut symbols = Symtab::new(Rc::clone(&config));
        let mut nv = NameVal::new(config, input.as_bytes());
        loop {
            match nv.next(&mut symbols) {
                Ok(None) => panic!("no error in {input:?}"),
                Ok(_) => {}
                Err(e) => return e,
            }
        }
    }

    fn named(n: &str, v: &str) -> (Option<String>, String) {
        (Some(n.to_string()), v.to_string())
    }

    fn standalone(v: &str) -> (Option<String>, String) {
        (None, v.to_string())
    }

    #[test]
    fn test_empty() {
        assert_eq!(pairs(""), vec![]);
        assert_eq!(pairs("  \t "), vec![]);
    }

    #[test]
    fn test_pairs() {
        assert_eq!(pairs("a=1"), vec![named("a", "1")]);
        assert_eq!(pairs("a=1 b=2"), vec![named("a", "1"), named("b", "2")]);
        assert_eq!(pairs("a = [1 2]"), vec![named("a", "1 2")]);
    }

    #[test]
    fn test_standalone_values() {
        assert_eq!(pairs("x"), vec![standalone("x")]);
        assert_eq!(pairs("x y"), vec![standalone("x"), standalone("y")]);
        assert_eq!(
            pairs("x a=1 y"),
            vec![standalone("x"), named("a", "1"), standalone("y")]
        );
    }

    #[test]
    fn test_leading_separator() {
        let e = error("= x");
        assert!(e.to_string().contains("unexpected"), "{e}");
    }

    #[test]
    fn test_double_separator() {
        let e = error("a = = b");
        assert!(e.to_string().contains("unexpected"), "{e}");
    }

    #[test]
    fn test_missing_value() {
        let e = error("a =");
        assert!(e.to_string().contains("premature end of input"), "{e}");
    }
}
