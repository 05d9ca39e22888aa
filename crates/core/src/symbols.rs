//! Lazy symbol table with cycle detection.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::config::{validate, Config, Special};
use crate::error::Error;
use crate::lexer::{Resolver, SymVal, Token, Tokenizer};

/// Symbol storage. Entries are inserted unresolved and resolved on first
/// lookup; resolving one symbol may recursively resolve others through the
/// tokenizer. Insertion is first-wins: an existing entry is never replaced.
pub(crate) struct Symtab {
    config: Rc<Config>,
    table: BTreeMap<String, SymVal>,
    cycle: BTreeSet<String>,
}

impl Symtab {
    pub(crate) fn new(config: Rc<Config>) -> Symtab {
        Symtab {
            config,
            table: BTreeMap::new(),
            cycle: BTreeSet::new(),
        }
    }

    /// Insert `value` under `name` if `name` has the shape of a symbol
    /// definition: the symbol prefix followed by a valid name that does not
    /// itself start with the prefix. Returns whether the shape matched. An
    /// existing entry is left untouched (first wins).
    pub(crate) fn put(&mut self, name: &str, value: &str) -> bool {
        let prefix = self.config.special(Special::SymbolPrefix);
        let mut chars = name.chars();
        if chars.next() != Some(prefix) {
            return false;
        }
        let rest = chars.as_str();
        match rest.chars().next() {
            Some(c) if c != prefix && validate(rest).is_ok() => {
                self.table
                    .entry(rest.to_string())
                    .or_insert_with(|| SymVal::unresolved(value));
                true
            }
            _ => false,
        }
    }

    /// The stored entry for `name`, without resolving it.
    pub(crate) fn raw(&self, name: &str) -> Option<&SymVal> {
        self.table.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Remove a symbol; absent names are ignored.
    pub(crate) fn remove(&mut self, name: &str) {
        self.table.remove(name);
    }

    fn resolve(&mut self, symbol: &str) -> Result<Option<SymVal>, Error> {
        let stored = match self.table.get(symbol) {
            None => return Ok(None),
            Some(sv) => sv.clone(),
        };
        if stored.resolved {
            return Ok(Some(stored));
        }

        // scan the stored text wrapped in one quote pair, with this very
        // table as the resolver, so embedded whitespace stays one token
        let open = self.config.special(Special::OpenQuote);
        let close = self.config.special(Special::CloseQuote);
        let quoted = format!("{open}{}{close}", stored.text);
        let mut lexer = Tokenizer::new(Rc::clone(&self.config));
        lexer.reset(quoted.as_bytes());
        match lexer.next(self)? {
            Token::Str(sv) => {
                if let Some(entry) = self.table.get_mut(symbol) {
                    entry.text = sv.text.clone();
                    entry.resolved = sv.resolved;
                }
                Ok(Some(sv))
            }
            _ => Err(Error::Invocation(format!("recursive scan failed: {quoted}"))),
        }
    }
}

impl Resolver for Symtab {
    /// Resolve `name` transitively. Returns `None` for unknown symbols and
    /// an error when the resolution chain loops back on itself.
    fn get(&mut self, name: &str) -> Result<Option<SymVal>, Error> {
        if self.cycle.contains(name) {
            return Err(Error::SymbolCycle(name.to_string()));
        }
        self.cycle.insert(name.to_string());
        let result = self.resolve(name);
        self.cycle.remove(name);
        result
    }
}
