//! Built-in operators: conditional parsing, diagnostics dump, environment
//! import, file inclusion, macro expansion, symbol reset, and skip.
//!
//! Each operator parses its argument block with a sub-parser sharing the
//! parent's configuration and symbol table, then acts on the parent.
//! Sub-parser errors propagate and abort the enclosing parse.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write as _;
use std::path::{self, Path};
use std::rc::Rc;

use regex::Regex;

use crate::binding::{ListSlot, Slot};
use crate::config::{Op, Special};
use crate::error::Error;
use crate::lexer::SymVal;
use crate::nameval::NameVal;
use crate::parser::Parser;

const DEFAULT_EXTRACTOR: &str = r"\s*(\S+)\s*=\s*(\S+)\s*";

impl Parser {
    pub(crate) fn run_operator(&mut self, op: Op, value: &str) -> Result<(), Error> {
        match op {
            Op::Cond => self.op_cond(value),
            Op::Dump => self.op_dump(value),
            Op::Import => self.op_import(value),
            Op::Include => self.op_include(value),
            Op::Macro => self.op_macro(value),
            Op::Reset => self.op_reset(value),
            // balance of any quotes was already enforced by the tokenizer
            Op::Skip => Ok(()),
        }
    }

    /// `value` without the symbol prefix, when it starts with one.
    fn strip_symbol<'v>(&self, value: &'v str) -> Option<&'v str> {
        let prefix = self.config.special(Special::SymbolPrefix);
        let mut chars = value.chars();
        if chars.next() == Some(prefix) && !chars.as_str().is_empty() {
            Some(chars.as_str())
        } else {
            None
        }
    }

    /// `cond`: evaluate `if` as a symbol (defined?) or a parameter name
    /// (set at least once?), then parse `then` or the optional `else`.
    fn op_cond(&mut self, value: &str) -> Result<(), Error> {
        let cond_if = Slot::<String>::new();
        let cond_then = Slot::<String>::new();
        let cond_else = Slot::<String>::new();
        {
            let mut local = Parser::subparser(self);
            local.def("if", &cond_if).verbatim();
            local.def("then", &cond_then).verbatim();
            local.def("else", &cond_else).opt().verbatim();
            local.parse(value)?;
        }
        let cond_if = cond_if.get();
        let truth = match self.strip_symbol(&cond_if) {
            Some(sym) => self.symbols.borrow().contains(sym),
            None => match self.params.get(&cond_if) {
                Some(rec) => rec.borrow().count > 0,
                None => {
                    return Err(Error::Invocation(format!(
                        r#"cond/if: parameter "{cond_if}" not defined"#
                    )));
                }
            },
        };
        if truth {
            self.run_str(&cond_then.get())
        } else {
            let cond_else = cond_else.get();
            if cond_else.is_empty() {
                Ok(())
            } else {
                self.run_str(&cond_else)
            }
        }
    }

    /// `dump`: print the comment (if any), then one line per listed name or
    /// symbol on standard error. Symbols show an `R`/`U` resolution flag,
    /// unknown entries a `?`, the anonymous parameter prints as `[]`.
    fn op_dump(&mut self, value: &str) -> Result<(), Error> {
        let names = ListSlot::<String>::new();
        let comment = Slot::<String>::new();
        {
            let mut local = Parser::subparser(self);
            local.def("", &names).verbatim();
            local.def("comment", &comment).opt().verbatim();
            local.parse(value)?;
        }
        let mut err = std::io::stderr();
        let comment = comment.get();
        if !comment.is_empty() {
            let _ = writeln!(err, "{comment}");
        }
        for n in names.get() {
            if let Some(sym) = self.strip_symbol(&n) {
                match self.symbols.borrow().raw(sym) {
                    Some(sv) => {
                        let flag = if sv.resolved { 'R' } else { 'U' };
                        let _ = writeln!(err, "{n} {flag} {}", sv.text);
                    }
                    None => {
                        let _ = writeln!(err, "? {n}");
                    }
                }
            } else {
                let shown = if n.is_empty() { "[]" } else { n.as_str() };
                match self.params.get(&n) {
                    Some(rec) => {
                        let _ = writeln!(err, "{shown} {}", rec.borrow().binding.render());
                    }
                    None => {
                        let _ = writeln!(err, "? {shown}");
                    }
                }
            }
        }
        Ok(())
    }

    /// `import`: insert listed symbols from same-named environment
    /// variables; missing variables are silently skipped, existing symbols
    /// win.
    fn op_import(&mut self, value: &str) -> Result<(), Error> {
        let symbols = ListSlot::<String>::new();
        {
            let mut local = Parser::subparser(self);
            local.def("", &symbols).verbatim();
            local.parse(value)?;
        }
        for sym in symbols.get() {
            let Some(name) = self.strip_symbol(&sym) else {
                return Err(Error::Invocation(format!(
                    r#"import: "{sym}": symbol prefix missing ({})"#,
                    self.config.special(Special::SymbolPrefix)
                )));
            };
            if let Ok(v) = env::var(name) {
                self.symbols.borrow_mut().put(&sym, &v);
            }
        }
        Ok(())
    }

    /// `include`: basic mode parses a whole file; key-selection mode
    /// extracts name-value pairs line by line and feeds translated keys into
    /// the parent's assigner.
    fn op_include(&mut self, value: &str) -> Result<(), Error> {
        let filename = Slot::<String>::new();
        let keys = Slot::<String>::new();
        let extractor = Slot::<String>::new();
        {
            let mut local = Parser::subparser(self);
            local.def("", &filename);
            local.def("keys", &keys).opt().verbatim();
            local.def("extractor", &extractor).opt();
            local.parse(value)?;
        }
        let filename = filename.get();
        let canonical = path::absolute(&filename)?;
        if self.include_stack.contains(&canonical) {
            return Err(Error::Invocation(format!(
                r#"cyclical include dependency with file "{filename}""#
            )));
        }
        self.include_stack.insert(canonical.clone());
        let result = self.include_file(&canonical, &keys.get(), &extractor.get());
        self.include_stack.remove(&canonical);
        result
    }

    fn include_file(&mut self, path: &Path, keys: &str, extractor: &str) -> Result<(), Error> {
        if keys.is_empty() {
            if !extractor.is_empty() {
                return Err(Error::Invocation(
                    "include: specify extractor only with keys parameter".to_string(),
                ));
            }
            let mut data = fs::read(path)?;
            if data.starts_with(&[0xef, 0xbb, 0xbf]) {
                data.drain(..3);
            }
            return self.run_bytes(&data);
        }

        // key selection mode
        let pattern = if extractor.is_empty() {
            DEFAULT_EXTRACTOR
        } else {
            extractor
        };
        let re = Regex::new(pattern).map_err(|e| {
            Error::Invocation(format!(
                r#"include: compilation of extractor "{pattern}" failed: {e}"#
            ))
        })?;

        // keys parse as their own name-value stream: a standalone key
        // translates to itself, a pair maps a file key to another name
        let mut translations: BTreeMap<String, String> = BTreeMap::new();
        let mut pairs = NameVal::new(Rc::clone(&self.config), keys.as_bytes());
        loop {
            let next = {
                let mut symbols = self.symbols.borrow_mut();
                pairs.next(&mut symbols)?
            };
            let Some((name, val)) = next else { break };
            if !val.resolved {
                return Err(Error::Invocation(format!(
                    r#"include: cannot resolve key "{}""#,
                    val.text
                )));
            }
            match name {
                Some(n) => translations.insert(n.text, val.text),
                None => translations.insert(val.text.clone(), val.text),
            };
        }

        let content = fs::read_to_string(path)?;
        for line in content.lines() {
            let Some(caps) = re.captures(line) else {
                continue;
            };
            if caps.len() != 3 {
                continue;
            }
            let (Some(key), Some(val)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if let Some(translation) = translations.get(key.as_str()) {
                let name = SymVal::resolved(translation.clone());
                let value = SymVal::resolved(val.as_str());
                self.set_value(&name, &value)?;
            }
        }
        Ok(())
    }

    /// `macro`: look up each listed symbol's stored text without resolving
    /// it, and parse the space-joined concatenation in the parent.
    fn op_macro(&mut self, value: &str) -> Result<(), Error> {
        let symbols = ListSlot::<String>::new();
        {
            let mut local = Parser::subparser(self);
            local.def("", &symbols).verbatim();
            local.parse(value)?;
        }
        let mut code = Vec::new();
        for s in symbols.get() {
            let Some(sym) = self.strip_symbol(&s) else {
                return Err(Error::Invocation(format!(
                    r#"macro: "{s}": symbol prefix missing ({})"#,
                    self.config.special(Special::SymbolPrefix)
                )));
            };
            match self.symbols.borrow().raw(sym) {
                Some(sv) => code.push(sv.text.clone()),
                None => {
                    return Err(Error::Invocation(format!(
                        r#"macro: symbol "{s}" undefined"#
                    )));
                }
            }
        }
        let joined = code.join(" ");
        self.run_str(&joined).map_err(|e| {
            Error::Invocation(format!(r#"macro: parsing of "{joined}" failed: {e}"#))
        })
    }

    /// `reset`: remove each listed symbol; absent names are ignored.
    fn op_reset(&mut self, value: &str) -> Result<(), Error> {
        let symbols = ListSlot::<String>::new();
        {
            let mut local = Parser::subparser(self);
            local.def("", &symbols).verbatim();
            local.parse(value)?;
        }
        for s in symbols.get() {
            match self.strip_symbol(&s) {
                Some(sym) => self.symbols.borrow_mut().remove(sym),
                None => {
                    return Err(Error::Invocation(format!(
                        r#"reset: "{s}": symbol prefix missing ({})"#,
                        self.config.special(Special::SymbolPrefix)
                    )));
                }
            }
        }
        Ok(())
    }
}
