//! Parameter records and the chainable definition API.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;

use crate::binding::{Binding, ScanFn, TargetKind};
use crate::convert::FromArg;
use crate::error::Error;
use crate::parser::Parser;

/// One parameter definition, shared between its canonical name and all of
/// its synonyms.
pub(crate) struct ParamRecord {
    pub(crate) name: String,
    pub(crate) limit: usize,
    pub(crate) count: usize,
    pub(crate) verbatim: bool,
    pub(crate) binding: Box<dyn Binding>,
    pub(crate) splitter: Option<Regex>,
    pub(crate) doc: Vec<String>,
}

impl ParamRecord {
    pub(crate) fn kind(&self) -> TargetKind {
        self.binding.kind()
    }

    /// Split `value` around the splitter pattern, or return it whole.
    pub(crate) fn split(&self, value: &str) -> Vec<String> {
        match &self.splitter {
            Some(re) => re.split(value).map(str::to_string).collect(),
            None => vec![value.to_string()],
        }
    }

    /// Convert `values` and write them into the target. Map targets are
    /// driven by the parser, which re-parses the value as a nested
    /// name-value stream.
    pub(crate) fn parse_values(&mut self, values: &[String]) -> Result<(), Error> {
        match self.binding.kind() {
            TargetKind::Array => {
                let start = self.count;
                let total = start + values.len();
                if total > self.limit {
                    return Err(Error::Count(format!(
                        "too many values specified, expected {}",
                        self.limit
                    )));
                }
                // the slots are claimed even when a conversion fails below;
                // elements already assigned stay out of reach of later calls
                self.count = total;
                for (i, value) in values.iter().enumerate() {
                    self.binding
                        .assign_at(start + i, value)
                        .map_err(Error::Value)?;
                }
                Ok(())
            }
            TargetKind::List => {
                let start = self.count;
                let total = start + values.len();
                if self.limit > 0 && total > self.limit {
                    return Err(Error::Count(format!(
                        "{} value{} specified, at most {} expected",
                        total,
                        plural(total),
                        self.limit
                    )));
                }
                self.binding.grow(total);
                // slots are claimed even when a conversion fails below
                self.count = total;
                for (i, value) in values.iter().enumerate() {
                    self.binding
                        .assign_at(start + i, value)
                        .map_err(Error::Value)?;
                }
                Ok(())
            }
            TargetKind::Scalar => {
                // several pieces for a single value: the last one wins
                let value = values.last().map(String::as_str).unwrap_or("");
                self.binding.assign(value).map_err(Error::Value)?;
                self.count = 1;
                Ok(())
            }
            TargetKind::Map => unreachable!("map assignment is driven by the parser"),
        }
    }
}

/// Returns `""` for one, `"s"` otherwise.
pub(crate) fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Chainable handle refining a parameter definition, returned by
/// [`Parser::def`].
///
/// Every method panics when it detects an error: a bad definition is a bug
/// in the calling program, which cannot continue safely. Errors originating
/// from user input never panic; they are returned from the parse methods.
///
/// ```
/// use stanza_core::{Parser, Slot};
///
/// let verbose = Slot::<bool>::new();
/// let mut parser = Parser::new();
/// parser
///     .def("verbose", &verbose)
///     .aka("v")
///     .opt()
///     .doc(&["log every step"]);
/// ```
pub struct Param<'a> {
    pub(crate) parser: &'a mut Parser,
    pub(crate) rec: Rc<RefCell<ParamRecord>>,
}

impl Param<'_> {
    /// Register `alias` as a synonym for the parameter name.
    ///
    /// # Panics
    ///
    /// Panics if `alias` is already used, contains an invalid character, or
    /// names an operator.
    pub fn aka(self, alias: &str) -> Self {
        self.parser.register_alias(alias, &self.rec);
        self
    }

    /// Make a scalar parameter optional.
    ///
    /// # Panics
    ///
    /// Panics for sequence and map targets; use an unbounded [`crate::ListSlot`]
    /// to accept zero values.
    pub fn opt(self) -> Self {
        {
            let mut rec = self.rec.borrow_mut();
            match rec.kind() {
                TargetKind::Scalar => rec.limit = 0,
                TargetKind::Array | TargetKind::List => panic!(
                    r#"parameter "{}" is multi-valued and cannot be optional (hint: use an unbounded list instead)"#,
                    rec.name
                ),
                TargetKind::Map => panic!(
                    r#"parameter "{}" takes key-value pairs and cannot be optional"#,
                    rec.name
                ),
            }
        }
        self
    }

    /// Allow the value to keep unresolved symbol references.
    ///
    /// # Panics
    ///
    /// Panics unless the target stores strings.
    pub fn verbatim(self) -> Self {
        {
            let mut rec = self.rec.borrow_mut();
            if !rec.binding.takes_string() {
                let what = if rec.name.is_empty() {
                    "anonymous parameter".to_string()
                } else {
                    format!(r#"parameter "{}""#, rec.name)
                };
                panic!("{what} cannot be verbatim because its target cannot take a string");
            }
            rec.verbatim = true;
        }
        self
    }

    /// Replace the built-in converter with a custom scanner producing the
    /// element type `T`. Sequence targets run the scanner once per element;
    /// the verification pass also runs it against untouched defaults.
    ///
    /// # Panics
    ///
    /// Panics for map targets and when `T` is not the target's element type.
    pub fn scan<T, F>(self, f: F) -> Self
    where
        T: FromArg,
        F: Fn(&str) -> Result<T, String> + 'static,
    {
        {
            let mut rec = self.rec.borrow_mut();
            if rec.kind() == TargetKind::Map {
                panic!(
                    r#"cannot set a scan function for "{}" (not supported for map parameters)"#,
                    rec.name
                );
            }
            let f: ScanFn<T> = Rc::new(f);
            if let Err(e) = rec.binding.set_scan(Box::new(f)) {
                panic!(r#"scan function for parameter "{}" rejected: {e}"#, rec.name);
            }
        }
        self
    }

    /// Set a regular expression splitting incoming values into several.
    ///
    /// # Panics
    ///
    /// Panics unless the target is a sequence, or when the pattern does not
    /// compile.
    pub fn split(self, pattern: &str) -> Self {
        {
            let mut rec = self.rec.borrow_mut();
            match rec.kind() {
                TargetKind::Array | TargetKind::List => {}
                _ => panic!(
                    r#"cannot split values of parameter "{}" which is not multi-valued"#,
                    rec.name
                ),
            }
            match Regex::new(pattern) {
                Ok(re) => rec.splitter = Some(re),
                Err(e) => panic!(
                    r#"compilation of split expression "{pattern}" for parameter "{}" failed: {e}"#,
                    rec.name
                ),
            }
        }
        self
    }

    /// Attach help lines printed by [`Parser::print_doc`].
    pub fn doc(self, lines: &[&str]) -> Self {
        self.rec.borrow_mut().doc = lines.iter().map(|s| s.to_string()).collect();
        self
    }
}
