//! Parser façade: parameter definitions, the parse loop, value assignment,
//! the post-parse verification pass, and documentation printing.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use crate::binding::{Bindable, TargetKind};
use crate::config::{validate, Config, Op, Special, SPECIAL_DESCRIPTIONS};
use crate::error::Error;
use crate::lexer::SymVal;
use crate::nameval::NameVal;
use crate::param::{plural, Param, ParamRecord};
use crate::symbols::Symtab;

/// Defines parameters and parses inputs into their targets.
///
/// Parameters are declared with [`Parser::def`] before parsing. Parsing may
/// be invoked repeatedly; the symbol table, value counters, and target
/// contents carry over between calls.
pub struct Parser {
    pub(crate) config: Rc<Config>,
    pub(crate) params: BTreeMap<String, Rc<RefCell<ParamRecord>>>,
    pub(crate) seq: Vec<String>,
    pub(crate) doc: Vec<String>,
    pub(crate) targets: HashSet<usize>,
    pub(crate) symbols: Rc<RefCell<Symtab>>,
    pub(crate) include_stack: HashSet<PathBuf>,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

impl Parser {
    /// A parser with the default configuration.
    pub fn new() -> Parser {
        Parser::with_config(&Config::new())
    }

    /// A parser with a snapshot of `config`; later changes to the caller's
    /// copy have no effect.
    pub fn with_config(config: &Config) -> Parser {
        let config = Rc::new(config.clone());
        Parser {
            symbols: Rc::new(RefCell::new(Symtab::new(Rc::clone(&config)))),
            config,
            params: BTreeMap::new(),
            seq: Vec::new(),
            doc: Vec::new(),
            targets: HashSet::new(),
            include_stack: HashSet::new(),
        }
    }

    /// A parser sharing `parent`'s configuration and symbol table, with its
    /// own parameter table. Operators parse their argument blocks through
    /// sub-parsers built this way.
    pub fn subparser(parent: &Parser) -> Parser {
        Parser {
            config: Rc::clone(&parent.config),
            symbols: Rc::clone(&parent.symbols),
            params: BTreeMap::new(),
            seq: Vec::new(),
            doc: Vec::new(),
            targets: HashSet::new(),
            include_stack: HashSet::new(),
        }
    }

    /// Define a parameter named `name` writing into `target`, and return a
    /// [`Param`] for chaining refinements.
    ///
    /// The empty name defines the *anonymous* parameter, which receives all
    /// standalone values. The value limit comes from the target shape:
    /// arrays take exactly their length, bounded lists at most their bound,
    /// everything else one value.
    ///
    /// # Panics
    ///
    /// Panics if the name is already used, contains a character other than a
    /// letter, a digit, a hyphen or an underscore, names an operator, or if
    /// the target is already bound to another parameter.
    pub fn def(&mut self, name: &str, target: &impl Bindable) -> Param<'_> {
        let binding = target.binding();
        if self.params.contains_key(name) {
            panic!(r#"parameter "{name}" already defined"#);
        }
        if self.targets.contains(&binding.target_id()) {
            panic!(r#"target for parameter "{name}" is already assigned"#);
        }
        if let Err(e) = validate(name) {
            panic!("{e}");
        }
        if self.config.operator(name).is_some() {
            panic!(r#"parameter name "{name}" is the name of an operator"#);
        }
        let limit = binding.initial_limit();
        let id = binding.target_id();
        let rec = Rc::new(RefCell::new(ParamRecord {
            name: name.to_string(),
            limit,
            count: 0,
            verbatim: false,
            binding,
            splitter: None,
            doc: Vec::new(),
        }));
        self.params.insert(name.to_string(), Rc::clone(&rec));
        self.targets.insert(id);
        self.seq.push(name.to_string());
        Param { parser: self, rec }
    }

    pub(crate) fn register_alias(&mut self, alias: &str, rec: &Rc<RefCell<ParamRecord>>) {
        if self.params.contains_key(alias) {
            panic!(r#"synonym "{alias}" clashes with an existing parameter name or synonym"#);
        }
        if let Err(e) = validate(alias) {
            panic!("{e}");
        }
        if self.config.operator(alias).is_some() {
            panic!(r#"synonym "{alias}" is the name of an operator"#);
        }
        self.params.insert(alias.to_string(), Rc::clone(rec));
        self.seq.push(alias.to_string());
    }

    /// Parse `text`, then run the verification pass.
    pub fn parse(&mut self, text: &str) -> Result<(), Error> {
        self.parse_bytes(text.as_bytes())
    }

    /// Parse raw bytes, then run the verification pass.
    pub fn parse_bytes(&mut self, input: &[u8]) -> Result<(), Error> {
        self.run_bytes(input)?;
        self.verify()
    }

    /// Parse all items joined with single spaces.
    pub fn parse_strings<S: AsRef<str>>(&mut self, items: &[S]) -> Result<(), Error> {
        let joined = items
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.parse(&joined)
    }

    pub(crate) fn run_str(&mut self, text: &str) -> Result<(), Error> {
        self.run_bytes(text.as_bytes())
    }

    /// The parse loop, without the verification pass; operators recurse
    /// through this.
    pub(crate) fn run_bytes(&mut self, input: &[u8]) -> Result<(), Error> {
        let mut pairs = NameVal::new(Rc::clone(&self.config), input);
        loop {
            let next = {
                let mut symbols = self.symbols.borrow_mut();
                pairs.next(&mut symbols)?
            };
            let Some((name, value)) = next else {
                return Ok(());
            };
            let (name, value) = match name {
                Some(name) => (name, value),
                None if self.is_standalone_bool(&value) => (value, SymVal::resolved("true")),
                None => {
                    if !self.params.contains_key("") {
                        return Err(Error::Invocation(format!(
                            r#"unexpected standalone value: "{}""#,
                            value.text
                        )));
                    }
                    (SymVal::resolved(""), value)
                }
            };
            match self.config.operator(&name.text) {
                Some(op) => self.run_operator(op, &value.text)?,
                None => self.set_value(&name, &value)?,
            }
        }
    }

    /// A standalone value naming a bool-target parameter is promoted to
    /// `(name, "true")`.
    fn is_standalone_bool(&self, value: &SymVal) -> bool {
        value.resolved
            && self
                .params
                .get(&value.text)
                .is_some_and(|p| p.borrow().binding.takes_bool())
    }

    /// Route one pair: symbol definition, parameter assignment, or the
    /// anonymous-map fallback.
    pub(crate) fn set_value(&mut self, name: &SymVal, value: &SymVal) -> Result<(), Error> {
        let sep = self.config.special(Special::Separator);
        if !name.resolved {
            return Err(Error::Unresolved(format!(
                r#"cannot resolve name in "{} {} {}""#,
                name.text, sep, value.text
            )));
        }
        if self.symbols.borrow_mut().put(&name.text, &value.text) {
            return Ok(());
        }
        let rec = match self.params.get(&name.text) {
            Some(rec) => Rc::clone(rec),
            None => {
                if let Some(anon) = self.params.get("") {
                    if anon.borrow().kind() == TargetKind::Map {
                        let anon = Rc::clone(anon);
                        let mut rec = anon.borrow_mut();
                        rec.binding
                            .assign_pair(&name.text, &value.text)
                            .map_err(Error::Value)?;
                        rec.count = 1;
                        return Ok(());
                    }
                }
                return Err(Error::Invocation(format!(
                    r#"parameter not defined: "{}""#,
                    name.text
                )));
            }
        };
        {
            let p = rec.borrow();
            if !value.resolved && !p.verbatim {
                return Err(Error::Unresolved(if name.text.is_empty() {
                    format!(r#"cannot resolve standalone value "{}""#, value.text)
                } else {
                    format!(
                        r#"cannot resolve value in "{} {} {}""#,
                        name.text, sep, value.text
                    )
                }));
            }
        }
        let pieces = rec.borrow().split(&value.text);
        if rec.borrow().kind() == TargetKind::Map {
            let canonical = rec.borrow().name.clone();
            self.assign_map(&rec, &pieces)
                .map_err(|e| e.on_param(&canonical))
        } else {
            let mut p = rec.borrow_mut();
            let canonical = p.name.clone();
            p.parse_values(&pieces).map_err(|e| e.on_param(&canonical))
        }
    }

    /// Re-parse the joined pieces as a nested name-value stream and insert
    /// each pair into the map target; standalone values get empty keys.
    fn assign_map(
        &mut self,
        rec: &Rc<RefCell<ParamRecord>>,
        pieces: &[String],
    ) -> Result<(), Error> {
        let joined = pieces.join(" ");
        let mut pairs = NameVal::new(Rc::clone(&self.config), joined.as_bytes());
        loop {
            let next = {
                let mut symbols = self.symbols.borrow_mut();
                pairs.next(&mut symbols)?
            };
            let Some((name, value)) = next else {
                return Ok(());
            };
            let key = name.map(|n| n.text).unwrap_or_default();
            let mut p = rec.borrow_mut();
            p.binding
                .assign_pair(&key, &value.text)
                .map_err(Error::Value)?;
            p.count = 1;
        }
    }

    /// Post-parse checks: exact array counts, mandatory scalars and maps,
    /// and custom-scanner validation of untouched defaults.
    fn verify(&mut self) -> Result<(), Error> {
        for name in &self.seq {
            let p = self.params[name].borrow();
            if *name != p.name {
                // synonyms share the canonical record
                continue;
            }
            match p.kind() {
                TargetKind::List => {
                    if p.binding.has_scan() {
                        for i in p.count..p.binding.current_len() {
                            p.binding.check_default(Some(i)).map_err(|e| {
                                Error::Count(format!("invalid default value at offset {i}: {e}"))
                                    .on_param(name)
                            })?;
                        }
                    }
                }
                TargetKind::Array => {
                    if p.count != p.limit {
                        return Err(Error::Count(format!(
                            "{} value{} specified but exactly {} expected",
                            p.count,
                            plural(p.count),
                            p.limit
                        ))
                        .on_param(name));
                    }
                }
                TargetKind::Scalar | TargetKind::Map => {
                    if p.count < 1 {
                        if p.limit != 0 {
                            return Err(
                                Error::Count("mandatory parameter not set".to_string())
                                    .on_param(name),
                            );
                        }
                        if p.binding.has_scan() {
                            p.binding.check_default(None).map_err(|e| {
                                Error::Count(format!("invalid default value: {e}")).on_param(name)
                            })?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Set command-level help lines.
    pub fn doc(&mut self, lines: &[&str]) {
        self.doc = lines.iter().map(|s| s.to_string()).collect();
    }

    /// Print the command help text, then one entry per parameter in
    /// definition order: synonyms, doc lines, and a type/detail line.
    ///
    /// Without [`Parser::doc`] lines, a default header is chosen from
    /// `usage` and whether any parameter is defined.
    pub fn print_doc(&self, w: &mut dyn io::Write, usage: Option<&str>) -> io::Result<()> {
        if !self.doc.is_empty() {
            for line in &self.doc {
                writeln!(w, "{line}")?;
            }
        } else {
            match (usage, self.seq.is_empty()) {
                (None, true) => writeln!(w, "the command takes no parameter")?,
                (None, false) => writeln!(w, "the command takes these parameters:")?,
                (Some(u), true) => writeln!(w, "Usage: {u}")?,
                (Some(u), false) => writeln!(w, "Usage: {u} parameters...\n\nParameters:")?,
            }
        }
        let synonyms = self.build_synonyms();
        for name in &self.seq {
            let p = self.params[name].borrow();
            if *name != p.name {
                continue;
            }
            let mut details = String::new();
            match p.kind() {
                TargetKind::List => {
                    if let Some(re) = &p.splitter {
                        details.push_str(&format!(", split: {}", re.as_str()));
                    }
                    if p.limit > 0 {
                        details.push_str(&format!(", 0-{} value{}", p.limit, plural(p.limit)));
                    } else {
                        details.push_str(", any number of values");
                    }
                    if p.binding.current_len() > 0 {
                        details.push_str(&format!(" (default: {})", p.binding.render()));
                    }
                }
                TargetKind::Array => {
                    if let Some(re) = &p.splitter {
                        details.push_str(&format!(", split: {}", re.as_str()));
                    }
                    details.push_str(&format!(", exactly {} value{}", p.limit, plural(p.limit)));
                }
                TargetKind::Map => {}
                TargetKind::Scalar => {
                    if p.limit == 0 {
                        details.push_str(&format!(", optional (default: {})", p.binding.render()));
                    }
                }
            }
            let info = format!("type: {}{}", p.binding.type_name(), details);
            let shown = synonyms.get(name.as_str()).cloned().unwrap_or_default();
            if shown.len() > 8 {
                writeln!(w, "  {shown}")?;
                for line in &p.doc {
                    writeln!(w, "  {:<8} {line}", "")?;
                }
                writeln!(w, "  {:<8} {info}", "")?;
            } else if !p.doc.is_empty() {
                writeln!(w, "  {shown:<8} {}", p.doc[0])?;
                for line in &p.doc[1..] {
                    writeln!(w, "  {:<8} {line}", "")?;
                }
                writeln!(w, "  {:<8} {info}", "")?;
            } else {
                writeln!(w, "  {shown:<8} {info}")?;
            }
        }
        Ok(())
    }

    /// Print the configured special characters and the operator table.
    /// Nothing is printed when no parameter is defined.
    pub fn print_config(&self, w: &mut dyn io::Write) -> io::Result<()> {
        if self.seq.is_empty() {
            return Ok(());
        }
        writeln!(w, "\nSpecial characters:")?;
        for which in [
            Special::SymbolPrefix,
            Special::OpenQuote,
            Special::CloseQuote,
            Special::Separator,
            Special::Escape,
        ] {
            writeln!(
                w,
                "  {:<8} {}",
                self.config.special(which),
                SPECIAL_DESCRIPTIONS[which as usize]
            )?;
        }
        writeln!(w, "\nBuilt-in operators:")?;
        for (op, text) in [
            (Op::Cond, "conditional parsing (if, then, else)"),
            (
                Op::Dump,
                "print parameters and symbols on standard error (comment)",
            ),
            (Op::Import, "import environment variables as symbols"),
            (
                Op::Include,
                "include a file or extract name-values (keys, extractor)",
            ),
            (Op::Macro, "expand symbols"),
            (Op::Reset, "remove symbols"),
            (Op::Skip, "do not parse the value (= comment out)"),
        ] {
            let name = self.config.op_name(op);
            if name.len() > 8 {
                writeln!(w, "  {name}")?;
                writeln!(w, "  {:<8} {text}", "")?;
            } else {
                writeln!(w, "  {name:<8} {text}")?;
            }
        }
        Ok(())
    }

    fn build_synonyms(&self) -> BTreeMap<String, String> {
        let mut synonyms: BTreeMap<String, String> = BTreeMap::new();
        for name in &self.seq {
            let p = self.params[name].borrow();
            if *name == p.name {
                let shown = if name.is_empty() {
                    "(nameless)".to_string()
                } else {
                    name.clone()
                };
                synonyms.insert(name.clone(), shown);
            } else if let Some(entry) = synonyms.get_mut(&p.name) {
                entry.push_str(", ");
                entry.push_str(name);
            }
        }
        synonyms
    }
}
