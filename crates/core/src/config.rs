//! Special characters, operator names, and name validity rules.
//!
//! A [`Config`] bundles the five special characters with the operator-name
//! table. Parsers snapshot the configuration at construction, so a `Config`
//! can be tweaked and reused without affecting parsers already built.

use std::collections::BTreeMap;

use unicode_general_category::{get_general_category, GeneralCategory};

/// The five configurable special characters, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    SymbolPrefix,
    OpenQuote,
    CloseQuote,
    Separator,
    Escape,
}

pub(crate) const SPECIAL_DESCRIPTIONS: [&str; 5] = [
    "symbol prefix",
    "open quote",
    "close quote",
    "separator",
    "escape",
];

/// The seven built-in operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    Cond,
    Dump,
    Import,
    Include,
    Macro,
    Reset,
    Skip,
}

/// Parser configuration: special characters and operator names.
#[derive(Debug, Clone)]
pub struct Config {
    specials: [char; 5],
    operators: BTreeMap<String, Op>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    /// Default configuration: specials `$ [ ] = \` and operator names
    /// `cond`, `dump`, `import`, `include`, `macro`, `reset`, and `--`.
    pub fn new() -> Config {
        let mut operators = BTreeMap::new();
        operators.insert("cond".to_string(), Op::Cond);
        operators.insert("dump".to_string(), Op::Dump);
        operators.insert("import".to_string(), Op::Import);
        operators.insert("include".to_string(), Op::Include);
        operators.insert("macro".to_string(), Op::Macro);
        operators.insert("reset".to_string(), Op::Reset);
        operators.insert("--".to_string(), Op::Skip);
        Config {
            specials: ['$', '[', ']', '=', '\\'],
            operators,
        }
    }

    /// Configuration from a 5-character string giving the symbol prefix,
    /// open quote, close quote, separator, and escape, in that order.
    ///
    /// # Panics
    ///
    /// Panics unless `s` holds exactly 5 pairwise-distinct characters, each
    /// valid as a special (graphic, not whitespace, not valid in a name).
    pub fn from_specials(s: &str) -> Config {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 5 {
            panic!("expected 5 distinct special characters and not: {s}");
        }
        for (i, &c) in chars.iter().enumerate() {
            if !valid_special(c) {
                panic!(
                    "cannot use '{c}' as {}: not a valid special character",
                    SPECIAL_DESCRIPTIONS[i]
                );
            }
            if chars.iter().filter(|&&d| d == c).count() > 1 {
                panic!("expected 5 distinct special characters and not: {s}");
            }
        }
        let mut config = Config::new();
        config.specials = [chars[0], chars[1], chars[2], chars[3], chars[4]];
        config
    }

    /// The character currently playing the role `which`.
    pub fn special(&self, which: Special) -> char {
        self.specials[which as usize]
    }

    /// Change one special character.
    ///
    /// # Panics
    ///
    /// Panics if `ch` is not a valid special or is already used by another
    /// special.
    pub fn set_special(&mut self, which: Special, ch: char) {
        if !valid_special(ch) {
            panic!(
                "cannot use '{ch}' as {}: not a valid special character",
                SPECIAL_DESCRIPTIONS[which as usize]
            );
        }
        if self
            .specials
            .iter()
            .enumerate()
            .any(|(i, &c)| i != which as usize && c == ch)
        {
            panic!(
                "cannot use '{ch}' as {}: already used",
                SPECIAL_DESCRIPTIONS[which as usize]
            );
        }
        self.specials[which as usize] = ch;
    }

    /// The current name of operator `op`.
    pub fn op_name(&self, op: Op) -> &str {
        self.operators
            .iter()
            .find(|(_, &o)| o == op)
            .map(|(n, _)| n.as_str())
            .expect("operator table holds all operators")
    }

    /// Rename an operator.
    ///
    /// # Panics
    ///
    /// Panics if `name` contains a character invalid in a name or is already
    /// used by another operator.
    pub fn set_op_name(&mut self, op: Op, name: &str) {
        if let Err(e) = validate(name) {
            panic!("{e}");
        }
        if self.operators.contains_key(name) {
            panic!(r#"cannot set name of {op:?} to "{name}": name already used"#);
        }
        let old = self.op_name(op).to_string();
        self.operators.remove(&old);
        self.operators.insert(name.to_string(), op);
    }

    /// The operator registered under `name`, if any.
    pub(crate) fn operator(&self, name: &str) -> Option<Op> {
        self.operators.get(name).copied()
    }
}

/// True iff `c` is valid in a parameter or symbol name: a letter, a digit,
/// a hyphen, or an underscore.
pub(crate) fn valid(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// True iff `c` can serve as a special character: graphic, not whitespace,
/// not valid in a name.
pub(crate) fn valid_special(c: char) -> bool {
    !valid(c) && !c.is_whitespace() && graphic(c)
}

/// True iff `c` is graphic: a letter, mark, number, punctuation, symbol, or
/// space separator. Control, format, surrogate, private-use, unassigned,
/// and line/paragraph separator codepoints are not graphic.
fn graphic(c: char) -> bool {
    !matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::Surrogate
            | GeneralCategory::PrivateUse
            | GeneralCategory::Unassigned
            | GeneralCategory::LineSeparator
            | GeneralCategory::ParagraphSeparator
    )
}

/// Check that every character of `name` is valid in a name.
pub(crate) fn validate(name: &str) -> Result<(), String> {
    for c in name.chars() {
        if !valid(c) {
            return Err(format!(
                r#""{name}" cannot be used as a name because it includes the character '{c}'"#
            ));
        }
    }
    Ok(())
}
