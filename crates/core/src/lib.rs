//! stanza-core: a configuration-language parser that fills typed program
//! variables from textual input.
//!
//! Programs declare *parameters* bound to typed storage slots; users supply
//! text made of name-value pairs, standalone values, symbol definitions and
//! references, quoted groups, and operator invocations:
//!
//! ```text
//! name=demo  sizes=1:2:3  $base=/opt  dir=[$[base]/data]  include=[extra.conf]
//! ```
//!
//! Five special characters drive the syntax (by default `$ [ ] = \`): the
//! symbol prefix, the open and close quotes, the name-value separator, and
//! the escape. Symbol references resolve lazily with cycle detection, and
//! seven built-in operators (`cond`, `dump`, `import`, `include`, `macro`,
//! `reset`, `--`) parse their own argument blocks recursively.
//!
//! # Quick start
//!
//! ```
//! use stanza_core::{ListSlot, Parser, Slot};
//!
//! let name = Slot::<String>::new();
//! let sizes = ListSlot::<i64>::new();
//! let mut parser = Parser::new();
//! parser.def("name", &name);
//! parser.def("sizes", &sizes);
//! parser.parse("name=demo sizes=8 sizes=16").unwrap();
//! assert_eq!(name.get(), "demo");
//! assert_eq!(sizes.get(), vec![8, 16]);
//! ```
//!
//! Key types, re-exported at the crate root:
//!
//! - [`Parser`] / [`Param`] -- parameter definition and parsing
//! - [`Slot`], [`ArraySlot`], [`ListSlot`], [`MapSlot`] -- typed targets
//! - [`Config`], [`Special`], [`Op`] -- special characters and operator names
//! - [`FromArg`] -- the string-to-value conversion trait
//! - [`Error`] -- parse-time errors (definition mistakes panic instead)

pub mod binding;
pub mod config;
pub mod convert;
pub mod error;
mod lexer;
mod nameval;
mod operator;
mod param;
mod parser;
mod symbols;

pub use binding::{ArraySlot, Bindable, ListSlot, MapSlot, Slot};
pub use config::{Config, Op, Special};
pub use convert::FromArg;
pub use error::Error;
pub use param::Param;
pub use parser::Parser;
