//! Contains the [`Function`] trait, and types useful for creating and using
//! functions.
//!
//! A `Function` is any type which can be called from a template, either
//! directly or as a filter. Any struct that implements the `Function` trait,
//! or function matching the [`call`][`Function::call`] method, can be
//! registered on an [`Engine`][`crate::Engine`] or on a single
//! [`Program`][`crate::Program`].
//!
//! ## Examples
//!
//! These two expressions both call `upper` with "taylor" as the first argument:
//!
//! ```html
//! {{ upper(name) }}
//! {{ name | upper }}
//! ```
//!
//! When called as a filter, the value to the left of the pipe becomes the first
//! argument and any arguments in parentheses follow it.
//!
//! We'll create a function that repeats a string:
//!
//! ```
//! use twine::{
//!     function::{
//!         serde::{json, Value},
//!         Error,
//!     },
//!     Engine,
//! };
//!
//! fn repeat(args: &[Value]) -> Result<Value, Error> {
//!     match args {
//!         [Value::String(text), Value::Number(count)] => {
//!             let count = count.as_u64().unwrap_or(0) as usize;
//!             Ok(json!(text.repeat(count)))
//!         }
//!         _ => Err(Error::build("function `repeat` requires a string and a count")
//!             .with_help("try `\"ab\" | repeat(2)`")),
//!     }
//! }
//!
//! let engine = Engine::default().with_function("repeat", repeat);
//! let mut program = engine.compile("{{ word | repeat(3) }}").unwrap();
//! program.set_value("word", "ha");
//!
//! assert_eq!(program.render(), "hahaha");
//! ```
//!
//! If you return an [`Error`] without a location, it is pointed at the name of the
//! function in the template. If you were to pass a number to the function and
//! print the error with `{:#}`, you would see:
//!
//! ```text
//! error: function `repeat` requires a string and a count
//!  --> ?:1:11
//!   |
//! 1 | {{ word | repeat(3) }}
//!   |           ^^^^^^
//!   |
//!  = help: try `"ab" | repeat(2)`
//! ```
mod builtin;

pub mod serde {
    //! Contains types from `serde_json`.
    pub use serde_json::*;
}

pub use crate::log::Error;

use serde_json::Value;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

/// Describes a type which can be called from a template.
pub trait Function: Sync + Send {
    /// Execute the function with the given arguments and return a new Value
    /// as output.
    fn call(&self, args: &[Value]) -> Result<Value, Error>;
}

/// Allows assignment of any function matching the signature of `call` as a
/// `Function`, instead of requiring a struct be created.
impl<F> Function for F
where
    F: Fn(&[Value]) -> Result<Value, Error> + Sync + Send,
{
    fn call(&self, args: &[Value]) -> Result<Value, Error> {
        self(args)
    }
}

/// A registered [`Function`].
#[derive(Clone)]
struct Entry {
    function: Arc<dyn Function>,
    /// True when the result depends only on the arguments, which allows
    /// calls with literal arguments to be evaluated during compilation.
    constant: bool,
}

/// The functions an [`Engine`][`crate::Engine`] makes available to every
/// program it compiles.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    /// Create a new [`Registry`] containing the built-in functions.
    pub fn new() -> Self {
        let mut registry = Self::default();
        for (name, function) in builtin::all() {
            registry.insert(name, Arc::new(function), true);
        }

        registry
    }

    /// Add a [`Function`], replacing any function with the same name.
    pub fn insert(&mut self, name: &str, function: Arc<dyn Function>, constant: bool) {
        self.entries
            .insert(name.to_owned(), Entry { function, constant });
    }

    /// Return the named [`Function`].
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.entries.get(name).map(|entry| &entry.function)
    }

    /// Return true if a [`Function`] with the given name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Return true if the named [`Function`] is registered as constant.
    pub fn is_constant(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|entry| entry.constant)
            .unwrap_or(false)
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();

        f.debug_struct("Registry").field("names", &names).finish()
    }
}
