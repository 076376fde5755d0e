//! Twine - Template Compiler
//!
//! Templates are compiled once into an immutable program, then rendered any
//! number of times through cheap [`Program`] handles that carry their own
//! values, functions and [`Locale`].
//!
//! ```
//! use twine::Engine;
//!
//! let mut engine = Engine::default();
//! engine
//!     .add_template("list", "{% for x in items %}{{ x }},{% endfor %}")
//!     .unwrap();
//!
//! let mut program = engine.program("list").unwrap();
//! program.set_value("items", vec![1, 2, 3]);
//!
//! assert_eq!(program.render(), "1,2,3,");
//! ```
mod compile;
mod engine;
pub mod function;
mod locale;
mod log;
mod pipe;
mod program;
mod region;
mod render;
pub mod syntax;

pub use crate::log::{Error, ErrorKind};
pub use compile::{compile, Compiled, TrimMode, TrimTable};
pub use engine::Engine;
pub use function::Function;
pub use locale::Locale;
pub use program::Program;
pub use region::{Location, Region};
pub use syntax::{Builder, Marker};
