use crate::{
    compile::{
        parse::Parser,
        program::{Config, Environment, Library},
        Compiled,
    },
    function::{Function, Registry},
    log::{Error, ErrorKind},
    syntax::Builder,
    Program,
};
use log::debug;
use morel::Finder;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, RwLock},
};

/// Facilitates compiling templates, and provides storage for templates and
/// functions.
///
/// Programs compiled by an `Engine` can include and extend the templates
/// added to it.
pub struct Engine {
    /// Finds the delimiters of the [`Builder`] in template source.
    finder: Finder,
    /// Functions every program can call.
    registry: Arc<Registry>,
    /// Templates added with [`Engine::add_template`].
    library: Arc<Library>,
    config: Config,
}

impl Engine {
    /// Create a new [`Engine`] that uses the given [`Builder`] to find
    /// expressions, blocks and comments.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::{Builder, Engine};
    ///
    /// let engine = Engine::new(Builder::new().with_expression("<(", ")>"));
    /// let mut program = engine.compile("hello, <( name )>!").unwrap();
    /// program.set_value("name", "taylor");
    ///
    /// assert_eq!(program.render(), "hello, taylor!");
    /// ```
    pub fn new(builder: Builder) -> Self {
        Self {
            finder: Finder::new(builder.to_syntax()),
            registry: Arc::new(Registry::new()),
            library: Arc::new(RwLock::new(HashMap::new())),
            config: Config::default(),
        }
    }

    /// Use the given [`Builder`] to find expressions, blocks and comments in
    /// templates compiled after this call.
    #[inline]
    pub fn with_syntax(mut self, builder: Builder) -> Self {
        self.finder = Finder::new(builder.to_syntax());
        self
    }

    /// Enable or disable evaluating calls to constant functions with literal
    /// arguments during compilation. Enabled by default.
    #[inline]
    pub fn with_constant_folding(mut self, enabled: bool) -> Self {
        self.config.constant_folding = enabled;
        self
    }

    /// Set how deep includes and extends may nest while rendering.
    ///
    /// Rendering fails once this depth is passed, which is how templates that
    /// include or extend each other are caught. Defaults to 32.
    #[inline]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Compile a new [`Program`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when compilation fails, which most likely means the
    /// source contains invalid syntax.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::Engine;
    ///
    /// let engine = Engine::default();
    /// let program = engine.compile("hello, {{ name }}!");
    /// assert!(program.is_ok());
    /// ```
    #[inline]
    pub fn compile(&self, source: &str) -> Result<Program, Error> {
        Ok(Program::new(Arc::new(self.compile_named(None, source)?)))
    }

    /// Compile and store a new template with the given name.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a template with the given name already exists,
    /// or when compilation fails, which most likely means the source contains
    /// invalid syntax.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::Engine;
    ///
    /// let mut engine = Engine::default();
    /// let result = engine.add_template("template_name", "hello, {{ name }}!");
    /// assert!(result.is_ok());
    ///
    /// let second = engine.add_template("template_name", "hello again");
    /// assert!(second.is_err());
    /// ```
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), Error> {
        if self.program(name).is_some() {
            return Err(Error::build(format!(
                "template with name `{name}` already exists in engine, \
                overwrite it with `.add_template_must`"
            ))
            .with_kind(ErrorKind::Template)
            .with_name(name));
        }

        self.add_template_must(name, source)
    }

    /// Compile and store a new template with the given name.
    ///
    /// If a template with the given name already exists in the [`Engine`],
    /// it is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when compilation fails, which most likely means the
    /// source contains invalid syntax.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::Engine;
    ///
    /// let mut engine = Engine::default();
    /// engine.add_template_must("template_name", "hello, {{ name }}!").unwrap();
    /// engine.add_template_must("template_name", "hello again").unwrap();
    /// ```
    pub fn add_template_must(&mut self, name: &str, source: &str) -> Result<(), Error> {
        let compiled = self
            .compile_named(Some(name.to_owned()), source)
            .map_err(|error| error.with_name(name))?;

        debug!("adding template `{name}` to engine");
        self.library
            .write()
            .map_err(|_| poisoned())?
            .insert(name.to_owned(), Arc::new(compiled));

        Ok(())
    }

    /// Return a new [`Program`] for the named template.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::Engine;
    ///
    /// let mut engine = Engine::default();
    /// engine.add_template_must("template_name", "hello, {{ name }}!").unwrap();
    ///
    /// let program = engine.program("template_name");
    /// assert!(program.is_some());
    /// ```
    pub fn program(&self, name: &str) -> Option<Program> {
        let compiled = self.library.read().ok()?.get(name).cloned()?;

        // The read guard is released, Program::new reads the library again.
        Some(Program::new(compiled))
    }

    /// Remove the named template, returning true if it existed.
    ///
    /// Programs already created from the template keep working, but templates
    /// that include or extend it fail to render.
    pub fn remove_template(&mut self, name: &str) -> bool {
        let removed = self
            .library
            .write()
            .map(|mut library| library.remove(name).is_some())
            .unwrap_or(false);
        if removed {
            debug!("removed template `{name}` from engine");
        }

        removed
    }

    /// Add a [`Function`] every program compiled after this call can use.
    ///
    /// If a `Function` with the given name already exists in the [`Engine`],
    /// it is overwritten.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::{
    ///     function::{
    ///         serde::{json, Value},
    ///         Error,
    ///     },
    ///     Engine,
    /// };
    ///
    /// fn shout(args: &[Value]) -> Result<Value, Error> {
    ///     match args {
    ///         [Value::String(text)] => Ok(json!(format!("{}!", text.to_uppercase()))),
    ///         _ => Err(Error::build("function `shout` requires string input")
    ///             .with_help("use quotes to coerce data to string")),
    ///     }
    /// }
    ///
    /// let mut engine = Engine::default();
    /// engine.add_function("shout", shout);
    /// ```
    pub fn add_function<T>(&mut self, name: &str, function: T)
    where
        T: Function + 'static,
    {
        Arc::make_mut(&mut self.registry).insert(name, Arc::new(function), false);
    }

    /// Add a [`Function`], returning the [`Engine`] so additional methods
    /// may be chained.
    #[inline]
    pub fn with_function<T>(mut self, name: &str, function: T) -> Self
    where
        T: Function + 'static,
    {
        self.add_function(name, function);
        self
    }

    /// Add a [`Function`] whose result depends only on its arguments.
    ///
    /// Calls to a constant `Function` with literal arguments are evaluated
    /// once, during compilation.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::{
    ///     function::{serde::{json, Value}, Error},
    ///     Engine,
    /// };
    ///
    /// fn double(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(json!(args[0].as_i64().unwrap_or(0) * 2))
    /// }
    ///
    /// let engine = Engine::default().with_constant_function("double", double);
    /// let mut program = engine.compile("{{ double(21) }}").unwrap();
    ///
    /// assert_eq!(program.render(), "42");
    /// ```
    pub fn add_constant_function<T>(&mut self, name: &str, function: T)
    where
        T: Function + 'static,
    {
        Arc::make_mut(&mut self.registry).insert(name, Arc::new(function), true);
    }

    /// Add a constant [`Function`], returning the [`Engine`] so additional
    /// methods may be chained.
    #[inline]
    pub fn with_constant_function<T>(mut self, name: &str, function: T) -> Self
    where
        T: Function + 'static,
    {
        self.add_constant_function(name, function);
        self
    }

    /// Return true if a [`Function`] with the given name is available to
    /// every program, including the built-in functions.
    #[inline]
    pub fn has_function(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Parse and analyze the source.
    fn compile_named(&self, name: Option<String>, source: &str) -> Result<Compiled, Error> {
        debug!("compiling {}", name.as_deref().unwrap_or("template"));
        let (root, trim) = Parser::new(source, &self.finder).parse()?;
        let environment = Environment {
            registry: self.registry.clone(),
            library: Arc::downgrade(&self.library),
            config: self.config,
        };

        Ok(Compiled::new(
            name,
            source.to_owned(),
            root,
            trim,
            environment,
        ))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Builder::default())
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut templates = self
            .library
            .read()
            .map(|library| library.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        templates.sort();

        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("templates", &templates)
            .field("config", &self.config)
            .finish()
    }
}

/// Return an [`Error`] describing a library lock that a panicking thread
/// left behind.
fn poisoned() -> Error {
    Error::new(ErrorKind::Template, "template library is unavailable")
        .with_help("a thread panicked while adding or removing a template")
}
