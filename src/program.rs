use crate::{
    compile::{program::Variables, Compiled},
    function::Function,
    locale::Locale,
    log::{error_missing_variable, Error, ErrorKind, INVALID_PROGRAM},
    pipe::Pipe,
    render::{Overrides, Renderer},
};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

/// The state a [`Program`] does not share with the [`Compiled`] program.
#[derive(Clone, Default)]
struct Overlay {
    /// Values by the position of the variable in the needed variables.
    values: Vec<Option<Value>>,
    functions: HashMap<String, Arc<dyn Function>>,
    locale: Locale,
    error: Option<Error>,
}

/// A renderable template.
///
/// A `Program` wraps a shared [`Compiled`] template along with the values,
/// functions and [`Locale`] it is rendered with. Cloning a `Program` is
/// cheap, the clone shares everything until one of them is changed.
///
/// # Examples
///
/// ```
/// use twine::Engine;
///
/// let engine = Engine::default();
/// let mut program = engine.compile("Hello, {{ name }}!").unwrap();
///
/// assert_eq!(program.needed_variables(), ["name"]);
/// assert!(!program.can_render());
///
/// program.set_value("name", "World");
/// assert_eq!(program.render(), "Hello, World!");
/// ```
#[derive(Clone, Default)]
pub struct Program {
    /// None when the Program was not created by compiling a template.
    compiled: Option<Arc<Compiled>>,
    /// Needed variables, resolved through the library when the Program
    /// was created.
    variables: Arc<Variables>,
    overlay: Arc<Overlay>,
}

impl Program {
    /// Create a new [`Program`] with no values bound.
    ///
    /// The variables of the templates it extends are looked up in the
    /// library now, so the order templates were added in does not matter.
    pub(crate) fn new(compiled: Arc<Compiled>) -> Self {
        let variables = compiled.needed_variables();
        let overlay = Overlay {
            values: vec![None; variables.len()],
            ..Default::default()
        };

        Self {
            compiled: Some(compiled),
            variables: Arc::new(variables),
            overlay: Arc::new(overlay),
        }
    }

    /// Create a new [`Program`] that uses the user functions and [`Locale`]
    /// of another.
    pub(crate) fn nested(compiled: Arc<Compiled>, parent: &Program) -> Self {
        let mut program = Self::new(compiled);
        let overlay = Arc::make_mut(&mut program.overlay);
        overlay.functions = parent.overlay.functions.clone();
        overlay.locale = parent.overlay.locale.clone();

        program
    }

    /// Return true if the [`Program`] wraps a compiled template.
    ///
    /// A default `Program` is not valid, and fails to render.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.compiled.is_some()
    }

    /// Return the name the template was added to the engine with.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.compiled.as_ref().and_then(|compiled| compiled.name())
    }

    /// Return the templates this [`Program`] extends or includes.
    #[inline]
    pub fn dependencies(&self) -> &[String] {
        self.compiled
            .as_ref()
            .map(|compiled| compiled.dependencies())
            .unwrap_or_default()
    }

    /// Return the variables that must be bound before the [`Program`] can be
    /// rendered, in the order they first appear.
    #[inline]
    pub fn needed_variables(&self) -> &[String] {
        self.variables.names()
    }

    /// Return the names of the blocks an extending template may replace.
    #[inline]
    pub fn blocks(&self) -> &[String] {
        self.compiled
            .as_ref()
            .map(|compiled| compiled.blocks())
            .unwrap_or_default()
    }

    /// Return the [`Compiled`] template.
    #[inline]
    pub fn compiled(&self) -> Option<&Compiled> {
        self.compiled.as_deref()
    }

    /// Return the value bound to the named variable.
    pub fn value(&self, name: &str) -> Option<&Value> {
        let index = self.index_of(name)?;
        self.value_at(index)
    }

    /// Return the position of the named variable.
    #[inline]
    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.index_of(name)
    }

    /// Return the value bound to the variable at the given position.
    #[inline]
    pub(crate) fn value_at(&self, index: usize) -> Option<&Value> {
        self.overlay.values.get(index).and_then(Option::as_ref)
    }

    /// Bind a value to the named variable.
    ///
    /// Returns false, and does nothing, if the template does not use a
    /// variable with that name.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::compile;
    ///
    /// let mut program = compile("{{ name }}").unwrap();
    ///
    /// assert!(program.set_value("name", "taylor"));
    /// assert!(!program.set_value("age", 30));
    /// ```
    pub fn set_value<T>(&mut self, name: &str, value: T) -> bool
    where
        T: Into<Value>,
    {
        let Some(index) = self.index_of(name) else {
            return false;
        };

        match Arc::make_mut(&mut self.overlay).values.get_mut(index) {
            Some(slot) => {
                *slot = Some(value.into());
                true
            }
            None => false,
        }
    }

    /// Bind a value to the named variable, returning the [`Program`].
    ///
    /// An unknown name is ignored, as with [`Program::set_value`].
    #[inline]
    pub fn with_value<T>(mut self, name: &str, value: T) -> Self
    where
        T: Into<Value>,
    {
        self.set_value(name, value);
        self
    }

    /// Serialize the value and bind it to the named variable.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the value cannot be serialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::compile;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct User {
    ///     name: String,
    /// }
    ///
    /// let mut program = compile("{{ user.name }}").unwrap();
    /// let user = User { name: "taylor".into() };
    ///
    /// assert_eq!(program.set_serialized("user", &user), Ok(true));
    /// assert_eq!(program.render(), "taylor");
    /// ```
    pub fn set_serialized<T>(&mut self, name: &str, value: &T) -> Result<bool, Error>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(|error| {
            Error::new(ErrorKind::Value, "invalid value").with_help(format!(
                "value for variable `{name}` cannot be serialized: {error}"
            ))
        })?;

        Ok(self.set_value(name, value))
    }

    /// Remove the value bound to the named variable.
    ///
    /// Returns true if a value was bound.
    pub fn unset_value(&mut self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };
        if self.value_at(index).is_none() {
            return false;
        }

        match Arc::make_mut(&mut self.overlay).values.get_mut(index) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    /// Return the [`Locale`] numbers are printed with.
    #[inline]
    pub fn locale(&self) -> &Locale {
        &self.overlay.locale
    }

    /// Set the [`Locale`] numbers are printed with.
    pub fn set_locale(&mut self, locale: Locale) {
        Arc::make_mut(&mut self.overlay).locale = locale;
    }

    /// Add a [`Function`] only this [`Program`] can call.
    ///
    /// Returns false, and does nothing, if the name belongs to a function
    /// registered on the engine, including the built-in functions.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::{
    ///     compile,
    ///     function::{serde::{json, Value}, Error},
    /// };
    ///
    /// fn shout(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(json!(format!("{}!", args[0].as_str().unwrap_or_default())))
    /// }
    ///
    /// let mut program = compile("{{ name | shout }}").unwrap();
    /// assert!(program.add_function("shout", shout));
    /// assert!(!program.add_function("upper", shout));
    ///
    /// program.set_value("name", "hey");
    /// assert_eq!(program.render(), "hey!");
    /// ```
    pub fn add_function<T>(&mut self, name: &str, function: T) -> bool
    where
        T: Function + 'static,
    {
        let registered = self
            .compiled
            .as_ref()
            .map(|compiled| compiled.environment().registry.contains(name))
            .unwrap_or(false);
        if registered {
            debug!("ignoring user function `{name}`, the name is registered on the engine");
            return false;
        }

        Arc::make_mut(&mut self.overlay)
            .functions
            .insert(name.to_owned(), Arc::new(function));

        true
    }

    /// Return true if a [`Function`] with the given name was added to this
    /// [`Program`].
    ///
    /// Functions registered on the engine are not included.
    #[inline]
    pub fn has_function(&self, name: &str) -> bool {
        self.overlay.functions.contains_key(name)
    }

    /// Return the named user [`Function`].
    #[inline]
    pub(crate) fn function(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.overlay.functions.get(name)
    }

    /// Return true if every needed variable has a value.
    ///
    /// Otherwise an [`Error`] naming the first variable without a value is
    /// available from [`Program::last_error`].
    pub fn can_render(&mut self) -> bool {
        self.clear_error();
        match self.check().map(|_| ()) {
            Ok(()) => true,
            Err(error) => {
                self.set_error(error);
                false
            }
        }
    }

    /// Render the [`Program`].
    ///
    /// Returns an empty string if rendering fails, the cause is available
    /// from [`Program::last_error`].
    pub fn render(&mut self) -> String {
        self.clear_error();
        match self.try_render() {
            Ok(output) => output,
            Err(error) => {
                debug!("failed to render {}: {error}", self.name().unwrap_or("program"));
                self.set_error(error);
                String::new()
            }
        }
    }

    /// Render the [`Program`].
    ///
    /// Unlike [`Program::render`], the error is returned rather than kept.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error`] encountered, output written before the
    /// error is discarded.
    pub fn try_render(&self) -> Result<String, Error> {
        let compiled = self.check()?;
        let mut buffer = String::with_capacity(compiled.source().len());
        let overrides = Overrides::new();

        Renderer::new(self, compiled, &overrides, 0)
            .render(&mut Pipe::new(&mut buffer, self.locale()))?;

        Ok(buffer)
    }

    /// Return the [`Error`] from the last call to [`Program::render`] or
    /// [`Program::can_render`].
    #[inline]
    pub fn last_error(&self) -> Option<&Error> {
        self.overlay.error.as_ref()
    }

    /// Return the [`Compiled`] template if every needed variable has a value.
    pub(crate) fn check(&self) -> Result<&Arc<Compiled>, Error> {
        let Some(compiled) = &self.compiled else {
            return Err(Error::new(ErrorKind::Template, INVALID_PROGRAM)
                .with_help("create programs with `Engine::compile` or `Engine::program`"));
        };

        let unbound = self
            .variables
            .names()
            .iter()
            .zip(&self.overlay.values)
            .find(|(_, value)| value.is_none());
        if let Some((name, _)) = unbound {
            return Err(error_missing_variable(name).with_template(compiled.name()));
        }

        Ok(compiled)
    }

    fn set_error(&mut self, error: Error) {
        Arc::make_mut(&mut self.overlay).error = Some(error);
    }

    /// Remove the last error, without copying a shared overlay when there is
    /// nothing to remove.
    fn clear_error(&mut self) {
        if self.overlay.error.is_some() {
            Arc::make_mut(&mut self.overlay).error = None;
        }
    }
}

impl Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: Vec<(&String, &Option<Value>)> = self
            .needed_variables()
            .iter()
            .zip(&self.overlay.values)
            .collect();
        let mut functions: Vec<&String> = self.overlay.functions.keys().collect();
        functions.sort();

        f.debug_struct("Program")
            .field("name", &self.name())
            .field("values", &values)
            .field("functions", &functions)
            .field("locale", &self.overlay.locale)
            .field("error", &self.overlay.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Program;
    use crate::{compile, log::ErrorKind, Engine, Locale};
    use serde_json::{json, Value};

    #[test]
    fn test_default_invalid() {
        let mut program = Program::default();

        assert!(!program.is_valid());
        assert!(program.needed_variables().is_empty());
        assert!(!program.set_value("name", 1));
        assert_eq!(program.render(), "");
        assert_eq!(
            program.last_error().map(|error| error.kind()),
            Some(ErrorKind::Template)
        );
    }

    #[test]
    fn test_set_value_needed_only() {
        let mut program = compile("{{ a }}{{ b.c }}{% for x in xs %}{{ x }}{% endfor %}").unwrap();

        assert_eq!(program.needed_variables(), ["a", "b", "xs"]);
        assert!(program.set_value("a", 1));
        assert!(!program.set_value("x", 1));
        assert!(!program.set_value("loop", 1));
        assert_eq!(program.value("a"), Some(&json!(1)));
        assert_eq!(program.value("b"), None);
    }

    #[test]
    fn test_unset_value() {
        let mut program = compile("{{ a }}").unwrap().with_value("a", "x");

        assert!(program.unset_value("a"));
        assert!(!program.unset_value("a"));
        assert!(!program.unset_value("z"));
        assert!(!program.can_render());
    }

    #[test]
    fn test_clone_isolated() {
        let mut first = compile("{{ a }}").unwrap().with_value("a", 1);
        let mut second = first.clone();
        second.set_value("a", 2);
        second.set_locale(Locale::new("de", ','));

        assert_eq!(first.value("a"), Some(&json!(1)));
        assert_eq!(first.locale(), &Locale::default());
        assert_eq!(first.render(), "1");
        assert_eq!(second.render(), "2");
    }

    #[test]
    fn test_can_render_names_first_unbound() {
        let mut program = compile("{{ a }}{{ b }}{{ c }}").unwrap().with_value("b", 1);

        assert!(!program.can_render());
        let error = program.last_error().unwrap();
        assert_eq!(error.kind(), ErrorKind::MissingVariable);
        assert_eq!(error.message(), "missing variable `a`");
        assert!(error.help().unwrap().contains("`a`"));

        program.set_value("a", 1);
        program.set_value("c", 1);
        assert!(program.can_render());
        assert!(program.last_error().is_none());
    }

    #[test]
    fn test_render_resets_error() {
        let mut program = compile("{{ 1 / n }}").unwrap().with_value("n", 0);

        assert_eq!(program.render(), "");
        assert_eq!(
            program.last_error().map(|error| error.kind()),
            Some(ErrorKind::Type)
        );

        program.set_value("n", 2);
        assert_eq!(program.render(), "0.5");
        assert!(program.last_error().is_none());
    }

    #[test]
    fn test_add_function() {
        let mut program = compile("{{ twice(2) }}").unwrap();

        assert!(!program.has_function("twice"));
        assert!(program.add_function("twice", |args: &[Value]| -> Result<Value, crate::Error> {
            Ok(json!(args[0].as_i64().unwrap_or(0) * 2))
        }));
        assert!(program.has_function("twice"));
        assert!(!program.add_function("lower", |_: &[Value]| -> Result<Value, crate::Error> {
            Ok(Value::Null)
        }));
        assert!(!program.has_function("lower"));
        assert_eq!(program.render(), "4");
    }

    #[test]
    fn test_set_serialized() {
        #[derive(serde::Serialize)]
        struct Item {
            name: &'static str,
            count: u32,
        }

        let mut program = compile("{{ item.name }}={{ item.count }}").unwrap();
        let result = program.set_serialized("item", &Item { name: "a", count: 2 });

        assert_eq!(result, Ok(true));
        assert_eq!(program.render(), "a=2");
    }

    #[test]
    fn test_error_named() {
        let mut engine = Engine::default();
        engine.add_template("page", "{{ a }}").unwrap();
        let mut program = engine.program("page").unwrap();

        assert!(!program.can_render());
        assert_eq!(program.last_error().and_then(|e| e.name()), Some("page"));
    }

    #[test]
    fn test_send_sync() {
        fn is_send_sync<T: Send + Sync>() {}
        is_send_sync::<Program>();
    }
}
