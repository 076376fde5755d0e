mod operators;

use self::operators::{apply, is_truthy, negate};
use crate::{
    compile::{
        parse::{
            tree::{Expression, Extends, Include, LoopVariables, Scope, Text, Tree, Variable},
            trim::TrimMode,
        },
        Compiled, Operator, Unary,
    },
    function::Function,
    log::{
        error_missing_template, error_write, Error, ErrorKind, INCOMPATIBLE_TYPES,
        UNBOUND_VARIABLE, UNKNOWN_FILTER, UNKNOWN_FUNCTION,
    },
    pipe::Pipe,
    region::Region,
    Program,
};
use log::trace;
use serde_json::{json, Value};
use std::{borrow::Cow, collections::HashMap, fmt::Write, sync::Arc};

/// Block overrides collected from extending templates, by block name.
///
/// Each block is rendered from the [`Program`] that defines it.
pub(crate) type Overrides = HashMap<String, Program>;

/// Walks the tree of a [`Compiled`] program and writes the output.
pub(crate) struct Renderer<'program> {
    /// The instance that values and user functions are read from.
    program: &'program Program,
    compiled: &'program Compiled,
    overrides: &'program Overrides,
    /// Values bound by the enclosing loops, innermost last.
    locals: Vec<(String, Value)>,
    /// How many includes and extends led to this Renderer.
    depth: usize,
}

impl<'program> Renderer<'program> {
    /// Create a new Renderer.
    pub fn new(
        program: &'program Program,
        compiled: &'program Compiled,
        overrides: &'program Overrides,
        depth: usize,
    ) -> Self {
        Self {
            program,
            compiled,
            overrides,
            locals: vec![],
            depth,
        }
    }

    /// Render the program into the [`Pipe`].
    ///
    /// A program that extends another renders the parent instead, with the
    /// blocks of this program taking the place of the blocks in the parent.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error`] encountered, named after the template it
    /// happened in.
    pub fn render(&mut self, pipe: &mut Pipe) -> Result<(), Error> {
        let compiled = self.compiled;
        let result = match compiled.extends() {
            Some(extends) => self.render_parent(extends, pipe),
            None => self.render_scope(compiled.root(), pipe),
        };

        result.map_err(|error| error.with_template(compiled.name()))
    }

    fn render_scope(&mut self, scope: &Scope, pipe: &mut Pipe) -> Result<(), Error> {
        for (index, tree) in scope.data.iter().enumerate() {
            match tree {
                Tree::Text(text) => {
                    let literal = self.trim_text(scope, index, text);
                    pipe.write_str(literal).map_err(|_| error_write())?;
                }
                Tree::Print(print) => {
                    let value = self.evaluate(&print.expression)?;
                    pipe.write_value(&value).map_err(|_| error_write())?;
                }
                Tree::If(if_else) => {
                    let mut body = if_else.else_branch.as_ref();
                    for branch in &if_else.branches {
                        if is_truthy(&self.evaluate(&branch.condition)?) {
                            body = Some(&branch.body);
                            break;
                        }
                    }

                    if let Some(body) = body {
                        self.render_scope(body, pipe)?;
                    }
                }
                Tree::For(for_loop) => {
                    let iterable = self.evaluate(&for_loop.iterable)?.into_owned();
                    let pairs: Vec<(Value, Value)> = match iterable {
                        Value::Array(array) => array
                            .into_iter()
                            .enumerate()
                            .map(|(index, item)| (json!(index), item))
                            .collect(),
                        Value::Object(object) => object
                            .into_iter()
                            .map(|(key, item)| (Value::String(key), item))
                            .collect(),
                        other => {
                            return Err(Error::new(ErrorKind::Type, INCOMPATIBLE_TYPES)
                                .with_pointer(self.compiled.source(), for_loop.iterable.region())
                                .with_help(format!(
                                    "cannot iterate over `{other}`, expected an array or object"
                                )))
                        }
                    };

                    let length = pairs.len();
                    let mark = self.locals.len();
                    for (index, (key, item)) in pairs.into_iter().enumerate() {
                        match &for_loop.set {
                            LoopVariables::Item(name) => self.locals.push((name.clone(), item)),
                            LoopVariables::KeyValue(key_name, item_name) => {
                                self.locals.push((key_name.clone(), key));
                                self.locals.push((item_name.clone(), item));
                            }
                        }
                        self.locals.push((
                            "loop".to_owned(),
                            json!({
                                "index": index + 1,
                                "index0": index,
                                "first": index == 0,
                                "last": index + 1 == length,
                                "length": length,
                            }),
                        ));

                        let result = self.render_scope(&for_loop.body, pipe);
                        self.locals.truncate(mark);
                        result?;
                    }
                }
                Tree::Block(block) => {
                    let owner = self.overrides.get(&block.name).and_then(|owner| {
                        let compiled = owner.compiled()?;
                        Some((owner, compiled, compiled.block(&block.name)?))
                    });

                    match owner {
                        Some((owner, compiled, replacement)) => {
                            let mut renderer = Renderer {
                                program: owner,
                                compiled,
                                overrides: self.overrides,
                                locals: self.locals.clone(),
                                depth: self.depth,
                            };
                            renderer
                                .render_scope(&replacement.body, pipe)
                                .map_err(|error| error.with_template(compiled.name()))?;
                        }
                        None => self.render_scope(&block.body, pipe)?,
                    }
                }
                Tree::Include(include) => self.render_include(include, pipe)?,
                Tree::Extends(_) => {}
            }
        }

        Ok(())
    }

    /// Return the text with whitespace removed where neighboring tags
    /// request it.
    fn trim_text(&self, scope: &Scope, index: usize, text: &Text) -> &'program str {
        let trim = self.compiled.trim();
        let mut literal = text.region.literal(self.compiled.source());

        let trim_start = match index.checked_sub(1).and_then(|before| scope.data.get(before)) {
            Some(previous) => trim.mode_of(previous.id()).contains(TrimMode::RIGHT),
            None => trim.mode_of(scope.id).contains(TrimMode::INNER_LEFT),
        };
        let trim_end = match scope.data.get(index + 1) {
            Some(next) => trim.mode_of(next.id()).contains(TrimMode::LEFT),
            None => trim.mode_of(scope.id).contains(TrimMode::INNER_RIGHT),
        };

        if trim_start {
            literal = literal.trim_start();
        }
        if trim_end {
            literal = literal.trim_end();
        }

        literal
    }

    /// Render the parent template in place of this one.
    fn render_parent(&mut self, extends: &Extends, pipe: &mut Pipe) -> Result<(), Error> {
        let parent = self.resolve(&extends.name, extends.region)?;

        let mut overrides = self.overrides.clone();
        for name in self.compiled.blocks() {
            overrides
                .entry(name.clone())
                .or_insert_with(|| self.program.clone());
        }

        let mut program = Program::nested(parent, self.program);
        for name in program.needed_variables().to_vec() {
            if let Some(value) = self.program.value(&name) {
                program.set_value(&name, value.clone());
            }
        }

        let compiled = program.check()?;
        Renderer::new(&program, compiled, &overrides, self.depth + 1).render(pipe)
    }

    /// Render an included template with the values passed to it.
    fn render_include(&mut self, include: &Include, pipe: &mut Pipe) -> Result<(), Error> {
        let dependency = self.resolve(&include.name, include.region)?;

        let mut program = Program::nested(dependency, self.program);
        for mount in &include.mounts {
            let value = self.evaluate(&mount.value)?.into_owned();
            program.set_value(&mount.name, value);
        }

        let overrides = Overrides::new();
        let compiled = program.check()?;
        Renderer::new(&program, compiled, &overrides, self.depth + 1).render(pipe)
    }

    /// Return the named template from the engine library.
    fn resolve(&self, name: &str, region: Region) -> Result<Arc<Compiled>, Error> {
        let source = self.compiled.source();
        let environment = self.compiled.environment();
        let max_depth = environment.config.max_depth;
        if self.depth >= max_depth {
            return Err(Error::new(ErrorKind::Template, "maximum depth exceeded")
                .with_pointer(source, region)
                .with_help(format!(
                    "templates may nest at most `{max_depth}` levels deep, \
                    do two templates include or extend each other?"
                )));
        }

        trace!("resolving template `{name}` at depth {}", self.depth + 1);
        environment
            .template(name)
            .ok_or_else(|| error_missing_template(name, source, region))
    }

    /// Evaluate an [`Expression`] to return a [`Value`].
    fn evaluate<'a>(&'a self, expression: &'a Expression) -> Result<Cow<'a, Value>, Error> {
        let source = self.compiled.source();
        match expression {
            Expression::Literal(literal) => Ok(Cow::Borrowed(&literal.value)),
            Expression::Variable(variable) => self.evaluate_variable(variable),
            Expression::List(list) => {
                let mut items = Vec::with_capacity(list.items.len());
                for item in &list.items {
                    items.push(self.evaluate(item)?.into_owned());
                }

                Ok(Cow::Owned(Value::Array(items)))
            }
            Expression::Binary(binary) => {
                let left = self.evaluate(&binary.left)?;
                match binary.operator {
                    Operator::And if !is_truthy(&left) => return Ok(Cow::Owned(json!(false))),
                    Operator::Or if is_truthy(&left) => return Ok(Cow::Owned(json!(true))),
                    _ => {}
                }

                let right = self.evaluate(&binary.right)?;
                apply(&left, binary.operator, &right, self.program.locale())
                    .map(Cow::Owned)
                    .map_err(|error| error.with_pointer(source, binary.operator_region))
            }
            Expression::Unary(prefix) => {
                let operand = self.evaluate(&prefix.operand)?;
                match prefix.operator {
                    Unary::Not => Ok(Cow::Owned(json!(!is_truthy(&operand)))),
                    Unary::Negate => negate(&operand)
                        .map(Cow::Owned)
                        .map_err(|error| error.with_pointer(source, prefix.region)),
                }
            }
            Expression::Call(call) => {
                let arguments = self.evaluate_arguments(None, &call.arguments)?;
                self.call(&call.name, call.name_region, &arguments, ErrorKind::UnknownFunction)
            }
            Expression::Filter(filter) => {
                let arguments =
                    self.evaluate_arguments(Some(filter.receiver.as_ref()), &filter.arguments)?;
                self.call(&filter.name, filter.name_region, &arguments, ErrorKind::UnknownFilter)
            }
        }
    }

    /// Evaluate the arguments of a call, beginning with the receiver of a
    /// filter.
    fn evaluate_arguments(
        &self,
        receiver: Option<&Expression>,
        arguments: &[Expression],
    ) -> Result<Vec<Value>, Error> {
        let mut values = Vec::with_capacity(arguments.len() + 1);
        for expression in receiver.into_iter().chain(arguments) {
            values.push(self.evaluate(expression)?.into_owned());
        }

        Ok(values)
    }

    /// Resolve a [`Variable`], walking its path through objects and arrays.
    ///
    /// A key that does not exist evaluates to null.
    fn evaluate_variable<'a>(&'a self, variable: &Variable) -> Result<Cow<'a, Value>, Error> {
        let bound = self
            .locals
            .iter()
            .rev()
            .find(|(name, _)| *name == variable.name)
            .map(|(_, value)| value)
            .or_else(|| {
                self.program
                    .index_of(&variable.name)
                    .and_then(|index| self.program.value_at(index))
            });

        let Some(mut value) = bound else {
            return Err(Error::new(ErrorKind::UnboundVariable, UNBOUND_VARIABLE)
                .with_pointer(self.compiled.source(), variable.region)
                .with_help(format!(
                    "variable `{}` was used before a value was bound",
                    variable.name
                )));
        };

        for key in &variable.path {
            let next = match value {
                Value::Object(object) => object.get(key),
                Value::Array(array) => key.parse::<usize>().ok().and_then(|at| array.get(at)),
                _ => None,
            };
            match next {
                Some(next) => value = next,
                None => return Ok(Cow::Owned(Value::Null)),
            }
        }

        Ok(Cow::Borrowed(value))
    }

    /// Call the named [`Function`], looking in the user functions of the
    /// program before the engine.
    fn call(
        &self,
        name: &str,
        region: Region,
        arguments: &[Value],
        unknown: ErrorKind,
    ) -> Result<Cow<'_, Value>, Error> {
        let source = self.compiled.source();
        let function: Option<&Arc<dyn Function>> = self
            .program
            .function(name)
            .or_else(|| self.compiled.environment().registry.get(name));

        let Some(function) = function else {
            let (reason, noun) = match unknown {
                ErrorKind::UnknownFilter => (UNKNOWN_FILTER, "filter"),
                _ => (UNKNOWN_FUNCTION, "function"),
            };
            return Err(Error::new(unknown, reason)
                .with_pointer(source, region)
                .with_help(format!(
                    "{noun} `{name}` is not registered, add it with `.add_function`"
                )));
        };

        function.call(arguments).map(Cow::Owned).map_err(|error| {
            let error = error.with_kind(ErrorKind::Function);
            if error.is_located() {
                error
            } else {
                error.with_pointer(source, region)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{log::ErrorKind, Engine};
    use serde_json::json;

    fn render(source: &str, values: serde_json::Value) -> Result<String, crate::Error> {
        let mut program = Engine::default().compile(source)?;
        if let serde_json::Value::Object(values) = values {
            for (name, value) in values {
                program.set_value(&name, value);
            }
        }

        program.try_render()
    }

    #[test]
    fn test_render_text() {
        assert_eq!(render("hello there", json!({})).unwrap(), "hello there");
    }

    #[test]
    fn test_render_print() {
        assert_eq!(
            render("hello there, {{ name }}!", json!({"name": "taylor"})).unwrap(),
            "hello there, taylor!"
        );
        assert_eq!(render("{{ a }}", json!({"a": null})).unwrap(), "");
        assert_eq!(render("{{ a }}", json!({"a": [1, "b"]})).unwrap(), "[1, b]");
    }

    #[test]
    fn test_render_if() {
        let source = "{% if left > 300 %}a\
            {% elif name == \"taylor\" %}b\
            {% elif not false %}c\
            {% else %}d\
            {% endif %}";
        assert_eq!(
            render(source, json!({"left": 101, "name": ""})).unwrap(),
            "c"
        );
        assert_eq!(
            render(source, json!({"left": 301, "name": ""})).unwrap(),
            "a"
        );
        assert_eq!(
            render("{% if 0 %}a{% else %}b{% endif %}", json!({})).unwrap(),
            "b"
        );
    }

    #[test]
    fn test_render_for() {
        assert_eq!(
            render(
                "{% for x in items %}{{ x }},{% endfor %}",
                json!({"items": [1, 2, 3]})
            )
            .unwrap(),
            "1,2,3,"
        );
        assert_eq!(
            render(
                "{% for i, x in items %}{{ i }}={{ x }} {% endfor %}",
                json!({"items": ["a", "b"]})
            )
            .unwrap(),
            "0=a 1=b "
        );
        assert_eq!(
            render(
                "{% for k, v in map %}{{ k }}:{{ v }};{% endfor %}",
                json!({"map": {"b": 2, "a": 1}})
            )
            .unwrap(),
            "a:1;b:2;"
        );
        assert_eq!(
            render("{% for v in map %}{{ v }}{% endfor %}", json!({"map": {"a": 1, "b": 2}}))
                .unwrap(),
            "12"
        );
    }

    #[test]
    fn test_render_loop_object() {
        let source = "{% for x in items %}\
            {{ loop.index }}/{{ loop.length }}\
            {% if loop.first %}F{% endif %}\
            {% if loop.last %}L{% endif %} \
            {% endfor %}";
        assert_eq!(
            render(source, json!({"items": ["a", "b", "c"]})).unwrap(),
            "1/3F 2/3 3/3L "
        );
    }

    #[test]
    fn test_render_loop_shadowing() {
        let source = "{% for x in outer %}{% for x in inner %}{{ x }}{% endfor %}{{ x }}{% endfor %}";
        assert_eq!(
            render(source, json!({"outer": ["A"], "inner": [1, 2]})).unwrap(),
            "12A"
        );
    }

    #[test]
    fn test_render_for_not_iterable() {
        let error = render("{% for x in count %}{% endfor %}", json!({"count": 3})).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Type);
        assert_eq!(error.location().map(|l| l.column), Some(13));
    }

    #[test]
    fn test_render_path() {
        let values = json!({"user": {"name": "taylor", "tags": ["a", "b"]}});
        assert_eq!(render("{{ user.name }}", values.clone()).unwrap(), "taylor");
        assert_eq!(render("{{ user.tags.1 }}", values.clone()).unwrap(), "b");
        assert_eq!(render("{{ user.missing.deeper }}", values).unwrap(), "");
    }

    #[test]
    fn test_render_expression() {
        assert_eq!(render("{{ 1 + 2 * 3 }}", json!({})).unwrap(), "7");
        assert_eq!(render("{{ (1 + 2) * 3 }}", json!({})).unwrap(), "9");
        assert_eq!(render("{{ 7 / 2 }}", json!({})).unwrap(), "3.5");
        assert_eq!(render("{{ \"a\" ~ 1 ~ true }}", json!({})).unwrap(), "a1true");
        assert_eq!(render("{{ [1, 2] + [3] }}", json!({})).unwrap(), "[1, 2, 3]");
        assert_eq!(render("{{ -n }}", json!({"n": 4})).unwrap(), "-4");
        assert_eq!(render("{{ not n }}", json!({"n": 4})).unwrap(), "false");
        assert_eq!(render("{{ 1 and \"\" }}", json!({})).unwrap(), "false");
        assert_eq!(render("{{ 0 or [1] }}", json!({})).unwrap(), "true");
    }

    #[test]
    fn test_render_short_circuit() {
        assert_eq!(render("{{ false and missing(1) }}", json!({})).unwrap(), "false");
        assert_eq!(render("{{ true or missing(1) }}", json!({})).unwrap(), "true");
        assert!(render("{{ true and missing(1) }}", json!({})).is_err());
    }

    #[test]
    fn test_render_incompatible_types() {
        let error = render("{% if \"hello\" > true %}a{% endif %}", json!({})).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Type);
        assert_eq!(error.location().map(|l| l.column), Some(15));
    }

    #[test]
    fn test_render_filter() {
        assert_eq!(
            render("{{ name | upper }}", json!({"name": "taylor"})).unwrap(),
            "TAYLOR"
        );
        assert_eq!(
            render("{{ items | join(\", \") | upper }}", json!({"items": ["a", "b"]})).unwrap(),
            "A, B"
        );
        assert_eq!(render("{{ length(\"abc\") }}", json!({})).unwrap(), "3");
    }

    #[test]
    fn test_render_unknown() {
        let error = render("{{ shout(name) }}", json!({"name": "a"})).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownFunction);
        assert_eq!(error.location().map(|l| l.column), Some(4));

        let error = render("{{ name | shout }}", json!({"name": "a"})).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownFilter);
        assert_eq!(error.location().map(|l| l.column), Some(11));
    }

    #[test]
    fn test_render_function_error() {
        let error = render("{{ n | upper }}", json!({"n": 1})).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Function);
        assert_eq!(error.location().map(|l| l.column), Some(8));
    }

    #[test]
    fn test_render_trim() {
        assert_eq!(
            render("A {%- if true %}B{% endif -%} C", json!({})).unwrap(),
            "ABC"
        );
        assert_eq!(
            render("{% if true -%}\n  B\n{%- endif %}", json!({})).unwrap(),
            "B"
        );
        assert_eq!(
            render("a  {{- x -}}  b", json!({"x": "-"})).unwrap(),
            "a-b"
        );
        assert_eq!(
            render("{% for x in xs -%}\n {{ x }}\n{%- endfor %}", json!({"xs": [1, 2]})).unwrap(),
            "12"
        );
    }
}
