use crate::{
    compile::parse::{
        tree::{Block, Expression, Extends, Literal, LoopVariables, Scope, Tree},
        trim::TrimTable,
    },
    function::Registry,
};
use log::trace;
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, RwLock, Weak},
};

/// Compiled programs stored in an [`Engine`][`crate::Engine`] by name.
pub(crate) type Library = RwLock<HashMap<String, Arc<Compiled>>>;

/// Settings an [`Engine`][`crate::Engine`] passes to every program it
/// compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Config {
    /// Evaluate calls to constant functions with literal arguments during
    /// compilation.
    pub constant_folding: bool,
    /// How deep includes and extends may nest while rendering.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            constant_folding: true,
            max_depth: 32,
        }
    }
}

/// What a compiled program needs from the [`Engine`][`crate::Engine`] that
/// created it.
#[derive(Debug, Clone)]
pub(crate) struct Environment {
    pub registry: Arc<Registry>,
    /// Weak, so a program outliving its engine does not keep the library alive.
    pub library: Weak<Library>,
    pub config: Config,
}

impl Environment {
    /// Return the named program from the library.
    ///
    /// Returns None if the program does not exist, or the library was dropped.
    pub fn template(&self, name: &str) -> Option<Arc<Compiled>> {
        let library = self.library.upgrade()?;
        let guard = library.read().ok()?;

        guard.get(name).cloned()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            library: Weak::new(),
            config: Config::default(),
        }
    }
}

/// Names of variables in order of first use, with their positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Variables {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Variables {
    /// Append the name unless it is already known.
    pub fn insert(&mut self, name: &str) {
        if !self.index.contains_key(name) {
            self.index.insert(name.to_owned(), self.names.len());
            self.names.push(name.to_owned());
        }
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// An immutable, analyzed template.
///
/// A `Compiled` is shared between every [`Program`][`crate::Program`]
/// created from it.
pub struct Compiled {
    name: Option<String>,
    source: String,
    root: Scope,
    trim: TrimTable,
    /// Templates named by "extends" and "include", distinct and in order.
    dependencies: Vec<String>,
    /// Variables used by this template, in order of first use.
    variables: Variables,
    extends: Option<Extends>,
    blocks: Vec<String>,
    environment: Environment,
}

impl Compiled {
    /// Create a new [`Compiled`] from a parsed tree.
    ///
    /// Folds constant calls when enabled, then collects the variables,
    /// dependencies and blocks of the tree.
    pub(crate) fn new(
        name: Option<String>,
        source: String,
        mut root: Scope,
        trim: TrimTable,
        environment: Environment,
    ) -> Self {
        if environment.config.constant_folding {
            fold_scope(&mut root, &environment.registry);
        }

        let mut analysis = Analysis::default();
        analysis.scope(&root);

        Self {
            name,
            source,
            root,
            trim,
            dependencies: analysis.dependencies,
            variables: analysis.variables,
            extends: analysis.extends,
            blocks: analysis.blocks,
            environment,
        }
    }

    /// Return the variables of this program followed by those of the
    /// templates it extends, as the library holds them now.
    ///
    /// Parents missing from the library contribute nothing. The walk stops
    /// after `max_depth` parents, which ends a cycle of extends.
    pub(crate) fn needed_variables(&self) -> Variables {
        let mut variables = self.variables.clone();
        let mut parent = self.parent().and_then(|name| self.environment.template(name));

        for _ in 0..self.environment.config.max_depth {
            let Some(compiled) = parent.take() else {
                break;
            };
            for name in compiled.variables() {
                variables.insert(name);
            }
            parent = compiled
                .parent()
                .and_then(|name| compiled.environment.template(name));
        }

        variables
    }

    /// Return the name of the program, if it was added to an engine.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return the template source text.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Return the templates this program extends or includes.
    #[inline]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Return the variables this template uses, not counting the templates
    /// it extends.
    #[inline]
    pub fn variables(&self) -> &[String] {
        self.variables.names()
    }

    /// Return the names of the blocks in this program, in order.
    #[inline]
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Return the name of the parent template.
    #[inline]
    pub fn parent(&self) -> Option<&str> {
        self.extends.as_ref().map(|extends| extends.name.as_str())
    }

    /// Return the [`TrimTable`].
    #[inline]
    pub fn trim(&self) -> &TrimTable {
        &self.trim
    }

    #[inline]
    pub(crate) fn root(&self) -> &Scope {
        &self.root
    }

    #[inline]
    pub(crate) fn extends(&self) -> Option<&Extends> {
        self.extends.as_ref()
    }

    #[inline]
    pub(crate) fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Return the named [`Block`], searching nested bodies.
    pub(crate) fn block(&self, name: &str) -> Option<&Block> {
        find_block(&self.root, name)
    }
}

impl Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiled")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("variables", &self.variables)
            .field("blocks", &self.blocks)
            .field("root", &self.root)
            .finish()
    }
}

/// Collects names from a tree.
#[derive(Default)]
struct Analysis {
    variables: Variables,
    dependencies: Vec<String>,
    extends: Option<Extends>,
    blocks: Vec<String>,
    /// Names bound by the loops enclosing the current position.
    bound: Vec<String>,
}

impl Analysis {
    fn scope(&mut self, scope: &Scope) {
        for tree in &scope.data {
            self.tree(tree);
        }
    }

    fn tree(&mut self, tree: &Tree) {
        match tree {
            Tree::Text(_) => {}
            Tree::Print(print) => self.expression(&print.expression),
            Tree::If(if_else) => {
                for branch in &if_else.branches {
                    self.expression(&branch.condition);
                    self.scope(&branch.body);
                }
                if let Some(else_branch) = &if_else.else_branch {
                    self.scope(else_branch);
                }
            }
            Tree::For(for_loop) => {
                self.expression(&for_loop.iterable);

                let mark = self.bound.len();
                match &for_loop.set {
                    LoopVariables::Item(item) => self.bound.push(item.clone()),
                    LoopVariables::KeyValue(key, value) => {
                        self.bound.push(key.clone());
                        self.bound.push(value.clone());
                    }
                }
                self.bound.push("loop".to_owned());
                self.scope(&for_loop.body);
                self.bound.truncate(mark);
            }
            Tree::Block(block) => {
                if !self.blocks.contains(&block.name) {
                    self.blocks.push(block.name.clone());
                }
                self.scope(&block.body);
            }
            Tree::Extends(extends) => {
                self.dependency(&extends.name);
                if self.extends.is_none() {
                    self.extends = Some(extends.clone());
                }
            }
            Tree::Include(include) => {
                self.dependency(&include.name);
                for mount in &include.mounts {
                    self.expression(&mount.value);
                }
            }
        }
    }

    fn expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Literal(_) => {}
            Expression::Variable(variable) => {
                if !self.bound.contains(&variable.name) {
                    self.variables.insert(&variable.name);
                }
            }
            Expression::List(list) => {
                for item in &list.items {
                    self.expression(item);
                }
            }
            Expression::Binary(binary) => {
                self.expression(&binary.left);
                self.expression(&binary.right);
            }
            Expression::Unary(prefix) => self.expression(&prefix.operand),
            Expression::Call(call) => {
                for argument in &call.arguments {
                    self.expression(argument);
                }
            }
            Expression::Filter(filter) => {
                self.expression(&filter.receiver);
                for argument in &filter.arguments {
                    self.expression(argument);
                }
            }
        }
    }

    fn dependency(&mut self, name: &str) {
        if !self.dependencies.iter().any(|known| known == name) {
            self.dependencies.push(name.to_owned());
        }
    }
}

/// Fold constant calls in every expression of the [`Scope`].
fn fold_scope(scope: &mut Scope, registry: &Registry) {
    for tree in scope.data.iter_mut() {
        match tree {
            Tree::Text(_) | Tree::Extends(_) => {}
            Tree::Print(print) => fold(&mut print.expression, registry),
            Tree::If(if_else) => {
                for branch in if_else.branches.iter_mut() {
                    fold(&mut branch.condition, registry);
                    fold_scope(&mut branch.body, registry);
                }
                if let Some(else_branch) = &mut if_else.else_branch {
                    fold_scope(else_branch, registry);
                }
            }
            Tree::For(for_loop) => {
                fold(&mut for_loop.iterable, registry);
                fold_scope(&mut for_loop.body, registry);
            }
            Tree::Block(block) => fold_scope(&mut block.body, registry),
            Tree::Include(include) => {
                for mount in include.mounts.iter_mut() {
                    fold(&mut mount.value, registry);
                }
            }
        }
    }
}

/// Replace calls to constant functions with their result, bottom-up.
///
/// A call is folded when every argument (and the receiver of a filter) is a
/// literal. Calls that fail are left intact, so the error surfaces at render
/// time with the call's location.
fn fold(expression: &mut Expression, registry: &Registry) {
    let folded = match expression {
        Expression::Literal(_) | Expression::Variable(_) => None,
        Expression::List(list) => {
            list.items.iter_mut().for_each(|item| fold(item, registry));
            None
        }
        Expression::Binary(binary) => {
            fold(&mut binary.left, registry);
            fold(&mut binary.right, registry);
            None
        }
        Expression::Unary(prefix) => {
            fold(&mut prefix.operand, registry);
            None
        }
        Expression::Call(call) => {
            call.arguments
                .iter_mut()
                .for_each(|argument| fold(argument, registry));

            evaluate(&call.name, None, &call.arguments, registry)
        }
        Expression::Filter(filter) => {
            fold(&mut filter.receiver, registry);
            filter
                .arguments
                .iter_mut()
                .for_each(|argument| fold(argument, registry));

            evaluate(
                &filter.name,
                Some(filter.receiver.as_ref()),
                &filter.arguments,
                registry,
            )
        }
    };

    if let Some(value) = folded {
        trace!("folded constant call at {}", expression.location());
        *expression = Expression::Literal(Literal {
            value,
            region: expression.region(),
            location: expression.location(),
        });
    }
}

/// Call the named constant function when every argument is a literal.
fn evaluate(
    name: &str,
    receiver: Option<&Expression>,
    arguments: &[Expression],
    registry: &Registry,
) -> Option<Value> {
    if !registry.is_constant(name) {
        return None;
    }

    let values = receiver
        .into_iter()
        .chain(arguments)
        .map(|argument| argument.as_literal().cloned())
        .collect::<Option<Vec<Value>>>()?;

    registry.get(name)?.call(&values).ok()
}

/// Return the named [`Block`] within the [`Scope`], searching nested bodies.
fn find_block<'a>(scope: &'a Scope, name: &str) -> Option<&'a Block> {
    scope.data.iter().find_map(|tree| match tree {
        Tree::Block(block) if block.name == name => Some(block),
        Tree::Block(block) => find_block(&block.body, name),
        Tree::If(if_else) => if_else
            .branches
            .iter()
            .map(|branch| &branch.body)
            .chain(if_else.else_branch.as_ref())
            .find_map(|body| find_block(body, name)),
        Tree::For(for_loop) => find_block(&for_loop.body, name),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::{Compiled, Config, Environment, Library};
    use crate::{
        compile::parse::{tree::Tree, Parser},
        function::Registry,
        log::Error,
        Builder,
    };
    use morel::Finder;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[test]
    fn test_variables_in_order() {
        let compiled = helper_compile("{{ b }}{{ a.name }}{{ b }}{% if c %}{{ a }}{% endif %}");
        assert_eq!(compiled.variables(), &["b", "a", "c"]);
        assert_eq!(compiled.needed_variables().index_of("c"), Some(2));
    }

    #[test]
    fn test_loop_variables_excluded() {
        let compiled = helper_compile(
            "{% for k, v in items %}{{ k }}{{ v }}{{ loop.index }}{{ other }}{% endfor %}{{ k }}",
        );
        assert_eq!(compiled.variables(), &["items", "other", "k"]);
    }

    #[test]
    fn test_dependencies_distinct() {
        let compiled = helper_compile(
            r#"{% extends "base" %}{% include "card" %}{% include "base" %}{% include "card" with x: y %}"#,
        );
        assert_eq!(compiled.dependencies(), &["base", "card"]);
        assert_eq!(compiled.parent(), Some("base"));
        assert_eq!(compiled.variables(), &["y"]);
    }

    #[test]
    fn test_blocks() {
        let compiled = helper_compile(
            "{% block head %}{% block title %}{% endblock %}{% endblock %}{% block body %}{% endblock %}",
        );
        assert_eq!(compiled.blocks(), &["head", "title", "body"]);
        assert!(compiled.block("title").is_some());
        assert!(compiled.block("foot").is_none());
    }

    #[test]
    fn test_constant_folding() {
        let compiled =
            helper_compile(r#"{{ upper(lower("ABC")) }}{{ "x" | upper }}{{ name | upper }}"#);
        let literal = |index: usize| match &compiled.root().data[index] {
            Tree::Print(print) => print.expression.as_literal().cloned(),
            _ => None,
        };

        assert_eq!(literal(0), Some(json!("ABC")));
        assert_eq!(literal(1), Some(json!("X")));
        assert_eq!(literal(2), None);
    }

    #[test]
    fn test_constant_folding_error_left_intact() {
        let compiled = helper_compile("{{ upper(1) }}");
        let Tree::Print(print) = &compiled.root().data[0] else {
            panic!("expected print");
        };
        assert!(print.expression.as_literal().is_none());
    }

    #[test]
    fn test_constant_folding_disabled() {
        let environment = Environment {
            config: Config {
                constant_folding: false,
                ..Config::default()
            },
            ..Environment::default()
        };
        let compiled = helper_compile_with(r#"{{ upper("a") }}"#, environment);
        let Tree::Print(print) = &compiled.root().data[0] else {
            panic!("expected print");
        };
        assert!(print.expression.as_literal().is_none());
    }

    #[test]
    fn test_non_constant_not_folded() {
        let mut registry = Registry::new();
        let now = |_: &[Value]| -> Result<Value, Error> { Ok(json!(1)) };
        registry.insert("now", Arc::new(now), false);
        let environment = Environment {
            registry: Arc::new(registry),
            ..Environment::default()
        };
        let compiled = helper_compile_with("{{ now() }}", environment);
        let Tree::Print(print) = &compiled.root().data[0] else {
            panic!("expected print");
        };
        assert!(print.expression.as_literal().is_none());
    }

    #[test]
    fn test_needed_variables_follow_library() {
        let library: Arc<Library> = Arc::default();
        let environment = Environment {
            library: Arc::downgrade(&library),
            ..Environment::default()
        };
        let page = helper_compile_with(
            r#"{% extends "layout" %}{% block body %}{{ body }}{% endblock %}"#,
            environment.clone(),
        );
        assert_eq!(page.needed_variables().names(), ["body"]);

        let layout = helper_compile_with(
            r#"{% extends "base" %}{{ title }}{{ body }}"#,
            environment.clone(),
        );
        let base = helper_compile_with("{{ lang }}", environment);
        {
            let mut guard = library.write().unwrap();
            guard.insert("layout".to_owned(), Arc::new(layout));
            guard.insert("base".to_owned(), Arc::new(base));
        }

        let needed = page.needed_variables();
        assert_eq!(needed.names(), ["body", "title", "lang"]);
        assert_eq!(needed.index_of("lang"), Some(2));
        assert_eq!(page.variables(), ["body"]);
    }

    #[test]
    fn test_needed_variables_extends_cycle() {
        let library: Arc<Library> = Arc::default();
        let environment = Environment {
            library: Arc::downgrade(&library),
            ..Environment::default()
        };
        let a = helper_compile_with(r#"{% extends "b" %}{{ x }}"#, environment.clone());
        let b = helper_compile_with(r#"{% extends "a" %}{{ y }}"#, environment);
        {
            let mut guard = library.write().unwrap();
            guard.insert("a".to_owned(), Arc::new(a));
            guard.insert("b".to_owned(), Arc::new(b));
        }

        let a = library.read().unwrap().get("a").cloned().unwrap();
        assert_eq!(a.needed_variables().names(), ["x", "y"]);
    }

    fn helper_compile(source: &str) -> Compiled {
        helper_compile_with(source, Environment::default())
    }

    fn helper_compile_with(source: &str, environment: Environment) -> Compiled {
        let finder = Finder::new(Builder::new().to_syntax());
        let (root, trim) = Parser::new(source, &finder).parse().unwrap();

        Compiled::new(None, source.to_owned(), root, trim, environment)
    }
}
