mod fixtures;

use fixtures::{get_counter, get_site};
use serde_json::json;
use std::{sync::atomic::Ordering, thread};
use twine::{compile, Engine, ErrorKind, Locale, Program};

#[test]
fn test_hello_world() {
    let mut program = compile("Hello, {{ name }}!").unwrap();

    assert_eq!(program.needed_variables(), ["name"]);
    assert!(!program.can_render());
    assert_eq!(
        program.last_error().map(|e| e.kind()),
        Some(ErrorKind::MissingVariable)
    );

    assert!(program.set_value("name", "World"));
    assert!(program.can_render());
    assert_eq!(program.render(), "Hello, World!");
}

#[test]
fn test_loop() {
    let mut program = compile("{% for x in items %}{{ x }},{% endfor %}")
        .unwrap()
        .with_value("items", json!([1, 2, 3]));

    assert_eq!(program.render(), "1,2,3,");
}

#[test]
fn test_render_deterministic() {
    let mut program = compile("{% for k, v in map %}{{ k }}={{ v }} {% endfor %}{{ n * 2 }}")
        .unwrap()
        .with_value("map", json!({"z": 1, "a": [true], "m": null}))
        .with_value("n", 1.25);

    let first = program.render();
    assert_eq!(first, "a=[true] m= z=1 2.5");
    assert_eq!(program.render(), first);
}

#[test]
fn test_clone_isolated() {
    let mut original = compile("{{ a }}").unwrap().with_value("a", "one");
    let mut copy = original.clone();
    copy.set_value("a", "two");

    assert_eq!(original.value("a"), Some(&json!("one")));
    assert_eq!(original.render(), "one");
    assert_eq!(copy.render(), "two");
}

#[test]
fn test_strict_gate() {
    let mut program = compile("{{ a }}{% if b %}{{ c.d }}{% endif %}").unwrap();
    assert_eq!(program.needed_variables(), ["a", "b", "c"]);

    for name in ["a", "b", "c"] {
        assert!(!program.can_render());
        program.set_value(name, json!({"d": 1}));
    }
    assert!(program.can_render());
    assert_eq!(program.render(), "{d: 1}1");
}

#[test]
fn test_unknown_variable_ignored() {
    let mut program = compile("{{ a }}").unwrap().with_value("a", 1);

    assert!(!program.set_value("doesNotExist", 2));
    assert!(!program.needed_variables().contains(&"doesNotExist".to_owned()));
    assert_eq!(program.value("doesNotExist"), None);
    assert_eq!(program.render(), "1");
}

#[test]
fn test_trim() {
    let mut program = compile("A {%- if true %}B{% endif -%} C").unwrap();
    assert_eq!(program.render(), "ABC");

    let mut program = compile("A {% if true %}B{% endif %} C").unwrap();
    assert_eq!(program.render(), "A B C");

    let mut program = compile("<ul>\n{%- for x in xs %}\n  <li>{{ x }}</li>\n{%- endfor %}\n</ul>")
        .unwrap()
        .with_value("xs", json!(["a", "b"]));
    assert_eq!(program.render(), "<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>");
}

#[test]
fn test_short_circuit() {
    let (counted, calls) = get_counter();
    let mut program = compile("{{ false and counted() }}|{{ true or counted() }}").unwrap();
    assert!(program.add_function("counted", counted));

    assert_eq!(program.render(), "false|true");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let (counted, calls) = get_counter();
    let mut program = compile("{{ true and counted() }}").unwrap();
    program.add_function("counted", counted);

    assert_eq!(program.render(), "true");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_constant_folding_equivalence() {
    let source = "{{ double(21) }} {{ double(n) }} {{ \"ab\" | upper | length }}";
    let double = |args: &[serde_json::Value]| -> Result<serde_json::Value, twine::Error> {
        Ok(json!(args[0].as_i64().unwrap_or(0) * 2))
    };

    let folded = Engine::default().with_constant_function("double", double);
    let unfolded = Engine::default()
        .with_constant_function("double", double)
        .with_constant_folding(false);

    let mut first = folded.compile(source).unwrap().with_value("n", 1);
    let mut second = unfolded.compile(source).unwrap().with_value("n", 1);

    assert_eq!(first.render(), "42 2 2");
    assert_eq!(first.render(), second.render());
}

#[test]
fn test_constant_folding_evaluates_once() {
    let (counted, calls) = get_counter();
    let engine = Engine::default().with_constant_function("counted", counted);
    let mut program = engine.compile("{{ counted(1) }}").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    program.render();
    program.render();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_first_error_wins() {
    let mut program = compile("ok {{ 1 / 0 }} {{ \"a\" - 1 }}").unwrap();

    assert_eq!(program.render(), "");
    let error = program.last_error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Type);
    assert_eq!(error.location().map(|l| (l.row, l.column)), Some((1, 9)));
}

#[test]
fn test_syntax_error_location() {
    let error = compile("line\n{% for x items %}{% endfor %}").unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Syntax);
    assert_eq!(error.location().map(|l| l.row), Some(2));
}

#[test]
fn test_unknown_function() {
    let mut program = compile("\n{{ shout(name) }}").unwrap().with_value("name", "a");

    assert_eq!(program.render(), "");
    let error = program.last_error().unwrap();
    assert_eq!(error.kind(), ErrorKind::UnknownFunction);
    assert_eq!(error.location().map(|l| (l.row, l.column)), Some((2, 4)));
    assert!(format!("{error:#}").contains("shout"));
}

#[test]
fn test_extends_include_blocks() {
    let engine = get_site();
    let mut page = engine.program("page").unwrap();

    assert_eq!(page.dependencies(), ["layout"]);
    assert_eq!(page.needed_variables(), ["paragraphs", "title", "year"]);
    assert_eq!(page.blocks(), ["content"]);

    page.set_value("paragraphs", json!(["a", "b"]));
    page.set_value("title", "home");
    page.set_value("year", 2024);

    assert_eq!(
        page.render(),
        "<h1>HOME</h1><main><p>a</p><p>b</p></main><footer>(c) 2024</footer>"
    );
}

#[test]
fn test_extends_chain() {
    let mut engine = Engine::default();
    engine
        .add_template(
            "base",
            "[{% block a %}base-a{% endblock %}|{% block b %}base-b{% endblock %}]",
        )
        .unwrap();
    engine
        .add_template(
            "middle",
            "{% extends \"base\" %}\
            {% block a %}middle-a{% endblock %}{% block b %}middle-b{% endblock %}",
        )
        .unwrap();
    engine
        .add_template("leaf", "{% extends \"middle\" %}{% block b %}leaf-b{% endblock %}")
        .unwrap();

    assert_eq!(engine.program("leaf").unwrap().render(), "[middle-a|leaf-b]");
    assert_eq!(engine.program("middle").unwrap().render(), "[middle-a|middle-b]");
}

#[test]
fn test_extends_parent_added_later() {
    let mut engine = Engine::default();
    engine
        .add_template(
            "page",
            "{% extends \"layout\" %}{% block body %}{{ body }}{% endblock %}",
        )
        .unwrap();
    engine
        .add_template("layout", "<title>{{ title }}</title>{% block body %}{% endblock %}")
        .unwrap();

    let mut page = engine.program("page").unwrap();
    assert_eq!(page.needed_variables(), ["body", "title"]);
    assert!(page.set_value("title", "T"));
    assert!(page.set_value("body", "B"));
    assert!(page.can_render());
    assert_eq!(page.render(), "<title>T</title>B");
}

#[test]
fn test_extends_parent_replaced() {
    let mut engine = get_site();
    engine
        .add_template_must("layout", "{{ lang }}:{% block content %}{% endblock %}")
        .unwrap();

    let mut page = engine.program("page").unwrap();
    assert_eq!(page.needed_variables(), ["paragraphs", "lang"]);

    page.set_value("paragraphs", json!(["a"]));
    assert!(!page.can_render());
    assert_eq!(
        page.last_error().map(|error| error.message()),
        Some("missing variable `lang`")
    );

    assert!(page.set_value("lang", "en"));
    assert_eq!(page.render(), "en:<p>a</p>");
}

#[test]
fn test_include_missing_binding() {
    let mut engine = Engine::default();
    engine.add_template("partial", "{{ a }}{{ b }}").unwrap();
    engine
        .add_template("outer", "{% include \"partial\" with a: 1 %}")
        .unwrap();

    let mut program = engine.program("outer").unwrap();
    assert_eq!(program.render(), "");

    let error = program.last_error().unwrap();
    assert_eq!(error.kind(), ErrorKind::MissingVariable);
    assert_eq!(error.name(), Some("partial"));
}

#[test]
fn test_include_inherits_functions_and_locale() {
    let mut engine = Engine::default();
    engine.add_template("partial", "{{ n | half }}").unwrap();
    engine
        .add_template("outer", "{% include \"partial\" with n: 5 %}")
        .unwrap();

    let mut program = engine.program("outer").unwrap();
    program.set_locale(Locale::new("de", ','));
    program.add_function(
        "half",
        |args: &[serde_json::Value]| -> Result<serde_json::Value, twine::Error> {
            Ok(json!(args[0].as_f64().unwrap_or(0.0) / 2.0))
        },
    );

    assert_eq!(program.render(), "2,5");
}

#[test]
fn test_missing_template() {
    let mut engine = Engine::default();
    engine.add_template("outer", "{% include \"nope\" %}").unwrap();

    let mut program = engine.program("outer").unwrap();
    assert_eq!(program.render(), "");

    let error = program.last_error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Template);
    assert_eq!(error.name(), Some("outer"));
}

#[test]
fn test_cycle_stops_at_max_depth() {
    let mut engine = Engine::default().with_max_depth(8);
    engine.add_template("a", "a{% include \"b\" %}").unwrap();
    engine.add_template("b", "b{% include \"a\" %}").unwrap();

    let mut program = engine.program("a").unwrap();
    assert_eq!(program.render(), "");
    assert_eq!(
        program.last_error().map(|e| e.kind()),
        Some(ErrorKind::Template)
    );
}

#[test]
fn test_program_outlives_engine() {
    let mut engine = Engine::default();
    engine.add_template("partial", "p").unwrap();
    engine.add_template("outer", "o{% include \"partial\" %}").unwrap();

    let mut program = engine.program("outer").unwrap();
    assert_eq!(program.render(), "op");

    drop(engine);
    assert_eq!(program.render(), "");
    assert_eq!(
        program.last_error().map(|e| e.kind()),
        Some(ErrorKind::Template)
    );
}

#[test]
fn test_locale() {
    let mut program = compile("{{ 2.5 }} {{ 3 }} {{ [0.5] }}").unwrap();
    program.set_locale(Locale::new("de", ','));

    assert_eq!(program.locale().name(), "de");
    assert_eq!(program.render(), "2,5 3 [0,5]");
}

#[test]
fn test_render_across_threads() {
    let program = compile("{{ n }}").unwrap();
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let mut copy = program.clone();
            thread::spawn(move || {
                copy.set_value("n", n);
                copy.render()
            })
        })
        .collect();

    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outputs, ["0", "1", "2", "3"]);
    assert!(!Program::default().is_valid());
}
