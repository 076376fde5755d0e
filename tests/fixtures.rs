use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use twine::{
    function::{serde::Value, Error},
    Engine,
};

/// Return an [`Engine`] holding a small site: a layout, a page extending it
/// and a partial the layout includes.
#[allow(dead_code)]
pub fn get_site() -> Engine {
    let mut engine = Engine::default();
    engine
        .add_template("header", "<h1>{{ title | upper }}</h1>")
        .unwrap();
    engine
        .add_template(
            "layout",
            "{% include \"header\" with title: title %}\
            <main>{% block content %}empty{% endblock %}</main>\
            <footer>{% block footer %}(c) {{ year }}{% endblock %}</footer>",
        )
        .unwrap();
    engine
        .add_template(
            "page",
            "{% extends \"layout\" %}\
            {% block content %}{% for p in paragraphs %}<p>{{ p }}</p>{% endfor %}{% endblock %}",
        )
        .unwrap();

    engine
}

/// Return a function that counts how many times it was called, along with
/// the counter.
#[allow(dead_code)]
pub fn get_counter() -> (
    impl Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let counter_function = move |_: &[Value]| -> Result<Value, Error> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Bool(true))
    };

    (counter_function, calls)
}
