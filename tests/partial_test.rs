use rustbars::{Engine, EngineConfig, Error};
use serde_json::json;

#[test]
fn test_partial_inclusion() {
    let engine = Engine::new();
    engine
        .register_partial("greet", "Hi {{name}}")
        .expect("Failed to register partial");

    let result = engine
        .render("{{> greet}}", &json!({"name": "Sam"}))
        .expect("Failed to render partial");
    assert_eq!(result, "Hi Sam");
}

#[test]
fn test_duplicate_partial_fails_at_registration() {
    let engine = Engine::new();
    engine
        .register_partial("greet", "Hi {{name}}")
        .expect("Failed to register partial");

    let err = engine
        .register_partial("greet", "Hello {{name}}")
        .expect_err("Second registration should fail");
    assert!(matches!(err, Error::PartialAlreadyRegistered(ref name) if name == "greet"));

    // The first registration is untouched
    let result = engine.render("{{> greet}}", &json!({"name": "Sam"})).unwrap();
    assert_eq!(result, "Hi Sam");
}

#[test]
fn test_unknown_partial() {
    let engine = Engine::new();
    let template = engine
        .compile("before {{> missing}} after")
        .expect("Unknown partials are a render-time error");

    let err = template.render(&json!({})).expect_err("Render should fail");
    assert!(matches!(err, Error::UnknownPartial(ref name) if name == "missing"));
    assert!(err.is_render());
}

#[test]
fn test_partial_context_and_hash() {
    let engine = Engine::new();
    engine
        .register_partial("card", "{{title}}/{{badge}}")
        .expect("Failed to register partial");

    let context = json!({"post": {"title": "T", "badge": "old"}, "label": "L"});

    let result = engine.render("{{> card post}}", &context).unwrap();
    assert_eq!(result, "T/old");

    let result = engine
        .render("{{> card post badge=label}}", &context)
        .unwrap();
    assert_eq!(result, "T/L");

    let result = engine.render("{{> card 5 badge=\"x\"}}", &context).unwrap();
    assert_eq!(result, "/x");
}

#[test]
fn test_partial_names_with_paths() {
    let engine = Engine::new();
    engine
        .register_partial("shared/header-main", "<header>{{site}}</header>")
        .expect("Failed to register partial");

    let context = json!({"site": "S"});
    assert_eq!(
        engine.render("{{> shared/header-main}}", &context).unwrap(),
        "<header>S</header>"
    );
    assert_eq!(
        engine.render("{{> \"shared/header-main\"}}", &context).unwrap(),
        "<header>S</header>"
    );
}

#[test]
fn test_dynamic_partial() {
    let engine = Engine::new();
    engine
        .register_partials([("image", "img:{{src}}"), ("text", "txt:{{body}}")])
        .expect("Failed to register partials");
    engine
        .register_fn("kind_of", |block: rustbars::Map| {
            block
                .get("kind")
                .and_then(|kind| kind.as_str())
                .unwrap_or("text")
                .to_string()
        })
        .expect("Failed to register helper");

    let result = engine
        .render(
            "{{#each blocks}}{{> (kind_of this)}};{{/each}}",
            &json!({"blocks": [{"kind": "image", "src": "a.png"}, {"body": "hi"}]}),
        )
        .expect("Failed to render dynamic partials");
    assert_eq!(result, "img:a.png;txt:hi;");
}

#[test]
fn test_precompiled_partial() {
    let engine = Engine::new();
    let item = engine
        .compile("<{{this}}>")
        .expect("Failed to compile partial");
    engine
        .register_partial_template("item", &item)
        .expect("Failed to register compiled partial");

    let result = engine
        .render("{{#each xs}}{{> item}}{{/each}}", &json!({"xs": [1, 2]}))
        .unwrap();
    assert_eq!(result, "<1><2>");
}

#[test]
fn test_partial_syntax_error_surfaces_on_use() {
    let engine = Engine::new();
    engine
        .register_partial("broken", "{{#if x}}never closed")
        .expect("Registration does not compile");

    let err = engine
        .render("{{> broken}}", &json!({}))
        .expect_err("Using a broken partial should fail");
    assert!(err.is_syntax());
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_remove_and_reregister_partial() {
    let engine = Engine::new();
    engine.register_partial("p", "one").unwrap();
    assert_eq!(engine.render("{{> p}}", &json!({})).unwrap(), "one");

    assert!(engine.remove_partial("p"));
    assert!(matches!(
        engine.render("{{> p}}", &json!({})),
        Err(Error::UnknownPartial(_))
    ));

    engine.register_partial("p", "two").unwrap();
    assert_eq!(engine.render("{{> p}}", &json!({})).unwrap(), "two");

    engine.remove_all_partials();
    assert!(!engine.has_partial("p"));
}

#[test]
fn test_recursive_partial_with_depth_limit() {
    let engine = Engine::with_config(EngineConfig::default().with_max_partial_depth(3));
    engine
        .register_partial("node", "({{name}}{{#each children}}{{> node}}{{/each}})")
        .expect("Failed to register partial");

    let tree = json!({
        "name": "a",
        "children": [{"name": "b", "children": [{"name": "c", "children": []}]}]
    });
    assert_eq!(engine.render("{{> node}}", &tree).unwrap(), "(a(b(c)))");

    let deep = json!({
        "name": "1",
        "children": [{"name": "2", "children": [{"name": "3", "children": [{"name": "4"}]}]}]
    });
    let err = engine
        .render("{{> node}}", &deep)
        .expect_err("Fourth level should exceed the limit");
    assert!(matches!(
        err,
        Error::PartialDepthExceeded { ref name, limit: 3 } if name == "node"
    ));
}
