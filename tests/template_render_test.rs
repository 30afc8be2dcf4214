use rustbars::{Engine, Record, ToValue, Value};
use serde_json::json;

#[test]
fn test_round_trip() {
    let engine = Engine::new();
    let template = engine
        .compile("<h1>{{title}}</h1>")
        .expect("Failed to compile template");

    let result = template
        .render(&json!({"title": "foo"}))
        .expect("Failed to render template");
    assert_eq!(result, "<h1>foo</h1>");
}

#[test]
fn test_nested_path_resolution() {
    let engine = Engine::new();
    let context = json!({"body": {"content": "bar"}});

    let result = engine
        .render("{{body.content}}", &context)
        .expect("Failed to render nested path");
    assert_eq!(result, "bar");

    let result = engine
        .render("{{body.missing}}", &context)
        .expect("Missing keys should render empty");
    assert_eq!(result, "", "Null should render as empty string");
}

#[test]
fn test_each_renders_in_order_with_index() {
    let engine = Engine::new();
    let template = engine
        .compile("{{#each items}}[{{@index}}:{{name}}]{{/each}}")
        .expect("Failed to compile template");

    let result = template
        .render(&json!({"items": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}))
        .expect("Failed to render loop");
    assert_eq!(result, "[0:a][1:b][2:c]");
}

#[test]
fn test_nested_each_keeps_inner_metadata() {
    let engine = Engine::new();
    let result = engine
        .render(
            "{{#each rows}}{{#each this}}{{@index}}{{/each}}|{{@index}};{{/each}}",
            &json!({"rows": [["x", "y"], ["z"]]}),
        )
        .expect("Failed to render nested loops");
    assert_eq!(result, "01|0;0|1;");
}

#[test]
fn test_truthiness_both_branches() {
    let engine = Engine::new();
    let if_template = engine
        .compile("{{#if v}}T{{else}}F{{/if}}")
        .expect("Failed to compile if");
    let unless_template = engine
        .compile("{{#unless v}}T{{else}}F{{/unless}}")
        .expect("Failed to compile unless");

    let falsy = [json!(""), json!(null), json!(0), json!([])];
    let truthy = [json!("x"), json!(3), json!([1])];

    for value in falsy {
        let context = json!({ "v": value.clone() });
        assert_eq!(if_template.render(&context).unwrap(), "F", "if {}", value);
        assert_eq!(unless_template.render(&context).unwrap(), "T", "unless {}", value);
    }

    for value in truthy {
        let context = json!({ "v": value.clone() });
        assert_eq!(if_template.render(&context).unwrap(), "T", "if {}", value);
        assert_eq!(unless_template.render(&context).unwrap(), "F", "unless {}", value);
    }
}

#[test]
fn test_idempotent_rendering() {
    let engine = Engine::new();
    engine
        .register_partial("row", "<li>{{@index}} {{this}}</li>")
        .expect("Failed to register partial");
    let template = engine
        .compile("<ul>{{#each xs}}{{> row}}{{/each}}</ul>{{#with meta}}{{count}}{{/with}}")
        .expect("Failed to compile template");

    let context = json!({"xs": ["a", "b"], "meta": {"count": 2}});
    let first = template.render(&context).expect("First render failed");
    let second = template.render(&context).expect("Second render failed");
    assert_eq!(first, "<ul><li>0 a</li><li>1 b</li></ul>2");
    assert_eq!(first, second);
}

struct Article {
    title: String,
    body_text: String,
    tags: Vec<String>,
}

impl ToValue for Article {
    fn to_value(&self) -> Value {
        Record::new("Article")
            .field("title", &self.title)
            .renamed_field("body_text", "content", &self.body_text)
            .field("tags", &self.tags)
            .into()
    }
}

#[test]
fn test_record_field_rename() {
    let article = Article {
        title: "Hello".to_string(),
        body_text: "bar".to_string(),
        tags: vec!["rust".to_string(), "templates".to_string()],
    };

    let engine = Engine::new();
    let result = engine
        .render(
            "{{title}}: {{content}}{{body_text}} ({{tags.length}})",
            &article,
        )
        .expect("Failed to render record");
    assert_eq!(result, "Hello: bar (2)");

    let result = engine
        .render("{{#each this}}{{@key}};{{/each}}", &article)
        .expect("Failed to iterate record");
    assert_eq!(result, "title;content;tags;");
}

#[test]
fn test_serialize_context() {
    #[derive(serde::Serialize)]
    struct Page {
        title: &'static str,
        items: Vec<u32>,
    }

    let value = Value::from_serialize(&Page {
        title: "List",
        items: vec![1, 2, 3],
    })
    .expect("Failed to convert page");

    let result = Engine::new()
        .render("{{title}}: {{#each items}}{{this}}{{/each}}", &value)
        .expect("Failed to render");
    assert_eq!(result, "List: 123");
}

#[test]
fn test_literals_and_subexpressions() {
    let engine = Engine::new();
    engine
        .register_fn("add", |a: f64, b: f64| a + b)
        .expect("Failed to register add");
    engine
        .register_fn("concat", |a: String, b: String| format!("{}{}", a, b))
        .expect("Failed to register concat");

    let result = engine
        .render(
            "{{add 1 (add 2 3.5)}} {{concat 'it' \"\\\"ok\\\"\"}}",
            &json!({}),
        )
        .expect("Failed to render");
    assert_eq!(result, "6.5 it\"ok\"");
}

#[test]
fn test_comments_and_this() {
    let engine = Engine::new();
    let result = engine
        .render(
            "{{! short }}{{!-- long with }} inside --}}{{#each xs}}{{.}}{{this}}{{/each}}",
            &json!({"xs": [1, 2]}),
        )
        .expect("Failed to render");
    assert_eq!(result, "1122");
}
