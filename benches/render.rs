use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustbars::{Engine, Value};
use serde_json::json;

const PAGE: &str = r#"<html><head><title>{{title}}</title></head>
<body>
{{> header}}
<ul>
{{#each posts}}
  <li class="{{#if @first}}first{{/if}}">{{@index}}. {{title}} by {{author.name}}
    {{#each tags}}<span>{{this}}</span>{{/each}}
    {{#unless published}}(draft){{/unless}}
  </li>
{{else}}
  <li>No posts</li>
{{/each}}
</ul>
</body></html>"#;

fn context() -> Value {
    let posts: Vec<_> = (0..50)
        .map(|i| {
            json!({
                "title": format!("Post {}", i),
                "author": {"name": "Ann"},
                "tags": ["rust", "templates", "bench"],
                "published": i % 3 != 0,
            })
        })
        .collect();

    Value::from(json!({"title": "Blog", "site": "example.org", "posts": posts}))
}

fn engine() -> Engine {
    let engine = Engine::new();
    engine
        .register_partial("header", "<header>{{site}}</header>")
        .unwrap();
    engine
}

fn benchmark_compile(c: &mut Criterion) {
    let engine = engine();

    c.bench_function("compile_page", |b| {
        b.iter(|| {
            let template = engine.compile(black_box(PAGE)).unwrap();
            black_box(template);
        })
    });
}

fn benchmark_render(c: &mut Criterion) {
    let engine = engine();
    let template = engine.compile(PAGE).unwrap();
    let context = context();

    c.bench_function("render_page_50_posts", |b| {
        b.iter(|| {
            let output = template.render(black_box(&context)).unwrap();
            black_box(output);
        })
    });

    c.bench_function("render_one_shot", |b| {
        b.iter(|| {
            let output = engine
                .render(black_box("{{title}}: {{posts.length}} posts"), &context)
                .unwrap();
            black_box(output);
        })
    });
}

fn benchmark_helpers(c: &mut Criterion) {
    let engine = engine();
    engine
        .register_fn("shout", |s: String| s.to_uppercase())
        .unwrap();
    let template = engine
        .compile("{{#each posts}}{{shout title}}{{#if (equal @index 3)}}!{{/if}}{{/each}}")
        .unwrap();
    let context = context();

    c.bench_function("render_typed_helpers", |b| {
        b.iter(|| {
            let output = template.render(black_box(&context)).unwrap();
            black_box(output);
        })
    });
}

criterion_group!(benches, benchmark_compile, benchmark_render, benchmark_helpers);
criterion_main!(benches);
