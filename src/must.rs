//! Panicking shorthands for templates known to be valid at build time
//!
//! Everything else in the crate returns errors.

use crate::engine::Engine;
use crate::template::Template;
use crate::value::ToValue;

impl Engine {
    /// Compile, panicking with the syntax error's message on failure
    #[allow(clippy::panic)]
    pub fn must_compile(&self, source: &str) -> Template {
        match self.compile(source) {
            Ok(template) => template,
            Err(err) => panic!("{}", err),
        }
    }

    #[allow(clippy::panic)]
    pub fn must_render<T: ToValue + ?Sized>(&self, source: &str, context: &T) -> String {
        match self.render(source, context) {
            Ok(output) => output,
            Err(err) => panic!("{}", err),
        }
    }
}

impl Template {
    #[allow(clippy::panic)]
    pub fn must_render<T: ToValue + ?Sized>(&self, context: &T) -> String {
        match self.render(context) {
            Ok(output) => output,
            Err(err) => panic!("{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Engine;
    use serde_json::json;

    #[test]
    fn test_must_succeeds() {
        let engine = Engine::new();
        let template = engine.must_compile("Hi {{name}}");
        assert_eq!(template.must_render(&json!({"name": "Sam"})), "Hi Sam");
        assert_eq!(engine.must_render("{{n}}", &json!({"n": 1})), "1");
    }

    #[test]
    #[should_panic(expected = "unmatched block \"if\", expected close for \"each\"")]
    fn test_must_compile_panics_on_syntax_error() {
        Engine::new().must_compile("{{#each xs}}{{/if}}");
    }

    #[test]
    #[should_panic(expected = "Unknown helper: nope")]
    fn test_must_render_panics_on_render_error() {
        let template = Engine::new().must_compile("{{nope 1}}");
        template.must_render(&json!({}));
    }
}
