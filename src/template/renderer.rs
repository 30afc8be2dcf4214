use super::ast::{Block, Call, Expr, Node, PartialCall, PartialName, PathExpr, Program};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::helpers::{HelperDef, Options};
use crate::partial::Partial;
use crate::value::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Iteration state visible through `@index`, `@key`, `@first` and `@last`
#[derive(Debug, Clone, PartialEq)]
pub struct LoopMeta {
    pub index: usize,
    /// Sequence index as a number, or the map key / record lookup name
    pub key: Value,
    pub first: bool,
    pub last: bool,
}

impl LoopMeta {
    /// Metadata for element `index` of a collection of `len` elements
    pub fn new(index: usize, key: impl Into<Value>, len: usize) -> Self {
        Self {
            index,
            key: key.into(),
            first: index == 0,
            last: index + 1 == len,
        }
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "index" => Some(Value::from(self.index)),
            "key" => Some(self.key.clone()),
            "first" => Some(Value::Bool(self.first)),
            "last" => Some(Value::Bool(self.last)),
            _ => None,
        }
    }
}

/// One entry of the context stack
#[derive(Debug, Clone)]
pub struct Frame {
    pub this: Value,
    pub meta: Option<LoopMeta>,
}

impl Frame {
    pub fn new(this: Value) -> Self {
        Self { this, meta: None }
    }

    pub fn with_loop(this: Value, meta: LoopMeta) -> Self {
        Self {
            this,
            meta: Some(meta),
        }
    }
}

/// Tree-walking evaluator for a single render call
///
/// Each render owns its frame stack and output; the only shared state it
/// touches is the engine's registries.
pub struct Renderer<'e> {
    engine: &'e Engine,
    local_partials: &'e HashMap<String, Arc<Partial>>,
    root: Frame,
    stack: Vec<Frame>,
    partial_depth: usize,
}

impl<'e> Renderer<'e> {
    pub fn new(
        engine: &'e Engine,
        local_partials: &'e HashMap<String, Arc<Partial>>,
        root: Value,
    ) -> Self {
        Self {
            engine,
            local_partials,
            root: Frame::new(root),
            stack: Vec::new(),
            partial_depth: 0,
        }
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// Render a whole program against the root frame
    pub fn render(&mut self, program: &Program) -> Result<String> {
        let mut output = String::new();
        self.render_nodes(&program.nodes, &mut output)?;
        Ok(output)
    }

    pub(crate) fn current(&self) -> &Frame {
        self.stack.last().unwrap_or(&self.root)
    }

    /// Render nodes with the current frame unchanged
    pub(crate) fn render_to_string(&mut self, nodes: &[Node]) -> Result<String> {
        let mut output = String::new();
        self.render_nodes(nodes, &mut output)?;
        Ok(output)
    }

    /// Render nodes inside a new frame; the frame is popped even on error
    pub(crate) fn render_with_frame(&mut self, nodes: &[Node], frame: Frame) -> Result<String> {
        self.stack.push(frame);
        let result = self.render_to_string(nodes);
        self.stack.pop();
        result
    }

    fn render_nodes(&mut self, nodes: &[Node], output: &mut String) -> Result<()> {
        for node in nodes {
            self.render_node(node, output)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, output: &mut String) -> Result<()> {
        match node {
            Node::Text(text) => output.push_str(text),

            Node::Expression(call) => {
                let value = self.eval_call(call, None)?;
                output.push_str(&value.to_string());
            }

            Node::Block(block) => {
                let value = self.eval_call(&block.call, Some(block))?;
                output.push_str(&value.to_string());
            }

            Node::Partial(partial) => self.render_partial(partial, output)?,
        }

        Ok(())
    }

    /// Dispatch a call to a helper, or resolve it as a path
    ///
    /// Helpers win over context fields of the same name. A block or an
    /// expression with arguments must name a helper.
    fn eval_call(&mut self, call: &Call, block: Option<&Block>) -> Result<Value> {
        if let Some(name) = call.name.helper_name() {
            if let Some(helper) = self.engine.helper(name) {
                return self.invoke(name, helper.as_ref(), call, block);
            }
        }

        if block.is_some() || call.has_arguments() {
            return Err(Error::unknown_helper(&call.name.original));
        }

        Ok(self.resolve_path(&call.name))
    }

    fn invoke(
        &mut self,
        name: &str,
        helper: &dyn HelperDef,
        call: &Call,
        block: Option<&Block>,
    ) -> Result<Value> {
        let mut args = call
            .params
            .iter()
            .map(|expr| self.eval_expr(expr))
            .collect::<Result<Vec<_>>>()?;

        let mut hash = Map::new();
        for (key, expr) in &call.hash {
            let value = self.eval_expr(expr)?;
            hash.insert(key.clone(), value);
        }

        helper.signature().check(name, &mut args)?;

        let mut options = Options::new(name, hash, block, self);
        helper.call(&args, &mut options)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Path(path) => Ok(self.resolve_path(path)),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::SubExpr(call) => self.eval_call(call, None),
        }
    }

    /// Resolve a path against the current frame; never fails, missing data is Null
    pub(crate) fn resolve_path(&self, path: &PathExpr) -> Value {
        if !path.data {
            return walk(&self.current().this, &path.segments);
        }

        let Some((first, rest)) = path.segments.split_first() else {
            return Value::Null;
        };

        if first == "root" {
            return walk(&self.root.this, rest);
        }

        match self.loop_variable(first) {
            Some(value) => walk(&value, rest),
            None => Value::Null,
        }
    }

    /// Loop data comes from the innermost frame that carries any
    fn loop_variable(&self, name: &str) -> Option<Value> {
        self.stack
            .iter()
            .rev()
            .chain(std::iter::once(&self.root))
            .find_map(|frame| frame.meta.as_ref())
            .and_then(|meta| meta.get(name))
    }

    fn find_partial(&self, name: &str) -> Option<Arc<Partial>> {
        self.local_partials
            .get(name)
            .cloned()
            .or_else(|| self.engine.partial(name))
    }

    fn render_partial(&mut self, call: &PartialCall, output: &mut String) -> Result<()> {
        let name = match &call.name {
            PartialName::Static(name) => name.clone(),
            PartialName::Dynamic(sub) => self.eval_call(sub, None)?.to_string(),
        };

        let partial = self
            .find_partial(&name)
            .ok_or_else(|| Error::unknown_partial(&name))?;

        if let Some(limit) = self.engine.config().max_partial_depth {
            if self.partial_depth >= limit {
                return Err(Error::PartialDepthExceeded { name, limit });
            }
        }

        let program = partial.program()?;

        let mut context = match &call.context {
            Some(expr) => self.eval_expr(expr)?,
            None => self.current().this.clone(),
        };

        if !call.hash.is_empty() {
            let mut map = match context {
                Value::Map(map) => map,
                _ => Map::new(),
            };
            for (key, expr) in &call.hash {
                let value = self.eval_expr(expr)?;
                map.insert(key.clone(), value);
            }
            context = Value::Map(map);
        }

        self.partial_depth += 1;
        let result = self.render_with_frame(&program.nodes, Frame::new(context));
        self.partial_depth -= 1;

        output.push_str(&result?);
        Ok(())
    }
}

/// Resolve segments left to right, narrowing to Null when a step finds nothing
fn walk(value: &Value, segments: &[String]) -> Value {
    match segments.split_first() {
        None => value.clone(),
        Some((segment, rest)) => match value.get(segment) {
            Some(next) => walk(next, rest),
            None => walk(&value.lookup(segment), rest),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse;
    use crate::value::Record;
    use serde_json::json;

    fn render(source: &str, context: serde_json::Value) -> Result<String> {
        let engine = Engine::new();
        let program = parse(source)?;
        let partials = HashMap::new();
        let mut renderer = Renderer::new(&engine, &partials, Value::from(context));
        renderer.render(&program)
    }

    #[test]
    fn test_render_text() {
        let output = render("Hello World", json!({})).expect("Failed to render");
        assert_eq!(output, "Hello World");
    }

    #[test]
    fn test_render_variable() {
        let output =
            render("<h1>{{title}}</h1>", json!({"title": "foo"})).expect("Failed to render");
        assert_eq!(output, "<h1>foo</h1>");
    }

    #[test]
    fn test_no_escaping() {
        let output = render("{{html}}", json!({"html": "<b>&</b>"})).expect("Failed to render");
        assert_eq!(output, "<b>&</b>");
    }

    #[test]
    fn test_nested_and_missing_paths() {
        let context = json!({"body": {"content": "bar"}, "n": 5});
        assert_eq!(render("{{body.content}}", context.clone()).unwrap(), "bar");
        assert_eq!(render("{{body.missing}}", context.clone()).unwrap(), "");
        assert_eq!(render("{{n.deeper.still}}", context.clone()).unwrap(), "");
        assert_eq!(render("{{this.body.content}}", context).unwrap(), "bar");
    }

    #[test]
    fn test_sequence_index_and_length() {
        let context = json!({"items": ["a", "b", "c"], "name": "héllo"});
        assert_eq!(render("{{items.1}}", context.clone()).unwrap(), "b");
        assert_eq!(render("{{items.9}}", context.clone()).unwrap(), "");
        assert_eq!(render("{{items.length}}", context.clone()).unwrap(), "3");
        assert_eq!(render("{{name.length}}", context).unwrap(), "5");
    }

    #[test]
    fn test_real_key_shadows_virtual_property() {
        let output =
            render("{{box.length}}", json!({"box": {"length": "tall"}})).expect("Failed to render");
        assert_eq!(output, "tall");
    }

    #[test]
    fn test_stringification() {
        let context = json!({"flag": true, "n": 2.5, "list": [1, 2], "none": null});
        assert_eq!(
            render("{{flag}} {{n}} {{list}} [{{none}}]", context).unwrap(),
            "true 2.5 1,2 []"
        );
    }

    #[test]
    fn test_record_renamed_field() {
        let engine = Engine::new();
        let program = parse("{{content}}|{{body}}").unwrap();
        let partials = HashMap::new();
        let record = Record::new("Post").renamed_field("body", "content", "bar");
        let mut renderer = Renderer::new(&engine, &partials, Value::from(record));
        assert_eq!(renderer.render(&program).unwrap(), "bar|");
    }

    #[test]
    fn test_loop_metadata() {
        let output = render(
            "{{#each items}}{{@index}}:{{this}}{{#if @first}}^{{/if}}{{#if @last}}${{/if}} {{/each}}",
            json!({"items": ["a", "b", "c"]}),
        )
        .expect("Failed to render");
        assert_eq!(output, "0:a^ 1:b 2:c$ ");
    }

    #[test]
    fn test_loop_metadata_reaches_through_with() {
        let output = render(
            "{{#each people}}{{#with this}}{{@index}}-{{name}};{{/with}}{{/each}}",
            json!({"people": [{"name": "Ann"}, {"name": "Bo"}]}),
        )
        .expect("Failed to render");
        assert_eq!(output, "0-Ann;1-Bo;");
    }

    #[test]
    fn test_loop_variables_outside_loop() {
        assert_eq!(render("[{{@index}}{{@key}}]", json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_root_data_variable() {
        let output = render(
            "{{#each items}}{{@root.prefix}}{{this}} {{/each}}",
            json!({"prefix": "#", "items": [1, 2]}),
        )
        .expect("Failed to render");
        assert_eq!(output, "#1 #2 ");
    }

    #[test]
    fn test_unknown_helper() {
        let err = render("{{missing 1}}", json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownHelper(name) if name == "missing"));

        let err = render("{{#missing}}x{{/missing}}", json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownHelper(_)));
    }

    #[test]
    fn test_frames_are_balanced() {
        let engine = Engine::new();
        let partials = HashMap::new();
        let mut renderer = Renderer::new(&engine, &partials, Value::from("root"));

        let nodes = parse("{{missing 1}}").unwrap().nodes;
        let result = renderer.render_with_frame(&nodes, Frame::new(Value::from("inner")));
        assert!(result.is_err());
        assert_eq!(renderer.current().this, Value::from("root"));
    }
}
