pub mod ast;
pub mod lexer;
pub mod parser;
pub mod renderer;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::partial::Partial;
use crate::value::ToValue;
use ast::Program;
use renderer::Renderer;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A compiled template bound to the engine that compiled it
///
/// The program is immutable and shared, so a template can be cloned and
/// rendered from many threads at once.
#[derive(Clone)]
pub struct Template {
    program: Arc<Program>,
    engine: Engine,
    partials: HashMap<String, Arc<Partial>>,
}

impl Template {
    pub(crate) fn new(program: Arc<Program>, engine: Engine) -> Self {
        Self {
            program,
            engine,
            partials: HashMap::new(),
        }
    }

    /// Render against a context value
    pub fn render<T: ToValue + ?Sized>(&self, context: &T) -> Result<String> {
        let mut renderer = Renderer::new(&self.engine, &self.partials, context.to_value());
        renderer.render(&self.program)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub(crate) fn shared_program(&self) -> Arc<Program> {
        Arc::clone(&self.program)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Register a partial visible only to this template
    ///
    /// Template partials are consulted before the engine's.
    pub fn register_partial(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<()> {
        self.insert_partial(Partial::from_source(name, source))
    }

    pub fn register_partial_template(
        &mut self,
        name: impl Into<String>,
        template: &Template,
    ) -> Result<()> {
        self.insert_partial(Partial::from_program(name, template.shared_program()))
    }

    fn insert_partial(&mut self, partial: Partial) -> Result<()> {
        if self.partials.contains_key(partial.name()) {
            return Err(Error::PartialAlreadyRegistered(partial.name().to_string()));
        }

        self.partials
            .insert(partial.name().to_string(), Arc::new(partial));
        Ok(())
    }

    pub fn has_partial(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut partials: Vec<&String> = self.partials.keys().collect();
        partials.sort();

        f.debug_struct("Template")
            .field("nodes", &self.program.nodes.len())
            .field("partials", &partials)
            .finish()
    }
}
