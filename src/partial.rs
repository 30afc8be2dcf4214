use crate::error::Result;
use crate::template::ast::Program;
use crate::template::parser;
use log::trace;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// A named sub-template, compiled on first use
///
/// Concurrent first uses block on a single compilation and all observe the
/// same program.
pub struct Partial {
    name: String,
    source: Option<String>,
    program: OnceCell<Arc<Program>>,
}

impl Partial {
    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: Some(source.into()),
            program: OnceCell::new(),
        }
    }

    /// Wrap an already compiled program
    pub fn from_program(name: impl Into<String>, program: Arc<Program>) -> Self {
        Self {
            name: name.into(),
            source: None,
            program: OnceCell::with_value(program),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text, if registered from source
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_compiled(&self) -> bool {
        self.program.get().is_some()
    }

    /// The compiled program, compiling it if this is the first use
    pub fn program(&self) -> Result<Arc<Program>> {
        self.program
            .get_or_try_init(|| {
                trace!("Compiling partial '{}'", self.name);
                let source = self.source.as_deref().unwrap_or_default();
                parser::parse(source)
                    .map(Arc::new)
                    .map_err(|err| err.with_context(format!("compiling partial '{}'", self.name)))
            })
            .cloned()
    }
}

impl fmt::Debug for Partial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partial")
            .field("name", &self.name)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}
