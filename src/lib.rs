//! rustbars - a Handlebars-family template engine
//!
//! Templates are compiled once into an immutable program and rendered against
//! a [`Value`] tree any number of times, from any number of threads:
//!
//! ```
//! use rustbars::Engine;
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! engine.register_partial("user", "{{name}} ({{@index}})").unwrap();
//!
//! let template = engine
//!     .compile("{{#each users}}{{> user}}{{#unless @last}}, {{/unless}}{{/each}}")
//!     .unwrap();
//!
//! let output = template
//!     .render(&json!({"users": [{"name": "Ann"}, {"name": "Bo"}]}))
//!     .unwrap();
//! assert_eq!(output, "Ann (0), Bo (1)");
//! ```
//!
//! Output is never HTML-escaped.

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod config;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod loader;
mod must;
pub mod partial;
pub mod template;
pub mod value;

pub use config::{Config, EngineConfig, LoaderConfig};
pub use engine::Engine;
pub use error::{Error, Result, SyntaxError};
pub use helpers::{FromValue, HelperDef, IntoHelperOutput, Options, ParamKind, Signature};
pub use loader::Templater;
pub use template::renderer::LoopMeta;
pub use template::Template;
pub use value::{Map, Record, ToValue, Value};

use once_cell::sync::Lazy;

static GLOBAL: Lazy<Engine> = Lazy::new(Engine::new);

/// Process-wide engine, created on first use
///
/// Handy for applications with a single set of helpers and partials;
/// libraries should create their own [`Engine`].
pub fn global() -> &'static Engine {
    &GLOBAL
}
