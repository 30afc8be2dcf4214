use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::helpers::{builtin, HelperDef, IntoHelper};
use crate::partial::Partial;
use crate::template::{parser, Template};
use crate::value::ToValue;
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type HelperRegistry = HashMap<String, Arc<dyn HelperDef>>;
type PartialRegistry = HashMap<String, Arc<Partial>>;

/// Compiles templates and owns the helper and partial registries
///
/// Cloning is cheap and clones share registries. Lookups during rendering
/// take read locks, so concurrent renders never wait on each other;
/// registration and removal take the write lock.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    helpers: RwLock<HelperRegistry>,
    partials: RwLock<PartialRegistry>,
    config: EngineConfig,
}

// A panic while holding a registry lock cannot leave a map half-updated,
// so poisoned locks are recovered.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    /// Create an engine with default configuration and the built-in helpers
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut helpers = HelperRegistry::new();
        builtin::register(&mut helpers);

        Self {
            inner: Arc::new(EngineInner {
                helpers: RwLock::new(helpers),
                partials: RwLock::new(PartialRegistry::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Compile a template source
    pub fn compile(&self, source: &str) -> Result<Template> {
        let program = parser::parse(source)?;
        trace!("Compiled template ({} top-level nodes)", program.nodes.len());
        Ok(Template::new(Arc::new(program), self.clone()))
    }

    /// Compile and render in one step
    ///
    /// The source is recompiled on every call; keep the [`Template`] from
    /// [`compile`](Self::compile) when rendering repeatedly.
    pub fn render<T: ToValue + ?Sized>(&self, source: &str, context: &T) -> Result<String> {
        self.compile(source)?.render(context)
    }

    /// Register a helper; fails if the name is already taken
    pub fn register_helper<H: HelperDef + 'static>(
        &self,
        name: impl Into<String>,
        helper: H,
    ) -> Result<()> {
        let name = name.into();
        let mut helpers = write(&self.inner.helpers);

        if helpers.contains_key(&name) {
            return Err(Error::HelperAlreadyRegistered(name));
        }

        debug!("Registered helper '{}'", name);
        helpers.insert(name, Arc::new(helper));
        Ok(())
    }

    /// Register a closure with typed parameters
    ///
    /// ```
    /// let engine = rustbars::Engine::new();
    /// engine
    ///     .register_fn("repeat", |s: String, n: i64| s.repeat(n.max(0) as usize))
    ///     .unwrap();
    /// let output = engine.render("{{repeat \"ab\" 3}}", &rustbars::Value::Null).unwrap();
    /// assert_eq!(output, "ababab");
    /// ```
    pub fn register_fn<M, F: IntoHelper<M>>(&self, name: impl Into<String>, f: F) -> Result<()> {
        self.register_helper(name, f.into_helper())
    }

    /// Remove a helper, returning whether it was registered
    pub fn remove_helper(&self, name: &str) -> bool {
        let removed = write(&self.inner.helpers).remove(name).is_some();
        if removed {
            debug!("Removed helper '{}'", name);
        }
        removed
    }

    pub fn has_helper(&self, name: &str) -> bool {
        read(&self.inner.helpers).contains_key(name)
    }

    pub(crate) fn helper(&self, name: &str) -> Option<Arc<dyn HelperDef>> {
        read(&self.inner.helpers).get(name).cloned()
    }

    /// Register a partial from source; it is compiled on first use
    pub fn register_partial(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<()> {
        self.insert_partial(Partial::from_source(name, source))
    }

    /// Register a compiled template as a partial
    pub fn register_partial_template(
        &self,
        name: impl Into<String>,
        template: &Template,
    ) -> Result<()> {
        self.insert_partial(Partial::from_program(name, template.shared_program()))
    }

    /// Register several partials at once
    ///
    /// Nothing is registered if any name conflicts, with the registry or
    /// within the batch.
    pub fn register_partials<I, N, S>(&self, partials: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let batch: Vec<Partial> = partials
            .into_iter()
            .map(|(name, source)| Partial::from_source(name, source))
            .collect();

        let mut registry = write(&self.inner.partials);

        for (position, partial) in batch.iter().enumerate() {
            let repeated = batch[..position].iter().any(|p| p.name() == partial.name());
            if repeated || registry.contains_key(partial.name()) {
                return Err(Error::PartialAlreadyRegistered(partial.name().to_string()));
            }
        }

        for partial in batch {
            debug!("Registered partial '{}'", partial.name());
            registry.insert(partial.name().to_string(), Arc::new(partial));
        }
        Ok(())
    }

    fn insert_partial(&self, partial: Partial) -> Result<()> {
        let mut registry = write(&self.inner.partials);

        if registry.contains_key(partial.name()) {
            return Err(Error::PartialAlreadyRegistered(partial.name().to_string()));
        }

        debug!("Registered partial '{}'", partial.name());
        registry.insert(partial.name().to_string(), Arc::new(partial));
        Ok(())
    }

    /// Register a partial, replacing any existing one of the same name
    ///
    /// The swap happens under a single write lock, so concurrent renders see
    /// either the old partial or the new one. Returns whether a partial was
    /// replaced.
    pub fn replace_partial(&self, name: impl Into<String>, source: impl Into<String>) -> bool {
        let partial = Partial::from_source(name, source);
        let name = partial.name().to_string();
        let replaced = write(&self.inner.partials)
            .insert(name.clone(), Arc::new(partial))
            .is_some();

        if replaced {
            debug!("Replaced partial '{}'", name);
        } else {
            debug!("Registered partial '{}'", name);
        }
        replaced
    }

    /// Remove a partial, returning whether it was registered
    pub fn remove_partial(&self, name: &str) -> bool {
        let removed = write(&self.inner.partials).remove(name).is_some();
        if removed {
            debug!("Removed partial '{}'", name);
        }
        removed
    }

    pub fn remove_all_partials(&self) {
        let mut registry = write(&self.inner.partials);
        debug!("Removed all {} partials", registry.len());
        registry.clear();
    }

    pub fn has_partial(&self, name: &str) -> bool {
        read(&self.inner.partials).contains_key(name)
    }

    /// Registered partial names, sorted
    pub fn partial_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.inner.partials).keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn partial(&self, name: &str) -> Option<Arc<Partial>> {
        read(&self.inner.partials).get(name).cloned()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut helpers: Vec<String> = read(&self.inner.helpers).keys().cloned().collect();
        helpers.sort();

        f.debug_struct("Engine")
            .field("helpers", &helpers)
            .field("partials", &self.partial_names())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::Options;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let engine = Engine::new();
        for name in builtin::NAMES {
            assert!(engine.has_helper(name), "missing built-in {}", name);
        }
    }

    #[test]
    fn test_duplicate_helper_rejected() {
        let engine = Engine::new();
        engine
            .register_fn("shout", |s: String| s.to_uppercase())
            .expect("Failed to register helper");

        let err = engine
            .register_fn("shout", |s: String| s.to_lowercase())
            .unwrap_err();
        assert!(matches!(err, Error::HelperAlreadyRegistered(ref name) if name == "shout"));

        let err = engine.register_fn("if", || true).unwrap_err();
        assert!(err.is_registration_conflict());
    }

    #[test]
    fn test_remove_helper() {
        let engine = Engine::new();
        engine.register_fn("answer", || 42).unwrap();
        assert_eq!(engine.render("{{answer}}", &json!({})).unwrap(), "42");

        assert!(engine.remove_helper("answer"));
        assert!(!engine.remove_helper("answer"));
        assert_eq!(
            engine.render("{{answer}}", &json!({"answer": "field"})).unwrap(),
            "field"
        );
    }

    #[test]
    fn test_helper_shadows_field() {
        let engine = Engine::new();
        engine.register_fn("title", || "from helper").unwrap();
        let output = engine
            .render("{{title}}", &json!({"title": "from data"}))
            .expect("Failed to render");
        assert_eq!(output, "from helper");
    }

    #[test]
    fn test_raw_closure_helper() {
        let engine = Engine::new();
        engine
            .register_helper(
                "wrap",
                |args: &[Value], options: &mut Options<'_, '_>| -> Result<Value> {
                    let tag = options
                        .hash_value("tag")
                        .map(Value::to_string)
                        .unwrap_or_else(|| "span".to_string());
                    let body = if options.is_block() {
                        options.render_block()?
                    } else {
                        args.iter().map(Value::to_string).collect()
                    };
                    Ok(Value::String(format!("<{tag}>{body}</{tag}>")))
                },
            )
            .unwrap();

        let output = engine
            .render(
                "{{wrap a b}} {{#wrap tag=\"b\"}}{{name}}{{/wrap}}",
                &json!({"a": 1, "b": 2, "name": "x"}),
            )
            .expect("Failed to render");
        assert_eq!(output, "<span>12</span> <b>x</b>");
    }

    #[test]
    fn test_duplicate_partial_rejected() {
        let engine = Engine::new();
        engine.register_partial("greet", "Hi {{name}}").unwrap();

        let err = engine.register_partial("greet", "Hello").unwrap_err();
        assert!(matches!(err, Error::PartialAlreadyRegistered(ref name) if name == "greet"));

        let template = engine.compile("other").unwrap();
        assert!(engine.register_partial_template("greet", &template).is_err());
    }

    #[test]
    fn test_register_partials_is_all_or_nothing() {
        let engine = Engine::new();
        engine.register_partial("b", "B").unwrap();

        let err = engine
            .register_partials(vec![("a", "A"), ("b", "again")])
            .unwrap_err();
        assert!(err.is_registration_conflict());
        assert!(!engine.has_partial("a"));

        assert!(engine.register_partials([("x", "1"), ("x", "2")]).is_err());
        assert!(!engine.has_partial("x"));

        engine
            .register_partials([("a", "A"), ("c", "C")])
            .expect("Failed to register partials");
        assert_eq!(engine.partial_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_partials() {
        let engine = Engine::new();
        engine.register_partials([("a", "A"), ("b", "B")]).unwrap();

        assert!(engine.remove_partial("a"));
        assert!(!engine.has_partial("a"));
        assert!(!engine.remove_partial("a"));

        engine.remove_all_partials();
        assert!(engine.partial_names().is_empty());

        engine.register_partial("a", "again").expect("Name should be free again");
    }

    #[test]
    fn test_replace_partial() {
        let engine = Engine::new();
        assert!(!engine.replace_partial("footer", "v1"));
        assert_eq!(engine.render("{{> footer}}", &json!({})).unwrap(), "v1");

        assert!(engine.replace_partial("footer", "v2 {{year}}"));
        assert_eq!(
            engine.render("{{> footer}}", &json!({"year": 2024})).unwrap(),
            "v2 2024"
        );
        assert_eq!(engine.partial_names(), vec!["footer"]);
    }

    #[test]
    fn test_clones_share_registries() {
        let engine = Engine::new();
        let clone = engine.clone();
        clone.register_partial("shared", "S").unwrap();
        assert!(engine.has_partial("shared"));
    }
}
