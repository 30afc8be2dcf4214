//! Loading templates and partials from the filesystem
//!
//! Files are keyed by their base name, extension included, so
//! `views/blog/post.hbs` becomes `post.hbs`.

use crate::config::{Config, LoaderConfig};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::template::Template;
use crate::value::ToValue;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

impl Engine {
    /// Read and compile a template file
    pub fn compile_file<P: AsRef<Path>>(&self, path: P) -> Result<Template> {
        let path_ref = path.as_ref();
        let source = fs::read_to_string(path_ref)?;
        self.compile(&source)
            .map_err(|e| e.with_context(format!("compiling template '{}'", path_ref.display())))
    }
}

/// Directory-backed template store
pub struct Templater {
    engine: Engine,
    config: LoaderConfig,
    templates: Mutex<HashMap<String, Template>>,
}

impl Templater {
    pub fn new() -> Self {
        Self::with_engine(Engine::new())
    }

    /// Load into an existing engine; partials land in its registry
    pub fn with_engine(engine: Engine) -> Self {
        Self {
            engine,
            config: LoaderConfig::default(),
            templates: Mutex::new(HashMap::new()),
        }
    }

    /// Build a fresh engine and loader from configuration
    pub fn with_config(config: Config) -> Self {
        Self {
            engine: Engine::with_config(config.engine),
            config: config.loader,
            templates: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile every matching file under `dir`, replacing same-named templates
    ///
    /// Returns the number of templates loaded. Nothing is stored if any file
    /// fails to compile.
    pub fn load_templates<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let mut loaded = Vec::new();
        for path in self.discover(dir.as_ref())? {
            let name = template_name(&path)?;
            let template = self.engine.compile_file(&path)?;
            loaded.push((name, template));
        }

        let count = loaded.len();
        let mut templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
        for (name, template) in loaded {
            if templates.insert(name.clone(), template).is_some() {
                warn!("Replaced template '{}'", name);
            }
        }

        debug!("Loaded {} templates from {}", count, dir.as_ref().display());
        Ok(count)
    }

    /// Register every matching file under `dir` as an engine partial
    ///
    /// Existing partials of the same name are replaced.
    pub fn load_partials<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let mut count = 0;

        for path in self.discover(dir.as_ref())? {
            let name = template_name(&path)?;
            let source = fs::read_to_string(&path)?;

            if self.engine.replace_partial(name.as_str(), source) {
                warn!("Replaced partial '{}' from {}", name, path.display());
            }
            count += 1;
        }

        debug!("Loaded {} partials from {}", count, dir.as_ref().display());
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<Template> {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Render a loaded template by name
    pub fn render<T: ToValue + ?Sized>(&self, name: &str, context: &T) -> Result<String> {
        let template = self
            .get(name)
            .ok_or_else(|| Error::UnknownTemplate(name.to_string()))?;
        template.render(context)
    }

    /// Loaded template names, sorted
    pub fn names(&self) -> Vec<String> {
        let templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = templates.keys().cloned().collect();
        names.sort();
        names
    }

    fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let mut paths = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && self.config.accepts(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        Ok(paths)
    }
}

impl Default for Templater {
    fn default() -> Self {
        Self::new()
    }
}

fn template_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::config(format!("invalid template file name '{}'", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    #[test]
    fn test_compile_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write(dir.path(), "page.hbs", "<h1>{{title}}</h1>");

        let engine = Engine::new();
        let template = engine
            .compile_file(dir.path().join("page.hbs"))
            .expect("Failed to compile file");
        assert_eq!(template.render(&json!({"title": "foo"})).unwrap(), "<h1>foo</h1>");

        let missing = engine.compile_file(dir.path().join("missing.hbs"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_templates_and_partials() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write(dir.path(), "views/index.hbs", "{{> header.hbs}}body");
        write(dir.path(), "views/blog/post.hbs", "{{> header.hbs}}{{title}}");
        write(dir.path(), "partials/header.hbs", "[{{site}}]");

        let templater = Templater::new();
        assert_eq!(templater.load_partials(dir.path().join("partials")).unwrap(), 1);
        assert_eq!(templater.load_templates(dir.path().join("views")).unwrap(), 2);
        assert_eq!(templater.names(), vec!["index.hbs", "post.hbs"]);
        assert_eq!(templater.engine().partial_names(), vec!["header.hbs"]);

        let output = templater
            .render("post.hbs", &json!({"site": "s", "title": "t"}))
            .expect("Failed to render");
        assert_eq!(output, "[s]t");
        assert!(templater.get("post").is_none());

        let err = templater.render("missing.hbs", &json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownTemplate(ref name) if name == "missing.hbs"));
        assert!(err.is_render());
        assert!(!err.is_syntax());
    }

    #[test]
    fn test_reload_partials_replaces() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write(dir.path(), "footer.hbs", "v1");

        let templater = Templater::new();
        templater.load_partials(dir.path()).unwrap();

        write(dir.path(), "footer.hbs", "v2");
        templater.load_partials(dir.path()).expect("Reload should replace");

        let output = templater.engine().render("{{> footer.hbs}}", &json!({})).unwrap();
        assert_eq!(output, "v2");
    }

    #[test]
    fn test_loader_config() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write(dir.path(), "a.hbs", "A");
        write(dir.path(), "notes.txt", "ignored");
        write(dir.path(), "nested/b.hbs", "B");

        let mut config = Config::default();
        config.loader.extensions = vec!["hbs".to_string()];
        config.loader.recursive = false;

        let templater = Templater::with_config(config);
        assert_eq!(templater.load_templates(dir.path()).unwrap(), 1);
        assert_eq!(templater.names(), vec!["a.hbs"]);
    }

    #[test]
    fn test_broken_template_loads_nothing() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write(dir.path(), "a.hbs", "fine");
        write(dir.path(), "b.hbs", "{{#if x}}");

        let templater = Templater::new();
        let err = templater.load_templates(dir.path()).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.to_string().contains("b.hbs"));
        assert!(templater.names().is_empty());
    }
}
