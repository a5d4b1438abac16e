//! Project templates.
//!
//! Every file under a project's `templates/` directory is a [Tera] template
//! rendered against the project's effective values:
//!
//! ```text
//! {% import "_common.helper" as common %}
//! services:
//!   {{ web.name }}:
//!     image: {{ common::image(name=web.image) }}
//! {%- if redis.enabled %}
//!   redis:
//!     image: redis:{{ redis.tag }}
//! {%- endif %}
//! ```
//!
//! Substituting a key that does not exist is an error. Conditionals treat a
//! missing key as false, which lets values switch whole service definitions
//! on and off.
//!
//! Files ending in `.helper` hold shared definitions (macros, partials).
//! They can be imported or included by any template of the same project and
//! are never rendered on their own.

use crate::error::{DcpmError, Result};
use crate::render::walk_error;
use crate::values::ValueTree;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{debug, instrument};
use walkdir::WalkDir;

/// Extension of shared definition files.
pub const HELPER_EXTENSION: &str = "helper";

/// A template file read from disk.
struct Source {
    /// Tera template name: path relative to the templates directory, `/`-separated.
    name: String,
    relative: PathBuf,
    path: PathBuf,
    content: String,
}

/// All templates of one project, parsed together with its helpers.
pub struct TemplateSet {
    tera: Tera,
    templates: Vec<Source>,
}

impl TemplateSet {
    /// Read and parse every file under `dir`.
    #[instrument]
    pub fn load(dir: &Path) -> Result<Self> {
        let mut helpers = Vec::new();
        let mut templates = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(dir).map_err(|e| DcpmError::Other(e.into()))?;
            let source = Source {
                name: template_name(relative),
                relative: relative.to_path_buf(),
                path: path.to_path_buf(),
                content: std::fs::read_to_string(path).map_err(|e| DcpmError::io(path, e))?,
            };

            if is_helper(path) {
                helpers.push(source);
            } else {
                templates.push(source);
            }
        }

        Self::build(dir, helpers, templates)
    }

    fn build(dir: &Path, helpers: Vec<Source>, templates: Vec<Source>) -> Result<Self> {
        let mut tera = Tera::default();
        // rendered output is YAML and config files, never HTML
        tera.autoescape_on(Vec::new());

        tera.add_raw_templates(helpers.iter().map(|h| (h.name.as_str(), h.content.as_str())))
            .map_err(|e| invalid(dir, &e))?;
        for template in &templates {
            tera.add_raw_template(&template.name, &template.content)
                .map_err(|e| invalid(&template.path, &e))?;
        }

        debug!(templates = templates.len(), helpers = helpers.len(), "Parsed templates");
        Ok(Self { tera, templates })
    }

    /// Render every template against `values`, keyed by path relative to
    /// the templates directory.
    pub fn render(&self, values: &ValueTree) -> Result<Vec<(PathBuf, String)>> {
        let context =
            Context::from_serialize(values.to_value()).map_err(|e| DcpmError::Other(e.into()))?;

        self.templates
            .iter()
            .map(|template| {
                let text = self
                    .tera
                    .render(&template.name, &context)
                    .map_err(|e| render_error(&template.path, e))?;
                Ok((template.relative.clone(), text))
            })
            .collect()
    }
}

fn is_helper(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(HELPER_EXTENSION)
}

fn template_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn render_error(template: &Path, err: tera::Error) -> DcpmError {
    match missing_variable(&err) {
        Some(key) => DcpmError::MissingValue { key, template: template.to_path_buf() },
        None => invalid(template, &err),
    }
}

fn invalid(template: &Path, err: &tera::Error) -> DcpmError {
    DcpmError::InvalidTemplate { template: template.to_path_buf(), reason: error_chain(err) }
}

/// Key of a "Variable `<key>` not found in context" error anywhere in the chain.
fn missing_variable(err: &tera::Error) -> Option<String> {
    let mut current = Some(err as &(dyn StdError + 'static));
    while let Some(e) = current {
        let message = e.to_string();
        if let Some((key, tail)) =
            message.strip_prefix("Variable `").and_then(|rest| rest.split_once('`'))
        {
            if tail.contains("not found in context") {
                return Some(key.to_string());
            }
        }
        current = e.source();
    }
    None
}

fn error_chain(err: &tera::Error) -> String {
    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        messages.push(e.to_string());
        current = e.source();
    }
    messages.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source(name: &str, content: &str) -> Source {
        Source {
            name: name.to_string(),
            relative: PathBuf::from(name),
            path: PathBuf::from(name),
            content: content.to_string(),
        }
    }

    fn render_with(helpers: &[(&str, &str)], body: &str, yaml: &str) -> Result<String> {
        let helpers = helpers.iter().map(|(name, content)| source(name, content)).collect();
        let templates = vec![source("test.yaml", body)];
        let set = TemplateSet::build(Path::new("templates"), helpers, templates)?;
        let mut rendered = set.render(&ValueTree::parse(yaml).unwrap())?;
        Ok(rendered.remove(0).1)
    }

    fn render(body: &str, yaml: &str) -> Result<String> {
        render_with(&[], body, yaml)
    }

    #[test]
    fn test_substitution() {
        let values = "web:\n  image: nginx\n  tag: 1.25\n";
        let out = render("image: {{ web.image }}:{{ web.tag }}\n", values);
        assert_eq!(out.unwrap(), "image: nginx:1.25\n");
    }

    #[test]
    fn test_missing_value_names_key_and_template() {
        match render("{{ web.name }}", "web: {}\n").unwrap_err() {
            DcpmError::MissingValue { key, template } => {
                assert_eq!(key, "web.name");
                assert_eq!(template, PathBuf::from("test.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conditionals() {
        let source = "{% if redis.enabled %}redis{% else %}none{% endif %}";
        assert_eq!(render(source, "redis:\n  enabled: true\n").unwrap(), "redis");
        assert_eq!(render(source, "redis:\n  enabled: false\n").unwrap(), "none");
        assert_eq!(render(source, "{}\n").unwrap(), "none");
        assert_eq!(render("{% if not debug %}quiet{% endif %}", "").unwrap(), "quiet");
    }

    #[test]
    fn test_whitespace_control() {
        let source = "services:\n  web: {}\n{%- if redis %}\n  redis: {}\n{%- endif %}\n";
        assert_eq!(render(source, "redis: true\n").unwrap(), "services:\n  web: {}\n  redis: {}\n");
        assert_eq!(render(source, "redis: false\n").unwrap(), "services:\n  web: {}\n");
    }

    #[test]
    fn test_loop_over_sequence() {
        let source = "{% for port in ports %}- {{ port }}\n{% endfor %}";
        assert_eq!(render(source, "ports: [80, 443]\n").unwrap(), "- 80\n- 443\n");
    }

    #[test]
    fn test_output_is_not_escaped() {
        let out = render("{{ cmd }}", "cmd: \"<run> && 'exit'\"\n").unwrap();
        assert_eq!(out, "<run> && 'exit'");
    }

    #[test]
    fn test_helper_macros() {
        let helper = "{% macro image(name) %}{{ name }}:latest{% endmacro image %}";
        let body =
            "{% import \"_common.helper\" as common %}image: {{ common::image(name=app) }}\n";
        let out = render_with(&[("_common.helper", helper)], body, "app: nginx\n");
        assert_eq!(out.unwrap(), "image: nginx:latest\n");
    }

    #[test]
    fn test_helper_include() {
        let helper = "labels:\n  app: {{ app }}\n";
        let body = "{% include \"_labels.helper\" %}";
        let out = render_with(&[("_labels.helper", helper)], body, "app: web\n");
        assert_eq!(out.unwrap(), "labels:\n  app: web\n");
    }

    #[test]
    fn test_parse_error_maps_to_invalid_template() {
        match render("{% if a %}", "").unwrap_err() {
            DcpmError::InvalidTemplate { template, .. } => {
                assert_eq!(template, PathBuf::from("test.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_separates_helpers() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("conf")).unwrap();
        fs::write(dir.path().join("_common.helper"), "{% macro port() %}8080{% endmacro port %}")
            .unwrap();
        fs::write(
            dir.path().join("conf/app.env"),
            "{% import \"_common.helper\" as common %}PORT={{ common::port() }}\n",
        )
        .unwrap();

        let set = TemplateSet::load(dir.path()).unwrap();
        let rendered = set.render(&ValueTree::default()).unwrap();
        assert_eq!(rendered, vec![(PathBuf::from("conf/app.env"), "PORT=8080\n".to_string())]);
    }
}
