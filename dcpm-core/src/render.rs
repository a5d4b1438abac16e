//! Project rendering.
//!
//! A project tree is rendered entirely in memory before anything touches
//! the output directory, so a missing value deep inside a dependency leaves
//! the output untouched.
//!
//! Output layout:
//!
//! ```text
//! <out>/
//! ├── docker-compose.yaml          # from <project>/templates/
//! └── dependencies/
//!     └── cache/
//!         └── docker-compose.yaml  # from <project>/dependencies/cache/templates/
//! ```

use crate::error::{DcpmError, Result};
use crate::project::{ProjectTree, DEPENDENCIES_DIR};
use crate::template::TemplateSet;
use crate::values::ValueTree;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Rendered files keyed by path relative to the output root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedOutput {
    files: BTreeMap<PathBuf, String>,
}

impl RenderedOutput {
    pub fn files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().map(|(path, text)| (path.as_path(), text.as_str()))
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Rendered files that can hold compose documents (`.yaml` / `.yml`).
    pub fn compose_candidates(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files().filter(|(path, _)| {
            matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"))
        })
    }

    /// Write every file beneath `out_dir`, creating directories as needed.
    pub fn write_to(&self, out_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(out_dir).map_err(|e| DcpmError::io(out_dir, e))?;

        for (relative, text) in &self.files {
            let target = out_dir.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DcpmError::io(parent, e))?;
            }
            std::fs::write(&target, text).map_err(|e| DcpmError::io(&target, e))?;
            debug!(path = %target.display(), bytes = text.len(), "Wrote rendered file");
        }

        Ok(())
    }

    /// Read an already-rendered stack from `dir`.
    #[instrument]
    pub fn read_from(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(DcpmError::DirectoryNotFound { path: dir.to_path_buf() });
        }

        let mut output = Self::default();
        for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(dir).map_err(|e| DcpmError::Other(e.into()))?;
            let text = std::fs::read_to_string(path).map_err(|e| DcpmError::io(path, e))?;
            output.insert(relative, text);
        }

        debug!(path = %dir.display(), files = output.len(), "Read rendered stack");
        Ok(output)
    }

    /// Add or replace a rendered file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

/// Renders a validated project tree with its effective values.
#[derive(Debug, Clone)]
pub struct Renderer {
    tree: ProjectTree,
    values: ValueTree,
}

impl Renderer {
    /// Validate the project at `root` (dependencies included) and resolve its
    /// effective values: `values.yaml` merged with the optional override file.
    #[instrument(skip_all, fields(project = %root.display()))]
    pub fn load(root: &Path, overrides: Option<&Path>) -> Result<Self> {
        let tree = ProjectTree::load(root)?;
        let defaults = ValueTree::load(&tree.project.values_file())?;
        let overrides = overrides.map(ValueTree::load_override).transpose()?;
        Ok(Self::new(tree, defaults.merge_opt(overrides)))
    }

    pub fn new(tree: ProjectTree, values: ValueTree) -> Self {
        Self { tree, values }
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    /// Render the whole tree into memory.
    #[instrument(skip(self), fields(project = %self.tree.name))]
    pub fn render(&self) -> Result<RenderedOutput> {
        let mut output = RenderedOutput::default();
        render_node(&self.tree, &self.values, Path::new(""), &mut output)?;
        info!(files = output.len(), projects = self.tree.project_count(), "Rendered project");
        Ok(output)
    }

    /// Render into memory, then write the result beneath `out_dir`.
    pub fn render_to(&self, out_dir: &Path) -> Result<RenderedOutput> {
        let output = self.render()?;
        output.write_to(out_dir)?;
        Ok(output)
    }
}

fn render_node(
    node: &ProjectTree,
    values: &ValueTree,
    prefix: &Path,
    output: &mut RenderedOutput,
) -> Result<()> {
    let templates = TemplateSet::load(&node.project.templates_dir())?;
    for (relative, text) in templates.render(values)? {
        if text.trim().is_empty() {
            debug!(template = %relative.display(), "Template rendered empty, skipping");
            continue;
        }
        output.insert(prefix.join(relative), text);
    }

    for dependency in &node.dependencies {
        let defaults = ValueTree::load(&dependency.project.values_file())?;
        let scoped = values.scoped(&dependency.name);
        debug!(
            dependency = %dependency.name,
            overridden = scoped.is_some(),
            "Rendering dependency"
        );
        let dep_values = defaults.merge_opt(scoped);
        let dep_prefix = prefix.join(DEPENDENCIES_DIR).join(&dependency.name);
        render_node(dependency, &dep_values, &dep_prefix, output)?;
    }

    Ok(())
}

pub(crate) fn walk_error(root: &Path, err: walkdir::Error) -> DcpmError {
    let path = err.path().unwrap_or(root).to_path_buf();
    match err.into_io_error() {
        Some(source) => DcpmError::io(path, source),
        None => DcpmError::Other(anyhow::anyhow!("filesystem loop at {}", path.display())),
    }
}
