//! Reader for rendered Docker Compose documents.
//!
//! Only the parts needed to know what an install starts are modelled:
//! service names, images and container names. Everything else in a compose
//! file is passed through to the engine untouched.

use crate::error::{DcpmError, Result};
use crate::render::RenderedOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Root of a compose document.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeFile {
    /// Services keyed by name.
    pub services: BTreeMap<String, ComposeService>,
}

/// A service entry. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeService {
    #[serde(default)]
    pub image: Option<String>,

    /// Explicit container name; compose derives one when absent.
    #[serde(default)]
    pub container_name: Option<String>,
}

/// A service started by an install.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId {
    /// Service key in the compose document.
    pub name: String,
    /// Name of the container the engine runs for it.
    pub container_name: String,
    /// Compose document that defines it, relative to the rendered root.
    pub compose_file: PathBuf,
    #[serde(default)]
    pub image: Option<String>,
}

/// Compose documents found in a rendered project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeSet {
    /// Relative paths of the compose documents, in render order.
    pub files: Vec<PathBuf>,
    pub services: Vec<ServiceId>,
}

impl ComposeSet {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Parser for compose documents.
pub struct ComposeParser;

impl ComposeParser {
    /// Parse `content` if it is a compose document.
    ///
    /// Returns `Ok(None)` for YAML without a `services` mapping (plain
    /// configuration files rendered next to the compose files). Content that
    /// is not valid YAML is a `ConfigParse` error.
    pub fn parse(path: &Path, content: &str) -> Result<Option<ComposeFile>> {
        let parse_error = |e: serde_yaml::Error| DcpmError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let document: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
        let has_services = document.get("services").is_some_and(serde_yaml::Value::is_mapping);
        if !has_services {
            debug!(path = %path.display(), "No services mapping, skipping");
            return Ok(None);
        }

        serde_yaml::from_value(document).map(Some).map_err(parse_error)
    }

    /// Every compose document and service in `output`.
    ///
    /// Containers without an explicit `container_name` get the name compose
    /// assigns them: `<project>-<service>-1`. All documents are started as
    /// one compose project, so a service name may only be defined once.
    #[instrument(skip(output))]
    pub fn discover(output: &RenderedOutput, project: &str) -> Result<ComposeSet> {
        let mut set = ComposeSet::default();
        let mut defined: BTreeMap<String, PathBuf> = BTreeMap::new();

        for (path, content) in output.compose_candidates() {
            let Some(compose) = Self::parse(path, content)? else {
                continue;
            };

            for (name, service) in compose.services {
                if let Some(first) = defined.insert(name.clone(), path.to_path_buf()) {
                    return Err(DcpmError::DuplicateService {
                        service: name,
                        first,
                        second: path.to_path_buf(),
                    });
                }
                let container_name = service
                    .container_name
                    .unwrap_or_else(|| format!("{}-{}-1", project, name));
                set.services.push(ServiceId {
                    name,
                    container_name,
                    compose_file: path.to_path_buf(),
                    image: service.image,
                });
            }
            set.files.push(path.to_path_buf());
        }

        debug!(
            files = set.files.len(),
            services = set.services.len(),
            "Discovered compose services"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
version: "3.8"
services:
  web:
    image: nginx
    container_name: web
    ports: ["80:80"]
  db:
    image: mysql:8
"#;

    #[test]
    fn test_parse_compose_document() {
        let compose = ComposeParser::parse(Path::new("a.yaml"), COMPOSE).unwrap().unwrap();
        assert_eq!(compose.services.len(), 2);
        assert_eq!(compose.services["web"].container_name.as_deref(), Some("web"));
        assert_eq!(compose.services["db"].image.as_deref(), Some("mysql:8"));
    }

    #[test]
    fn test_non_compose_documents_are_skipped() {
        let path = Path::new("x.yaml");
        assert!(ComposeParser::parse(path, "key: value\n").unwrap().is_none());
        assert!(ComposeParser::parse(path, "services: [a, b]\n").unwrap().is_none());
        assert!(ComposeParser::parse(path, "- a\n- b\n").unwrap().is_none());
        assert!(ComposeParser::parse(path, "# empty\n").unwrap().is_none());
    }

    #[test]
    fn test_broken_yaml_is_an_error() {
        let content = "services:\n  db:\n    image: [mysql\n";
        let err = ComposeParser::parse(Path::new("b-db.yaml"), content).unwrap_err();
        match err {
            DcpmError::ConfigParse { path, .. } => assert_eq!(path, PathBuf::from("b-db.yaml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_service_is_an_error() {
        let content = "services:\n  web:\n    image: [1, 2]\n";
        let err = ComposeParser::parse(Path::new("x.yaml"), content).unwrap_err();
        assert!(matches!(err, DcpmError::ConfigParse { .. }));
    }

    #[test]
    fn test_discover_services_across_documents() {
        let mut output = RenderedOutput::default();
        output.insert("docker-compose.yaml", COMPOSE);
        output.insert("dependencies/cache/compose.yml", "services:\n  redis:\n    image: redis\n");
        output.insert("nginx/default.conf", "services: {}\n");
        output.insert("settings.yaml", "debug: true\n");

        let set = ComposeParser::discover(&output, "shop").unwrap();
        assert_eq!(
            set.files,
            vec![
                PathBuf::from("dependencies/cache/compose.yml"),
                PathBuf::from("docker-compose.yaml"),
            ]
        );
        let containers: Vec<&str> =
            set.services.iter().map(|s| s.container_name.as_str()).collect();
        assert_eq!(containers, vec!["shop-redis-1", "shop-db-1", "web"]);
    }

    #[test]
    fn test_duplicate_service_across_documents() {
        let mut output = RenderedOutput::default();
        output.insert("docker-compose.yaml", "services:\n  web:\n    image: nginx\n");
        output.insert("dependencies/api/compose.yaml", "services:\n  web:\n    image: node\n");

        match ComposeParser::discover(&output, "shop").unwrap_err() {
            DcpmError::DuplicateService { service, first, second } => {
                assert_eq!(service, "web");
                assert_eq!(first, PathBuf::from("dependencies/api/compose.yaml"));
                assert_eq!(second, PathBuf::from("docker-compose.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
