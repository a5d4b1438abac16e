//! Integration tests for install / uninstall.
//!
//! These tests drive the full lifecycle against a mock engine that records
//! every call and tracks which containers would be running:
//! - install with default values
//! - install with override values
//! - reinstall over an existing install
//! - rollback when the engine fails or the install cannot be recorded
//! - uninstall from the persisted record only
//! - install / uninstall of a stack rendered beforehand

use dcpm_core::{
    error::{DcpmError, Result},
    lifecycle::{RENDERED_DIR, RUNNING_FILE},
    ContainerEngine, Deployment, EngineOutput, LifecycleManager, LifecycleState, Renderer,
    UninstallOutcome,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Call {
    Up(Deployment),
    Down(Deployment),
}

/// Mock engine (doesn't require a docker daemon).
#[derive(Default)]
struct MockEngine {
    calls: Mutex<Vec<Call>>,
    running: Mutex<BTreeSet<String>>,
    fail_up: AtomicBool,
    fail_down: AtomicBool,
}

impl MockEngine {
    fn running(&self) -> BTreeSet<String> {
        self.running.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn failure(operation: &str) -> DcpmError {
        DcpmError::ContainerEngine {
            operation: operation.to_string(),
            reason: "mock failure".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ContainerEngine for MockEngine {
    async fn up(&self, deployment: &Deployment) -> Result<EngineOutput> {
        self.calls.lock().unwrap().push(Call::Up(deployment.clone()));

        // The engine only ever sees files that are already on disk.
        for path in deployment.compose_paths() {
            assert!(path.is_file(), "compose file missing at up: {}", path.display());
        }

        if self.fail_up.load(Ordering::SeqCst) {
            return Err(Self::failure("start services"));
        }

        let mut running = self.running.lock().unwrap();
        for service in &deployment.services {
            running.insert(service.container_name.clone());
        }
        Ok(EngineOutput { stdout: String::new(), stderr: "Started".to_string() })
    }

    async fn down(&self, deployment: &Deployment) -> Result<EngineOutput> {
        self.calls.lock().unwrap().push(Call::Down(deployment.clone()));

        if self.fail_down.load(Ordering::SeqCst) {
            return Err(Self::failure("stop services"));
        }

        let mut running = self.running.lock().unwrap();
        for service in &deployment.services {
            running.remove(&service.container_name);
        }
        Ok(EngineOutput::default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

const ROOT_VALUES: &str = r#"
web:
  name: web
  image: nginx:latest
db:
  name: db
  image: mysql:8
phpmyadmin:
  name: phpmyadmin
  image: phpmyadmin:latest
"#;

const ROOT_COMPOSE: &str = r#"services:
  {{ web.name }}:
    image: {{ web.image }}
    container_name: {{ web.name }}
  {{ db.name }}:
    image: {{ db.image }}
    container_name: {{ db.name }}
  {{ phpmyadmin.name }}:
    image: {{ phpmyadmin.image }}
    container_name: {{ phpmyadmin.name }}
"#;

const CACHE_VALUES: &str = "name: redis\nimage: redis:7\nenabled: true\n";

const CACHE_COMPOSE: &str = r#"{%- if enabled %}
services:
  {{ name }}:
    image: {{ image }}
    container_name: {{ name }}
{%- endif %}
"#;

const OVERRIDES: &str = r#"
web:
  name: nginx_edit
db:
  name: db_edit
phpmyadmin:
  name: phpmyadmin_edit
cache:
  enabled: false
"#;

fn make_project(root: &Path, values: &str, templates: &[(&str, &str)]) {
    for dir in ["templates", "running_config", "dependencies"] {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
    fs::write(root.join("values.yaml"), values).unwrap();
    for (name, body) in templates {
        fs::write(root.join("templates").join(name), body).unwrap();
    }
}

/// A project with three services of its own and a redis dependency.
fn fixture(temp: &TempDir) -> PathBuf {
    let root = temp.path().join("shop");
    make_project(&root, ROOT_VALUES, &[("docker-compose.yaml", ROOT_COMPOSE)]);
    make_project(
        &root.join("dependencies").join("cache"),
        CACHE_VALUES,
        &[("docker-compose.yaml", CACHE_COMPOSE)],
    );
    root
}

fn overrides(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("override.yaml");
    fs::write(&path, OVERRIDES).unwrap();
    path
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn setup() -> (TempDir, Arc<MockEngine>, LifecycleManager) {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let engine = Arc::new(MockEngine::default());
    let manager = LifecycleManager::new(engine.clone());
    (temp, engine, manager)
}

#[tokio::test]
async fn test_install_with_defaults() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);

    let report = manager.install(&root, None).await.expect("install failed");

    assert_eq!(engine.running(), names(&["db", "phpmyadmin", "redis", "web"]));
    assert_eq!(report.config.project, "shop");
    assert_eq!(report.config.services.len(), 4);
    assert!(report.replaced.is_none());
    assert_eq!(report.output.combined(), "Started");

    let rendered = root.join("running_config").join(RENDERED_DIR);
    assert!(rendered.join("docker-compose.yaml").is_file());
    assert!(rendered.join("dependencies/cache/docker-compose.yaml").is_file());
    assert!(root.join("running_config").join(RUNNING_FILE).is_file());

    match manager.state(&root).unwrap() {
        LifecycleState::Installed(config) => assert_eq!(config, report.config),
        LifecycleState::Uninstalled => panic!("expected installed state"),
    }
}

#[tokio::test]
async fn test_install_with_overrides() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);

    manager.install(&root, Some(&overrides(&temp))).await.expect("install failed");

    assert_eq!(engine.running(), names(&["db_edit", "nginx_edit", "phpmyadmin_edit"]));
    let rendered = root.join("running_config").join(RENDERED_DIR);
    assert!(!rendered.join("dependencies/cache/docker-compose.yaml").exists());
}

#[tokio::test]
async fn test_uninstall_uses_recorded_services_only() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);

    manager.install(&root, Some(&overrides(&temp))).await.unwrap();
    let outcome = manager.uninstall(&root).await.expect("uninstall failed");

    match outcome {
        UninstallOutcome::Uninstalled { services, .. } => assert_eq!(services.len(), 3),
        UninstallOutcome::NotInstalled => panic!("expected an uninstall"),
    }
    assert!(engine.running().is_empty());
    assert_eq!(manager.state(&root).unwrap(), LifecycleState::Uninstalled);

    let leftovers: Vec<_> = fs::read_dir(root.join("running_config")).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_uninstall_when_not_installed() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);

    let outcome = manager.uninstall(&root).await.unwrap();

    assert!(matches!(outcome, UninstallOutcome::NotInstalled));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_reinstall_replaces_previous_install() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);

    manager.install(&root, None).await.unwrap();
    let report = manager.install(&root, Some(&overrides(&temp))).await.unwrap();

    let previous = report.replaced.expect("previous install should be reported");
    assert_eq!(previous.services.len(), 4);
    assert_eq!(engine.running(), names(&["db_edit", "nginx_edit", "phpmyadmin_edit"]));

    let calls = engine.calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[1], Call::Down(_)));
}

#[tokio::test]
async fn test_failed_up_rolls_back() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);
    engine.fail_up.store(true, Ordering::SeqCst);

    let err = manager.install(&root, None).await.unwrap_err();

    assert!(matches!(err, DcpmError::ContainerEngine { .. }));
    let calls = engine.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], Call::Up(_)));
    assert!(matches!(calls[1], Call::Down(_)));
    assert!(!root.join("running_config").join(RENDERED_DIR).exists());
    assert_eq!(manager.state(&root).unwrap(), LifecycleState::Uninstalled);
}

#[tokio::test]
async fn test_failed_down_keeps_record_for_retry() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);

    manager.install(&root, None).await.unwrap();
    engine.fail_down.store(true, Ordering::SeqCst);
    assert!(manager.uninstall(&root).await.is_err());
    assert!(matches!(manager.state(&root).unwrap(), LifecycleState::Installed(_)));

    engine.fail_down.store(false, Ordering::SeqCst);
    manager.uninstall(&root).await.unwrap();
    assert!(engine.running().is_empty());
}

#[tokio::test]
async fn test_project_without_services() {
    let (temp, engine, manager) = setup();
    let root = temp.path().join("empty");
    make_project(&root, "", &[("notes.yaml", "owner: ops\n")]);

    let err = manager.install(&root, None).await.unwrap_err();

    assert!(matches!(err, DcpmError::NothingToInstall { .. }));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_project_never_reaches_engine() {
    let (temp, engine, manager) = setup();
    let root = temp.path().join("broken");
    fs::create_dir_all(root.join("templates")).unwrap();

    let err = manager.install(&root, None).await.unwrap_err();

    match err {
        DcpmError::StructuralValidation { missing, .. } => assert_eq!(missing.len(), 3),
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_broken_compose_file_fails_install() {
    let (temp, engine, manager) = setup();
    let root = temp.path().join("broken-yaml");
    make_project(
        &root,
        "",
        &[
            ("a-web.yaml", "services:\n  web:\n    image: nginx\n"),
            ("b-db.yaml", "services:\n  db:\n    image: [mysql\n"),
        ],
    );

    let err = manager.install(&root, None).await.unwrap_err();

    match err {
        DcpmError::ConfigParse { path, .. } => assert_eq!(path, PathBuf::from("b-db.yaml")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.calls().is_empty());
    assert_eq!(manager.state(&root).unwrap(), LifecycleState::Uninstalled);
}

#[tokio::test]
async fn test_duplicate_service_in_dependency_fails_install() {
    let (temp, engine, manager) = setup();
    let root = temp.path().join("shop");
    let web = "services:\n  web:\n    image: {{ image }}\n";
    make_project(&root, "image: nginx\n", &[("docker-compose.yaml", web)]);
    make_project(&root.join("dependencies/api"), "image: node\n", &[("docker-compose.yaml", web)]);

    let err = manager.install(&root, None).await.unwrap_err();

    match err {
        DcpmError::DuplicateService { service, .. } => assert_eq!(service, "web"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_failed_record_rolls_back() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);
    // a directory where the record is written first makes saving fail
    fs::create_dir(root.join("running_config").join(format!("{}.tmp", RUNNING_FILE))).unwrap();

    let err = manager.install(&root, None).await.unwrap_err();

    assert!(matches!(err, DcpmError::IoError { .. }));
    let calls = engine.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], Call::Up(_)));
    assert!(matches!(calls[1], Call::Down(_)));
    assert!(engine.running().is_empty());
    assert!(!root.join("running_config").join(RENDERED_DIR).exists());
    assert_eq!(manager.state(&root).unwrap(), LifecycleState::Uninstalled);
}

#[tokio::test]
async fn test_install_and_uninstall_rendered_directory() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);
    let prerendered = temp.path().join("prerendered");
    Renderer::load(&root, Some(&overrides(&temp))).unwrap().render_to(&prerendered).unwrap();

    let report = manager.install_rendered(&root, &prerendered).await.expect("install failed");

    assert_eq!(report.config.services.len(), 3);
    assert_eq!(engine.running(), names(&["db_edit", "nginx_edit", "phpmyadmin_edit"]));
    assert!(root.join("running_config").join(RENDERED_DIR).join("docker-compose.yaml").is_file());

    let outcome = manager.uninstall_rendered(&root, &prerendered).await.unwrap();

    match outcome {
        UninstallOutcome::Uninstalled { project, services, .. } => {
            assert_eq!(project, "shop");
            assert_eq!(services.len(), 3);
        }
        UninstallOutcome::NotInstalled => panic!("expected an uninstall"),
    }
    assert!(engine.running().is_empty());
    assert_eq!(manager.state(&root).unwrap(), LifecycleState::Uninstalled);
    assert!(prerendered.join("docker-compose.yaml").is_file());
}

#[tokio::test]
async fn test_install_rendered_missing_directory() {
    let (temp, engine, manager) = setup();
    let root = fixture(&temp);

    let err = manager.install_rendered(&root, &temp.path().join("nope")).await.unwrap_err();

    assert!(matches!(err, DcpmError::DirectoryNotFound { .. }));
    assert!(engine.calls().is_empty());
}
