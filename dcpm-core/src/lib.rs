//! dcpm Core Library
//!
//! Project validation, value merging, template rendering, directory
//! checksums and the install/uninstall lifecycle of docker compose stacks.

pub mod checksum;
pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod paths;
pub mod project;
pub mod render;
pub mod scaffold;
pub mod template;
pub mod validate;
pub mod values;

// Re-export commonly used items
pub use checksum::{Manifest, ManifestDiff, ManifestEntry};
pub use compose::{ComposeParser, ServiceId};
pub use config::Settings;
pub use engine::{ContainerEngine, Deployment, DockerComposeEngine, EngineOutput};
pub use error::{DcpmError, Result};
pub use lifecycle::{
    InstallReport, LifecycleManager, LifecycleState, RunningConfig, UninstallOutcome,
};
pub use project::{Project, ProjectMember, ProjectTree};
pub use render::{RenderedOutput, Renderer};
pub use template::TemplateSet;
pub use values::{Value, ValueTree};
