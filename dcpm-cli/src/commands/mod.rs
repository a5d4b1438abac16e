//! CLI command implementations

pub mod checksum;
pub mod init;
pub mod lifecycle;
pub mod render;

pub use init::init;
pub use render::render;
