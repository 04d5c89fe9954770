//! Configuration and CLI handling

pub mod cli;
pub mod settings;

pub use cli::{ConvertCli, OrganizeCli};
pub use settings::{ConvertSettings, ExtensionSelection, OrganizeSettings, SkipPolicy};
