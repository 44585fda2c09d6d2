pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::settings::TransformSettings;
pub use crate::config::toml_config::TomlConfig;

pub use crate::core::{etl::EtlEngine, pipeline::run_transform, pipeline::RetailPipeline};
pub use crate::utils::error::{EtlError, Result};
