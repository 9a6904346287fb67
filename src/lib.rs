pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::ProcessRunner;
pub use crate::config::{PlanConfig, ServerConfig};
pub use crate::core::{driver::ProvisioningDriver, verify::HealthVerifier};
pub use crate::utils::error::{LaunchError, Result};
