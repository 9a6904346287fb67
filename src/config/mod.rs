#[cfg(feature = "cli")]
pub mod cli;
pub mod plan_config;
pub mod presets;
pub mod server;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Commands};
pub use plan_config::PlanConfig;
pub use presets::{ecs_plan, eks_plan, EcsOptions, EksOptions, HelmRelease};
pub use server::{DatabaseConfig, ServerConfig};
