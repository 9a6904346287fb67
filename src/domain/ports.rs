use crate::domain::model::{CommandOutput, CommandSpec};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Executes external CLI tools (aws, eksctl, kubectl, helm, terraform).
///
/// A non-zero exit is not an error at this layer: it is returned in
/// [`CommandOutput`] so the driver can classify it. Only failing to start
/// the process is an `Err`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;
}
