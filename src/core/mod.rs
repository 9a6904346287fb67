pub mod driver;
pub mod verify;

pub use crate::domain::model::{
    CommandOutput, CommandSpec, ExistenceCheck, ProvisionPlan, ProvisionStep, RunReport,
    StepOutcome,
};
pub use crate::domain::ports::CommandRunner;
pub use crate::utils::error::Result;
