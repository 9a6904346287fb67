use crate::domain::model::{
    CommandSpec, ExistenceCheck, ProvisionPlan, ProvisionStep, RunReport, StepOutcome,
    StepReport,
};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{LaunchError, Result};
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existence {
    Present,
    Absent,
}

/// Version probe and install hint for the tools the scripts rely on.
pub fn tool_probe(program: &str) -> (CommandSpec, String) {
    match program {
        "aws" => (
            CommandSpec::new("aws").arg("--version"),
            "Install the AWS CLI v2: https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html".to_string(),
        ),
        "eksctl" => (
            CommandSpec::new("eksctl").arg("version"),
            "Install eksctl: https://eksctl.io/installation/".to_string(),
        ),
        "kubectl" => (
            CommandSpec::new("kubectl").args(["version", "--client"]),
            "Install kubectl: https://kubernetes.io/docs/tasks/tools/".to_string(),
        ),
        "helm" => (
            CommandSpec::new("helm").arg("version"),
            "Install Helm: https://helm.sh/docs/intro/install/".to_string(),
        ),
        "terraform" => (
            CommandSpec::new("terraform").arg("version"),
            "Install Terraform: https://developer.hashicorp.com/terraform/install".to_string(),
        ),
        other => (
            CommandSpec::new(other).arg("--version"),
            format!("Install '{}' and make sure it is on your PATH", other),
        ),
    }
}

/// Runs a [`ProvisionPlan`] step by step.
///
/// Each step queries whether its resource exists and only invokes the create
/// command when it does not. The first failure of a required step aborts the
/// run; there is no retry and no rollback.
pub struct ProvisioningDriver<R: CommandRunner> {
    runner: R,
    dry_run: bool,
    preflight: bool,
    monitor: SystemMonitor,
}

impl<R: CommandRunner> ProvisioningDriver<R> {
    pub fn new(runner: R) -> Self {
        Self::new_with_monitoring(runner, false)
    }

    pub fn new_with_monitoring(runner: R, monitor_enabled: bool) -> Self {
        Self {
            runner,
            dry_run: false,
            preflight: true,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn preflight(mut self, enabled: bool) -> Self {
        self.preflight = enabled;
        self
    }

    /// Checks every tool the plan needs can be started.
    pub async fn check_prerequisites(&self, plan: &ProvisionPlan) -> Result<()> {
        for program in plan.programs() {
            let (probe, hint) = tool_probe(program);
            match self.runner.run(&probe).await {
                Ok(output) => {
                    tracing::debug!(
                        "🔧 {} available: {}",
                        program,
                        output.stdout.lines().next().unwrap_or("").trim()
                    );
                }
                Err(LaunchError::SpawnError { .. }) => {
                    return Err(LaunchError::MissingToolError {
                        tool: program.to_string(),
                        hint,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub async fn run(&self, plan: &ProvisionPlan) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!(
            "🚀 Running plan '{}' ({} steps{})",
            plan.name,
            plan.steps.len(),
            if self.dry_run { ", dry run" } else { "" }
        );

        if self.preflight {
            self.check_prerequisites(plan).await?;
        }

        let mut steps = Vec::with_capacity(plan.steps.len());
        for (index, step) in plan.steps.iter().enumerate() {
            tracing::info!(
                "▶️  [{}/{}] {} ({})",
                index + 1,
                plan.steps.len(),
                step.name,
                step.resource
            );
            let step_started = Instant::now();

            let outcome = match self.run_step(step).await {
                Ok(outcome) => outcome,
                Err(e) if step.optional => {
                    tracing::warn!("⚠️  Optional step '{}' failed: {}", step.name, e);
                    StepOutcome::Warned(e.to_string())
                }
                Err(e) => {
                    tracing::error!("❌ Step '{}' failed, aborting plan", step.name);
                    return Err(e);
                }
            };

            tracing::info!("   {} → {}", step.name, outcome);
            self.monitor.log_stats(&step.name);

            steps.push(StepReport {
                name: step.name.clone(),
                resource: step.resource.clone(),
                outcome,
                duration_ms: step_started.elapsed().as_millis(),
            });
        }

        self.monitor.log_final_stats();

        Ok(RunReport {
            plan: plan.name.clone(),
            dry_run: self.dry_run,
            steps,
            elapsed: started.elapsed(),
        })
    }

    async fn run_step(&self, step: &ProvisionStep) -> Result<StepOutcome> {
        if let Some(check) = &step.check {
            if self.probe(step, check).await? == Existence::Present {
                return Ok(StepOutcome::Skipped);
            }
        }

        if self.dry_run {
            tracing::info!("   would run: {}", step.create);
            return Ok(StepOutcome::Planned);
        }

        let output = self.runner.run(&step.create).await?;
        if output.success() {
            return Ok(StepOutcome::Applied);
        }

        if output.mentions_any(step.all_already_exists_patterns().as_slice()) {
            tracing::debug!("{} reported an existing resource", step.create.program);
            return Ok(StepOutcome::AlreadyExists);
        }

        Err(LaunchError::CommandFailedError {
            step: step.name.clone(),
            command: step.create.to_string(),
            code: output.code,
            stderr: output.error_text(),
        })
    }

    async fn probe(&self, step: &ProvisionStep, check: &ExistenceCheck) -> Result<Existence> {
        let output = self.runner.run(&check.command).await?;

        if output.success() {
            return Ok(if check.presence.is_satisfied_by(&output.stdout) {
                Existence::Present
            } else {
                Existence::Absent
            });
        }

        if output.mentions_any(check.all_absent_patterns().as_slice()) {
            return Ok(Existence::Absent);
        }

        Err(LaunchError::CheckFailedError {
            step: step.name.clone(),
            command: check.command.to_string(),
            stderr: output.error_text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CommandOutput;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns canned outputs keyed by the rendered command line and records every call.
    #[derive(Default)]
    struct ScriptedRunner {
        responses: HashMap<String, CommandOutput>,
        missing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn respond(mut self, command: &CommandSpec, code: i32, stdout: &str, stderr: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                CommandOutput {
                    code: Some(code),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        fn missing(mut self, program: &str) -> Self {
            self.missing.push(program.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
            let line = command.to_string();
            self.calls.lock().unwrap().push(line.clone());

            if self.missing.contains(&command.program) {
                return Err(LaunchError::SpawnError {
                    program: command.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }

            // unscripted commands succeed silently
            Ok(self.responses.get(&line).cloned().unwrap_or(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }))
        }
    }

    fn role_check() -> CommandSpec {
        CommandSpec::new("aws").args(["iam", "get-role", "--role-name", "demo-role"])
    }

    fn role_create() -> CommandSpec {
        CommandSpec::new("aws").args(["iam", "create-role", "--role-name", "demo-role"])
    }

    fn role_step() -> ProvisionStep {
        ProvisionStep::new("iam-role", "iam/demo-role", role_create())
            .with_check(ExistenceCheck::new(role_check()))
    }

    fn plan_of(steps: Vec<ProvisionStep>) -> ProvisionPlan {
        steps
            .into_iter()
            .fold(ProvisionPlan::new("test", "test plan"), ProvisionPlan::step)
    }

    #[tokio::test]
    async fn test_existing_resource_is_not_recreated() {
        let runner = ScriptedRunner::default().respond(&role_check(), 0, "{\"Role\":{}}", "");
        let driver = ProvisioningDriver::new(runner).preflight(false);

        let report = driver.run(&plan_of(vec![role_step()])).await.unwrap();

        assert_eq!(report.steps[0].outcome, StepOutcome::Skipped);
        assert!(!driver.runner.calls().contains(&role_create().to_string()));
    }

    #[tokio::test]
    async fn test_prefix_sibling_log_group_does_not_count_as_present() {
        use crate::config::presets::{ecs_plan, EcsOptions};

        let plan = ecs_plan(&EcsOptions::default());
        let log_group = plan
            .steps
            .iter()
            .find(|s| s.name == "log-group")
            .unwrap()
            .clone();
        let check = log_group.check.as_ref().unwrap().command.clone();
        let create = log_group.create.to_string();

        let runner = ScriptedRunner::default().respond(&check, 0, "/ecs/demo-app-v2\n", "");
        let driver = ProvisioningDriver::new(runner).preflight(false);

        let report = driver.run(&plan_of(vec![log_group.clone()])).await.unwrap();

        assert_eq!(report.steps[0].outcome, StepOutcome::Applied);
        assert!(driver.runner.calls().contains(&create));

        let runner = ScriptedRunner::default().respond(
            &check,
            0,
            "/ecs/demo-app\t/ecs/demo-app-v2\n",
            "",
        );
        let driver = ProvisioningDriver::new(runner).preflight(false);
        let report = driver.run(&plan_of(vec![log_group])).await.unwrap();

        assert_eq!(report.steps[0].outcome, StepOutcome::Skipped);
        assert!(!driver.runner.calls().contains(&create));
    }

    #[tokio::test]
    async fn test_absent_resource_is_created() {
        let runner = ScriptedRunner::default().respond(
            &role_check(),
            254,
            "",
            "An error occurred (NoSuchEntity) when calling the GetRole operation",
        );
        let driver = ProvisioningDriver::new(runner).preflight(false);

        let report = driver.run(&plan_of(vec![role_step()])).await.unwrap();

        assert_eq!(report.steps[0].outcome, StepOutcome::Applied);
        assert_eq!(
            driver.runner.calls(),
            vec![role_check().to_string(), role_create().to_string()]
        );
    }

    #[tokio::test]
    async fn test_unexpected_check_failure_aborts_with_stderr() {
        let runner = ScriptedRunner::default().respond(
            &role_check(),
            255,
            "",
            "Unable to locate credentials. You can configure credentials by running \"aws configure\".",
        );
        let driver = ProvisioningDriver::new(runner).preflight(false);
        let second = ProvisionStep::new("second", "x", CommandSpec::new("echo"));

        let err = driver
            .run(&plan_of(vec![role_step(), second]))
            .await
            .unwrap_err();

        match err {
            LaunchError::CheckFailedError { step, stderr, .. } => {
                assert_eq!(step, "iam-role");
                assert!(stderr.starts_with("Unable to locate credentials"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(driver.runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_aborts_remaining_steps() {
        let runner = ScriptedRunner::default()
            .respond(&role_check(), 254, "", "NoSuchEntity")
            .respond(&role_create(), 254, "", "AccessDenied: not authorized");
        let driver = ProvisioningDriver::new(runner).preflight(false);
        let later = ProvisionStep::new("later", "x", CommandSpec::new("echo").arg("later"));

        let err = driver
            .run(&plan_of(vec![role_step(), later]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LaunchError::CommandFailedError { code: Some(254), ref stderr, .. } if stderr == "AccessDenied: not authorized"
        ));
        assert!(!driver.runner.calls().contains(&"echo later".to_string()));
    }

    #[tokio::test]
    async fn test_create_reporting_already_exists_is_skipped() {
        let create = CommandSpec::new("aws").args(["logs", "create-log-group", "--log-group-name", "/ecs/app"]);
        let runner = ScriptedRunner::default().respond(
            &create,
            254,
            "",
            "An error occurred (ResourceAlreadyExistsException): The specified log group already exists",
        );
        let driver = ProvisioningDriver::new(runner).preflight(false);

        let report = driver
            .run(&plan_of(vec![ProvisionStep::new("log-group", "logs//ecs/app", create)]))
            .await
            .unwrap();

        assert_eq!(report.steps[0].outcome, StepOutcome::AlreadyExists);
        assert_eq!(report.skipped(), 1);
    }

    #[tokio::test]
    async fn test_step_specific_already_exists_pattern() {
        let create = CommandSpec::new("aws").args(["eks", "update-cluster-config"]);
        let runner = ScriptedRunner::default().respond(
            &create,
            254,
            "",
            "InvalidParameterException: No changes needed for the logging config provided",
        );
        let driver = ProvisioningDriver::new(runner).preflight(false);
        let step = ProvisionStep::new("logging", "eks/demo/logging", create)
            .already_exists_when("No changes needed");

        let report = driver.run(&plan_of(vec![step])).await.unwrap();
        assert_eq!(report.steps[0].outcome, StepOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_optional_step_failure_is_a_warning() {
        let create = CommandSpec::new("aws").args(["eks", "update-cluster-config"]);
        let runner = ScriptedRunner::default().respond(&create, 1, "", "throttled");
        let driver = ProvisioningDriver::new(runner).preflight(false);
        let optional = ProvisionStep::new("logging", "eks/demo/logging", create).optional();
        let after = ProvisionStep::new("after", "x", CommandSpec::new("echo").arg("after"));

        let report = driver.run(&plan_of(vec![optional, after])).await.unwrap();

        assert!(matches!(report.steps[0].outcome, StepOutcome::Warned(ref m) if m.contains("throttled")));
        assert_eq!(report.steps[1].outcome, StepOutcome::Applied);
        assert_eq!(report.warnings(), 1);
    }

    #[tokio::test]
    async fn test_stdout_presence_rule() {
        let check = CommandSpec::new("aws").args(["ecs", "describe-clusters", "--clusters", "demo"]);
        let create = CommandSpec::new("aws").args(["ecs", "create-cluster", "--cluster-name", "demo"]);
        let step = ProvisionStep::new("ecs-cluster", "ecs/demo", create.clone())
            .with_check(ExistenceCheck::new(check.clone()).present_when_stdout_contains("demo"));

        // INACTIVE clusters come back with exit 0 but empty query output
        let runner = ScriptedRunner::default().respond(&check, 0, "\n", "");
        let driver = ProvisioningDriver::new(runner).preflight(false);

        let report = driver.run(&plan_of(vec![step])).await.unwrap();
        assert_eq!(report.steps[0].outcome, StepOutcome::Applied);
        assert!(driver.runner.calls().contains(&create.to_string()));
    }

    #[tokio::test]
    async fn test_dry_run_never_creates() {
        let runner = ScriptedRunner::default().respond(&role_check(), 254, "", "NoSuchEntity");
        let driver = ProvisioningDriver::new(runner).preflight(false).dry_run(true);

        let report = driver.run(&plan_of(vec![role_step()])).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.steps[0].outcome, StepOutcome::Planned);
        assert_eq!(driver.runner.calls(), vec![role_check().to_string()]);
    }

    #[tokio::test]
    async fn test_preflight_reports_missing_tool() {
        let runner = ScriptedRunner::default().missing("eksctl");
        let driver = ProvisioningDriver::new(runner);
        let step = ProvisionStep::new("cluster", "eks/demo", CommandSpec::new("eksctl").arg("create"));

        let err = driver.run(&plan_of(vec![step])).await.unwrap_err();

        match err {
            LaunchError::MissingToolError { tool, hint } => {
                assert_eq!(tool, "eksctl");
                assert!(hint.contains("eksctl.io"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(driver.runner.calls(), vec!["eksctl version".to_string()]);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        // first run: role absent
        let first = ScriptedRunner::default().respond(&role_check(), 254, "", "NoSuchEntity");
        let report = ProvisioningDriver::new(first)
            .preflight(false)
            .run(&plan_of(vec![role_step()]))
            .await
            .unwrap();
        assert_eq!(report.applied(), 1);

        // second run: role now exists
        let second = ScriptedRunner::default();
        let driver = ProvisioningDriver::new(second).preflight(false);
        let report = driver.run(&plan_of(vec![role_step()])).await.unwrap();
        assert_eq!(report.applied(), 0);
        assert_eq!(report.skipped(), 1);
        assert_eq!(driver.runner.calls(), vec![role_check().to_string()]);
    }
}
