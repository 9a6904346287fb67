use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Patterns that mean "the queried resource does not exist" when a check exits non-zero.
pub const DEFAULT_ABSENT_PATTERNS: &[&str] = &[
    "not found",
    "NotFound",
    "does not exist",
    "NoSuchEntity",
    "ResourceNotFoundException",
    "RepositoryNotFoundException",
    "No cluster found",
];

/// Patterns that mean a create command lost a race with an existing resource.
pub const DEFAULT_ALREADY_EXISTS_PATTERNS: &[&str] = &[
    "already exists",
    "AlreadyExists",
    "EntityAlreadyExists",
    "ResourceAlreadyExistsException",
    "cannot re-use a name",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build from an argv vector such as `["aws", "iam", "get-role"]`.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.clone()).args(rest.iter().cloned()))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether stdout or stderr mentions any of `patterns` (case-insensitive).
    pub fn mentions_any<S: AsRef<str>>(&self, patterns: &[S]) -> bool {
        let stdout = self.stdout.to_lowercase();
        let stderr = self.stderr.to_lowercase();
        patterns.iter().any(|p| {
            let p = p.as_ref().to_lowercase();
            !p.is_empty() && (stderr.contains(&p) || stdout.contains(&p))
        })
    }

    /// Error text to surface: stderr, falling back to stdout for tools that report there.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim_end();
        if stderr.is_empty() {
            self.stdout.trim_end().to_string()
        } else {
            stderr.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Resource exists when the check exits 0.
    ExitSuccess,
    /// Resource exists when the check exits 0 and stdout contains the text.
    StdoutContains(String),
    /// Resource exists when the check exits 0 and every entry appears in stdout as a
    /// whole whitespace-separated token (`--output text` listings).
    StdoutLists(Vec<String>),
}

impl Presence {
    /// Applies the rule to the stdout of a check that exited 0.
    pub fn is_satisfied_by(&self, stdout: &str) -> bool {
        match self {
            Presence::ExitSuccess => true,
            Presence::StdoutContains(text) => stdout.contains(text.as_str()),
            Presence::StdoutLists(expected) => {
                let tokens: Vec<&str> = stdout.split_whitespace().collect();
                !expected.is_empty() && expected.iter().all(|e| tokens.contains(&e.as_str()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceCheck {
    pub command: CommandSpec,
    pub presence: Presence,
    pub absent_patterns: Vec<String>,
}

impl ExistenceCheck {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            presence: Presence::ExitSuccess,
            absent_patterns: Vec::new(),
        }
    }

    pub fn present_when_stdout_contains(mut self, text: impl Into<String>) -> Self {
        self.presence = Presence::StdoutContains(text.into());
        self
    }

    /// Exact-name variant of [`present_when_stdout_contains`](Self::present_when_stdout_contains):
    /// a prefix sibling such as `/ecs/app-v2` does not count for `/ecs/app`.
    pub fn present_when_stdout_lists<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.presence = Presence::StdoutLists(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn absent_when(mut self, pattern: impl Into<String>) -> Self {
        self.absent_patterns.push(pattern.into());
        self
    }

    pub fn all_absent_patterns(&self) -> Vec<&str> {
        DEFAULT_ABSENT_PATTERNS
            .iter()
            .copied()
            .chain(self.absent_patterns.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionStep {
    pub name: String,
    pub resource: String,
    pub check: Option<ExistenceCheck>,
    pub create: CommandSpec,
    pub optional: bool,
    pub already_exists_patterns: Vec<String>,
}

impl ProvisionStep {
    pub fn new(name: impl Into<String>, resource: impl Into<String>, create: CommandSpec) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
            check: None,
            create,
            optional: false,
            already_exists_patterns: Vec::new(),
        }
    }

    pub fn with_check(mut self, check: ExistenceCheck) -> Self {
        self.check = Some(check);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn already_exists_when(mut self, pattern: impl Into<String>) -> Self {
        self.already_exists_patterns.push(pattern.into());
        self
    }

    pub fn all_already_exists_patterns(&self) -> Vec<&str> {
        DEFAULT_ALREADY_EXISTS_PATTERNS
            .iter()
            .copied()
            .chain(self.already_exists_patterns.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub name: String,
    pub description: String,
    pub steps: Vec<ProvisionStep>,
}

impl ProvisionPlan {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: ProvisionStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Distinct programs used by checks and create commands, in first-use order.
    pub fn programs(&self) -> Vec<&str> {
        let mut programs: Vec<&str> = Vec::new();
        for step in &self.steps {
            let check = step.check.as_ref().map(|c| c.command.program.as_str());
            for program in check.into_iter().chain([step.create.program.as_str()]) {
                if !programs.contains(&program) {
                    programs.push(program);
                }
            }
        }
        programs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Create command ran and succeeded.
    Applied,
    /// Existence check found the resource; nothing was created.
    Skipped,
    /// Create command reported the resource already exists.
    AlreadyExists,
    /// Optional step failed; the run continued.
    Warned(String),
    /// Dry run: the create command would have run.
    Planned,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Applied => write!(f, "applied"),
            StepOutcome::Skipped => write!(f, "skipped (exists)"),
            StepOutcome::AlreadyExists => write!(f, "skipped (already exists)"),
            StepOutcome::Warned(message) => write!(f, "warning: {}", message),
            StepOutcome::Planned => write!(f, "planned"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub resource: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan: String,
    pub dry_run: bool,
    pub steps: Vec<StepReport>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn count(&self, matches: impl Fn(&StepOutcome) -> bool) -> usize {
        self.steps.iter().filter(|s| matches(&s.outcome)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Applied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Skipped | StepOutcome::AlreadyExists))
    }

    pub fn warnings(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Warned(_)))
    }

    pub fn planned(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Planned))
    }

    pub fn summary(&self) -> String {
        if self.dry_run {
            format!(
                "{}: {} planned, {} already present ({} steps, dry run)",
                self.plan,
                self.planned(),
                self.skipped(),
                self.steps.len()
            )
        } else {
            format!(
                "{}: {} applied, {} already present, {} warnings in {:.1}s",
                self.plan,
                self.applied(),
                self.skipped(),
                self.warnings(),
                self.elapsed.as_secs_f64()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_arguments_with_spaces() {
        let cmd = CommandSpec::new("aws")
            .args(["ecs", "describe-clusters", "--query"])
            .arg("clusters[?status=='ACTIVE'] | [0]");
        assert_eq!(
            cmd.to_string(),
            "aws ecs describe-clusters --query 'clusters[?status=='ACTIVE'] | [0]'"
        );
    }

    #[test]
    fn test_mentions_any_is_case_insensitive() {
        let output = CommandOutput {
            code: Some(254),
            stdout: String::new(),
            stderr: "An error occurred (NoSuchEntity) when calling the GetRole operation"
                .to_string(),
        };
        assert!(output.mentions_any(&["nosuchentity"]));
        assert!(!output.mentions_any(&["AlreadyExists"]));
        assert!(!output.mentions_any(&[""]));
    }

    #[test]
    fn test_plan_programs_are_deduplicated_in_order() {
        let plan = ProvisionPlan::new("demo", "demo plan")
            .step(
                ProvisionStep::new("cluster", "eks/demo", CommandSpec::new("eksctl"))
                    .with_check(ExistenceCheck::new(CommandSpec::new("eksctl"))),
            )
            .step(ProvisionStep::new("kubeconfig", "kubeconfig", CommandSpec::new("aws")))
            .step(
                ProvisionStep::new("release", "helm/web", CommandSpec::new("helm"))
                    .with_check(ExistenceCheck::new(CommandSpec::new("helm"))),
            );
        assert_eq!(plan.programs(), vec!["eksctl", "aws", "helm"]);
    }

    #[test]
    fn test_stdout_lists_requires_exact_tokens() {
        let rule = Presence::StdoutLists(vec!["/ecs/demo-app".to_string()]);
        assert!(rule.is_satisfied_by("/ecs/demo-app\n"));
        assert!(rule.is_satisfied_by("/ecs/demo-app\t/ecs/demo-app-v2\n"));
        assert!(!rule.is_satisfied_by("/ecs/demo-app-v2\n"));
        assert!(!rule.is_satisfied_by(""));

        let logging = Presence::StdoutLists(vec!["api".to_string(), "audit".to_string()]);
        assert!(logging.is_satisfied_by("audit\tapi\n"));
        assert!(!logging.is_satisfied_by("audit\n"));

        // 子字串規則仍會把前綴相同的資源視為存在
        let contains = Presence::StdoutContains("/ecs/demo-app".to_string());
        assert!(contains.is_satisfied_by("/ecs/demo-app-v2\n"));
    }

    #[test]
    fn test_run_report_json_shape() {
        let report = RunReport {
            plan: "ecs-demo".to_string(),
            dry_run: false,
            steps: vec![
                StepReport {
                    name: "ecr-repository".to_string(),
                    resource: "ecr/demo-app".to_string(),
                    outcome: StepOutcome::Skipped,
                    duration_ms: 12,
                },
                StepReport {
                    name: "log-group".to_string(),
                    resource: "logs//ecs/demo-app".to_string(),
                    outcome: StepOutcome::Warned("ThrottlingException".to_string()),
                    duration_ms: 30,
                },
            ],
            elapsed: Duration::from_millis(42),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["plan"], "ecs-demo");
        assert_eq!(value["dry_run"], false);
        assert!(value.get("elapsed").is_none());

        let steps = value["steps"].as_array().unwrap();
        assert_eq!(steps[0]["name"], "ecr-repository");
        assert_eq!(steps[0]["outcome"], "skipped");
        assert!(steps[0].get("detail").is_none());
        assert_eq!(steps[0]["duration_ms"], 12);
        assert_eq!(steps[1]["outcome"], "warned");
        assert_eq!(steps[1]["detail"], "ThrottlingException");
    }

    #[test]
    fn test_error_text_falls_back_to_stdout() {
        let output = CommandOutput {
            code: Some(1),
            stdout: "Error: INSTALLATION FAILED\n".to_string(),
            stderr: "  \n".to_string(),
        };
        assert_eq!(output.error_text(), "Error: INSTALLATION FAILED");
    }
}
