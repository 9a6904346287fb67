use crate::domain::model::{CommandSpec, ExistenceCheck, ProvisionPlan, ProvisionStep};
use crate::utils::error::{LaunchError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub plan: PlanInfo,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInfo {
    pub name: String,
    pub description: Option<String>,
    /// Exported to every command as `AWS_REGION` / `AWS_DEFAULT_REGION`.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub resource: Option<String>,
    pub create: Vec<String>,
    pub check: Option<CheckDefinition>,
    pub optional: Option<bool>,
    pub already_exists_patterns: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDefinition {
    pub command: Vec<String>,
    pub present_when_stdout_contains: Option<String>,
    /// Exact names that must all appear as whole tokens in stdout.
    pub present_when_stdout_lists: Option<Vec<String>>,
    pub absent_patterns: Option<Vec<String>>,
}

impl PlanConfig {
    /// 從 TOML 檔案載入計畫
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LaunchError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析計畫
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LaunchError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CLUSTER_NAME})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let Some(re) = &*ENV_VAR_RE else {
            return Err(LaunchError::ConfigError {
                message: "environment substitution pattern failed to compile".to_string(),
            });
        };

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 轉換為可執行的計畫
    pub fn to_plan(&self) -> Result<ProvisionPlan> {
        self.validate()?;

        let mut plan = ProvisionPlan::new(
            self.plan.name.clone(),
            self.plan.description.clone().unwrap_or_default(),
        );

        for def in &self.steps {
            plan = plan.step(self.build_step(def)?);
        }

        Ok(plan)
    }

    fn build_step(&self, def: &StepDefinition) -> Result<ProvisionStep> {
        let create = self.command(&format!("steps.{}.create", def.name), &def.create, def)?;
        let mut step = ProvisionStep::new(
            def.name.clone(),
            def.resource.clone().unwrap_or_else(|| def.name.clone()),
            create,
        );

        if let Some(check_def) = &def.check {
            let command =
                self.command(&format!("steps.{}.check.command", def.name), &check_def.command, def)?;
            let mut check = ExistenceCheck::new(command);
            if let Some(text) = &check_def.present_when_stdout_contains {
                check = check.present_when_stdout_contains(text.clone());
            }
            if let Some(names) = &check_def.present_when_stdout_lists {
                check = check.present_when_stdout_lists(names.iter().cloned());
            }
            for pattern in check_def.absent_patterns.iter().flatten() {
                check = check.absent_when(pattern.clone());
            }
            step = step.with_check(check);
        }

        for pattern in def.already_exists_patterns.iter().flatten() {
            step = step.already_exists_when(pattern.clone());
        }

        if def.optional.unwrap_or(false) {
            step = step.optional();
        }

        Ok(step)
    }

    fn command(&self, field: &str, argv: &[String], def: &StepDefinition) -> Result<CommandSpec> {
        let mut command = CommandSpec::from_argv(argv).ok_or_else(|| LaunchError::MissingConfigError {
            field: field.to_string(),
        })?;

        if let Some(region) = &self.plan.region {
            command = command
                .env("AWS_REGION", region.clone())
                .env("AWS_DEFAULT_REGION", region.clone());
        }
        for (key, value) in def.env.iter().flatten() {
            command = command.env(key.clone(), value.clone());
        }

        Ok(command)
    }

    /// 驗證計畫的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("plan.name", &self.plan.name)?;

        if let Some(region) = &self.plan.region {
            validation::validate_region("plan.region", region)?;
        }

        if self.steps.is_empty() {
            return Err(LaunchError::ConfigValidationError {
                field: "steps".to_string(),
                message: "plan must contain at least one step".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for def in &self.steps {
            validation::validate_non_empty_string("steps.name", &def.name)?;

            if !seen.insert(def.name.as_str()) {
                return Err(LaunchError::InvalidConfigValueError {
                    field: "steps.name".to_string(),
                    value: def.name.clone(),
                    reason: "step names must be unique".to_string(),
                });
            }

            if def.create.is_empty() || def.create[0].trim().is_empty() {
                return Err(LaunchError::MissingConfigError {
                    field: format!("steps.{}.create", def.name),
                });
            }

            if let Some(check) = &def.check {
                if check.command.is_empty() || check.command[0].trim().is_empty() {
                    return Err(LaunchError::MissingConfigError {
                        field: format!("steps.{}.check.command", def.name),
                    });
                }

                if check.present_when_stdout_contains.is_some()
                    && check.present_when_stdout_lists.is_some()
                {
                    return Err(LaunchError::ConfigValidationError {
                        field: format!("steps.{}.check", def.name),
                        message: "use either present_when_stdout_contains or present_when_stdout_lists"
                            .to_string(),
                    });
                }

                if let Some(names) = &check.present_when_stdout_lists {
                    if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
                        return Err(LaunchError::InvalidConfigValueError {
                            field: format!("steps.{}.check.present_when_stdout_lists", def.name),
                            value: format!("{:?}", names),
                            reason: "expected at least one non-empty name".to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl Validate for PlanConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Presence;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC_PLAN: &str = r#"
[plan]
name = "ecs-basics"
description = "ECR repository and log group"
region = "ap-southeast-2"

[[steps]]
name = "ecr-repository"
resource = "ecr/demo-app"
create = ["aws", "ecr", "create-repository", "--repository-name", "demo-app"]

[steps.check]
command = ["aws", "ecr", "describe-repositories", "--repository-names", "demo-app"]

[[steps]]
name = "log-group"
create = ["aws", "logs", "create-log-group", "--log-group-name", "/ecs/demo-app"]
optional = true
already_exists_patterns = ["ResourceAlreadyExists"]

[steps.check]
command = ["aws", "logs", "describe-log-groups", "--log-group-name-prefix", "/ecs/demo-app"]
present_when_stdout_contains = "/ecs/demo-app"
absent_patterns = ["no log groups"]
"#;

    #[test]
    fn test_parse_plan_and_build_steps() {
        let config = PlanConfig::from_toml_str(BASIC_PLAN).unwrap();
        let plan = config.to_plan().unwrap();

        assert_eq!(plan.name, "ecs-basics");
        assert_eq!(plan.steps.len(), 2);

        let ecr = &plan.steps[0];
        assert_eq!(ecr.resource, "ecr/demo-app");
        assert_eq!(ecr.create.program, "aws");
        assert_eq!(ecr.create.env.get("AWS_REGION").unwrap(), "ap-southeast-2");
        assert!(!ecr.optional);

        let logs = &plan.steps[1];
        assert_eq!(logs.resource, "log-group");
        assert!(logs.optional);
        let check = logs.check.as_ref().unwrap();
        assert_eq!(
            check.presence,
            Presence::StdoutContains("/ecs/demo-app".to_string())
        );
        assert!(check.all_absent_patterns().contains(&"no log groups"));
        assert!(logs
            .all_already_exists_patterns()
            .contains(&"ResourceAlreadyExists"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LAUNCHPAD_TEST_CLUSTER", "substituted-cluster");

        let toml_content = r#"
[plan]
name = "${LAUNCHPAD_TEST_CLUSTER}"

[[steps]]
name = "cluster"
create = ["eksctl", "create", "cluster", "--name", "${LAUNCHPAD_TEST_CLUSTER}"]
"#;

        let config = PlanConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.plan.name, "substituted-cluster");
        assert_eq!(config.steps[0].create[4], "substituted-cluster");

        std::env::remove_var("LAUNCHPAD_TEST_CLUSTER");
    }

    #[test]
    fn test_unset_variables_are_left_untouched() {
        let toml_content = r#"
[plan]
name = "demo"

[[steps]]
name = "echo"
create = ["echo", "${LAUNCHPAD_DEFINITELY_UNSET_VAR}"]
"#;

        let config = PlanConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.steps[0].create[1], "${LAUNCHPAD_DEFINITELY_UNSET_VAR}");
    }

    #[test]
    fn test_validation_rejects_bad_plans() {
        let no_steps = PlanConfig::from_toml_str("[plan]\nname = \"empty\"\n").unwrap();
        assert!(no_steps.validate().is_err());

        let bad_region = r#"
[plan]
name = "demo"
region = "Mars-1"

[[steps]]
name = "a"
create = ["true"]
"#;
        assert!(PlanConfig::from_toml_str(bad_region).unwrap().validate().is_err());

        let duplicate = r#"
[plan]
name = "demo"

[[steps]]
name = "a"
create = ["true"]

[[steps]]
name = "a"
create = ["false"]
"#;
        let err = PlanConfig::from_toml_str(duplicate)
            .unwrap()
            .to_plan()
            .unwrap_err();
        assert!(err.to_string().contains("unique"));

        let empty_create = r#"
[plan]
name = "demo"

[[steps]]
name = "a"
create = []
"#;
        assert!(matches!(
            PlanConfig::from_toml_str(empty_create).unwrap().validate(),
            Err(LaunchError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_exact_presence_rule_from_toml() {
        let toml_content = r#"
[plan]
name = "logs"

[[steps]]
name = "log-group"
create = ["aws", "logs", "create-log-group", "--log-group-name", "/ecs/demo-app"]

[steps.check]
command = ["aws", "logs", "describe-log-groups", "--log-group-name-prefix", "/ecs/demo-app"]
present_when_stdout_lists = ["/ecs/demo-app"]
"#;
        let plan = PlanConfig::from_toml_str(toml_content)
            .unwrap()
            .to_plan()
            .unwrap();
        let check = plan.steps[0].check.as_ref().unwrap();
        assert_eq!(
            check.presence,
            Presence::StdoutLists(vec!["/ecs/demo-app".to_string()])
        );
        assert!(!check.presence.is_satisfied_by("/ecs/demo-app-v2\n"));

        let both = r#"
[plan]
name = "logs"

[[steps]]
name = "log-group"
create = ["true"]

[steps.check]
command = ["true"]
present_when_stdout_contains = "a"
present_when_stdout_lists = ["a"]
"#;
        assert!(PlanConfig::from_toml_str(both).unwrap().validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = PlanConfig::from_toml_str("[plan\nname=").unwrap_err();
        assert!(matches!(err, LaunchError::ConfigValidationError { ref field, .. } if field == "toml_parsing"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC_PLAN.as_bytes()).unwrap();

        let config = PlanConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.plan.name, "ecs-basics");
    }
}
