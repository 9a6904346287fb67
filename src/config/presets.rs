//! Built-in plans for the EKS and ECS setup workflows.

use crate::domain::model::{CommandSpec, ExistenceCheck, ProvisionPlan, ProvisionStep};
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::path::PathBuf;

const EBS_CSI_POLICY_ARN: &str = "arn:aws:iam::aws:policy/service-role/AmazonEBSCSIDriverPolicy";
const ECS_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
const CONTROL_PLANE_LOG_TYPES: &[&str] = &[
    "api",
    "audit",
    "authenticator",
    "controllerManager",
    "scheduler",
];
const ECS_TASKS_TRUST_POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"Service":"ecs-tasks.amazonaws.com"},"Action":"sts:AssumeRole"}]}"#;

#[derive(Debug, Clone)]
pub struct HelmRelease {
    pub release: String,
    pub chart: String,
    pub namespace: String,
    pub values_file: Option<PathBuf>,
    pub repo: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct EksOptions {
    pub cluster_name: String,
    pub region: String,
    pub kubernetes_version: String,
    pub node_type: String,
    pub nodes: u32,
    pub nodes_min: u32,
    pub nodes_max: u32,
    pub kms_key_arn: Option<String>,
    pub account_id: Option<String>,
    pub enable_logging: bool,
    pub helm: Option<HelmRelease>,
}

impl Default for EksOptions {
    fn default() -> Self {
        Self {
            cluster_name: "demo-eks".to_string(),
            region: "us-east-1".to_string(),
            kubernetes_version: "1.29".to_string(),
            node_type: "t3.medium".to_string(),
            nodes: 2,
            nodes_min: 1,
            nodes_max: 3,
            kms_key_arn: None,
            account_id: None,
            enable_logging: true,
            helm: None,
        }
    }
}

impl Validate for EksOptions {
    fn validate(&self) -> Result<()> {
        validation::validate_cluster_name("cluster_name", &self.cluster_name)?;
        validation::validate_region("region", &self.region)?;
        validation::validate_non_empty_string("node_type", &self.node_type)?;
        validation::validate_positive_number("nodes_max", self.nodes_max, 1)?;
        validation::validate_range("nodes_min", self.nodes_min, 0, self.nodes_max)?;
        validation::validate_range("nodes", self.nodes, self.nodes_min, self.nodes_max)?;

        if let Some(kms) = &self.kms_key_arn {
            if !kms.starts_with("arn:") {
                return Err(crate::utils::error::LaunchError::InvalidConfigValueError {
                    field: "kms".to_string(),
                    value: kms.clone(),
                    reason: "Expected a KMS key ARN (arn:aws:kms:...)".to_string(),
                });
            }
        }

        if let Some(account) = &self.account_id {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(crate::utils::error::LaunchError::InvalidConfigValueError {
                    field: "account_id".to_string(),
                    value: account.clone(),
                    reason: "AWS account IDs are 12 digits".to_string(),
                });
            }
        }

        if let Some(helm) = &self.helm {
            validation::validate_non_empty_string("helm_release", &helm.release)?;
            validation::validate_non_empty_string("helm_chart", &helm.chart)?;
            validation::validate_non_empty_string("namespace", &helm.namespace)?;
            if let Some((name, url)) = &helm.repo {
                validation::validate_non_empty_string("helm_repo_name", name)?;
                validation::validate_url("helm_repo_url", url)?;
            }
        }

        Ok(())
    }
}

impl EksOptions {
    fn ebs_csi_role_name(&self) -> String {
        format!("{}-ebs-csi-driver", self.cluster_name)
    }

    fn eksctl(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("eksctl")
            .args(args.iter().copied())
            .args(["--cluster", self.cluster_name.as_str(), "--region", self.region.as_str()])
    }

    fn describe_cluster(&self, query: &str) -> CommandSpec {
        CommandSpec::new("aws").args([
            "eks",
            "describe-cluster",
            "--name",
            self.cluster_name.as_str(),
            "--region",
            self.region.as_str(),
            "--query",
            query,
            "--output",
            "text",
        ])
    }
}

/// Cluster, kubeconfig, logging, EBS CSI driver and an optional Helm release.
pub fn eks_plan(opts: &EksOptions) -> ProvisionPlan {
    let name = opts.cluster_name.as_str();
    let region = opts.region.as_str();

    let mut plan = ProvisionPlan::new(
        format!("eks-{}", name),
        format!("EKS cluster {} in {}", name, region),
    );

    let nodegroup = format!("{}-workers", name);
    let nodes = opts.nodes.to_string();
    let nodes_min = opts.nodes_min.to_string();
    let nodes_max = opts.nodes_max.to_string();

    plan = plan.step(
        ProvisionStep::new(
            "eks-cluster",
            format!("eks/{}", name),
            CommandSpec::new("eksctl").args([
                "create",
                "cluster",
                "--name",
                name,
                "--region",
                region,
                "--version",
                opts.kubernetes_version.as_str(),
                "--nodegroup-name",
                nodegroup.as_str(),
                "--node-type",
                opts.node_type.as_str(),
                "--nodes",
                nodes.as_str(),
                "--nodes-min",
                nodes_min.as_str(),
                "--nodes-max",
                nodes_max.as_str(),
                "--managed",
                "--with-oidc",
            ]),
        )
        .with_check(ExistenceCheck::new(
            CommandSpec::new("eksctl").args(["get", "cluster", "--name", name, "--region", region]),
        )),
    );

    if let Some(kms) = &opts.kms_key_arn {
        plan = plan.step(
            ProvisionStep::new(
                "secrets-encryption",
                format!("eks/{}/kms", name),
                CommandSpec::new("eksctl").args([
                    "utils",
                    "enable-secrets-encryption",
                    "--cluster",
                    name,
                    "--key-arn",
                    kms.as_str(),
                    "--region",
                    region,
                    "--approve",
                ]),
            )
            .with_check(
                ExistenceCheck::new(
                    opts.describe_cluster("cluster.encryptionConfig[].provider.keyArn"),
                )
                .present_when_stdout_contains(kms.clone()),
            ),
        );
    }

    plan = plan.step(ProvisionStep::new(
        "kubeconfig",
        format!("kubeconfig/{}", name),
        CommandSpec::new("aws").args([
            "eks",
            "update-kubeconfig",
            "--name",
            name,
            "--region",
            region,
        ]),
    ));

    if opts.enable_logging {
        let logging = serde_json::json!({
            "clusterLogging": [{ "types": CONTROL_PLANE_LOG_TYPES, "enabled": true }]
        })
        .to_string();
        plan = plan.step(
            ProvisionStep::new(
                "cloudwatch-logging",
                format!("eks/{}/logging", name),
                CommandSpec::new("aws").args([
                    "eks",
                    "update-cluster-config",
                    "--name",
                    name,
                    "--region",
                    region,
                    "--logging",
                    logging.as_str(),
                ]),
            )
            // done only when every control plane log type is enabled
            .with_check(
                ExistenceCheck::new(
                    opts.describe_cluster("cluster.logging.clusterLogging[?enabled].types[]"),
                )
                .present_when_stdout_lists(CONTROL_PLANE_LOG_TYPES.iter().copied()),
            )
            .already_exists_when("No changes needed")
            .optional(),
        );
    }

    let role_name = opts.ebs_csi_role_name();
    plan = plan.step(
        ProvisionStep::new(
            "ebs-csi-role",
            format!("iam/{}", role_name),
            opts.eksctl(&[
                "create",
                "iamserviceaccount",
                "--name",
                "ebs-csi-controller-sa",
                "--namespace",
                "kube-system",
                "--role-name",
                role_name.as_str(),
                "--role-only",
                "--attach-policy-arn",
                EBS_CSI_POLICY_ARN,
                "--approve",
            ]),
        )
        .with_check(ExistenceCheck::new(
            CommandSpec::new("aws").args(["iam", "get-role", "--role-name", role_name.as_str()]),
        )),
    );

    let mut addon = opts.eksctl(&["create", "addon", "--name", "aws-ebs-csi-driver", "--force"]);
    if let Some(account) = &opts.account_id {
        addon = addon.args([
            "--service-account-role-arn".to_string(),
            format!("arn:aws:iam::{}:role/{}", account, role_name),
        ]);
    }
    plan = plan.step(
        ProvisionStep::new("ebs-csi-addon", format!("eks/{}/addon/aws-ebs-csi-driver", name), addon)
            .with_check(
                ExistenceCheck::new(opts.eksctl(&["get", "addon", "--name", "aws-ebs-csi-driver"]))
                    .absent_when("could not find"),
            ),
    );

    if let Some(helm) = &opts.helm {
        if let Some((repo_name, repo_url)) = &helm.repo {
            plan = plan.step(ProvisionStep::new(
                "helm-repo",
                format!("helm-repo/{}", repo_name),
                CommandSpec::new("helm").args([
                    "repo",
                    "add",
                    repo_name.as_str(),
                    repo_url.as_str(),
                    "--force-update",
                ]),
            ));
        }

        let mut install = CommandSpec::new("helm").args([
            "upgrade",
            "--install",
            helm.release.as_str(),
            helm.chart.as_str(),
            "--namespace",
            helm.namespace.as_str(),
            "--create-namespace",
            "--wait",
        ]);
        if let Some(values) = &helm.values_file {
            install = install.args(["--values".to_string(), values.display().to_string()]);
        }

        plan = plan.step(
            ProvisionStep::new(
                "helm-release",
                format!("helm/{}/{}", helm.namespace, helm.release),
                install,
            )
            .with_check(ExistenceCheck::new(CommandSpec::new("helm").args([
                "status",
                helm.release.as_str(),
                "--namespace",
                helm.namespace.as_str(),
            ]))),
        );
    }

    plan
}

#[derive(Debug, Clone)]
pub struct EcsOptions {
    pub cluster_name: String,
    pub region: String,
    pub repository: String,
    pub log_group: String,
    pub execution_role: String,
    pub terraform_dir: Option<PathBuf>,
}

impl Default for EcsOptions {
    fn default() -> Self {
        Self {
            cluster_name: "demo-ecs-cluster".to_string(),
            region: "us-east-1".to_string(),
            repository: "demo-app".to_string(),
            log_group: "/ecs/demo-app".to_string(),
            execution_role: "ecsTaskExecutionRole".to_string(),
            terraform_dir: None,
        }
    }
}

impl Validate for EcsOptions {
    fn validate(&self) -> Result<()> {
        validation::validate_cluster_name("cluster_name", &self.cluster_name)?;
        validation::validate_region("region", &self.region)?;
        validation::validate_non_empty_string("repository", &self.repository)?;
        validation::validate_non_empty_string("log_group", &self.log_group)?;
        validation::validate_non_empty_string("execution_role", &self.execution_role)?;
        Ok(())
    }
}

/// ECR repository, ECS cluster, log group, execution role and optional Terraform apply.
pub fn ecs_plan(opts: &EcsOptions) -> ProvisionPlan {
    let region = opts.region.as_str();
    let mut plan = ProvisionPlan::new(
        format!("ecs-{}", opts.cluster_name),
        format!("ECS Fargate cluster {} in {}", opts.cluster_name, region),
    );

    plan = plan
        .step(
            ProvisionStep::new(
                "ecr-repository",
                format!("ecr/{}", opts.repository),
                CommandSpec::new("aws").args([
                    "ecr",
                    "create-repository",
                    "--repository-name",
                    opts.repository.as_str(),
                    "--region",
                    region,
                    "--image-scanning-configuration",
                    "scanOnPush=true",
                ]),
            )
            .with_check(ExistenceCheck::new(CommandSpec::new("aws").args([
                "ecr",
                "describe-repositories",
                "--repository-names",
                opts.repository.as_str(),
                "--region",
                region,
            ]))),
        )
        .step(
            ProvisionStep::new(
                "ecs-cluster",
                format!("ecs/{}", opts.cluster_name),
                CommandSpec::new("aws").args([
                    "ecs",
                    "create-cluster",
                    "--cluster-name",
                    opts.cluster_name.as_str(),
                    "--region",
                    region,
                    "--capacity-providers",
                    "FARGATE",
                    "FARGATE_SPOT",
                ]),
            )
            // describe-clusters exits 0 for missing clusters; only ACTIVE ones count
            .with_check(
                ExistenceCheck::new(CommandSpec::new("aws").args([
                    "ecs",
                    "describe-clusters",
                    "--clusters",
                    opts.cluster_name.as_str(),
                    "--region",
                    region,
                    "--query",
                    "clusters[?status=='ACTIVE'].clusterName",
                    "--output",
                    "text",
                ]))
                .present_when_stdout_lists([opts.cluster_name.as_str()]),
            ),
        )
        .step(
            ProvisionStep::new(
                "log-group",
                format!("logs/{}", opts.log_group),
                CommandSpec::new("aws").args([
                    "logs",
                    "create-log-group",
                    "--log-group-name",
                    opts.log_group.as_str(),
                    "--region",
                    region,
                ]),
            )
            .with_check(
                ExistenceCheck::new(CommandSpec::new("aws").args([
                    "logs",
                    "describe-log-groups",
                    "--log-group-name-prefix",
                    opts.log_group.as_str(),
                    "--region",
                    region,
                    "--query",
                    "logGroups[].logGroupName",
                    "--output",
                    "text",
                ]))
                // the prefix query also lists siblings such as /ecs/app-v2
                .present_when_stdout_lists([opts.log_group.as_str()]),
            ),
        )
        .step(
            ProvisionStep::new(
                "execution-role",
                format!("iam/{}", opts.execution_role),
                CommandSpec::new("aws").args([
                    "iam",
                    "create-role",
                    "--role-name",
                    opts.execution_role.as_str(),
                    "--assume-role-policy-document",
                    ECS_TASKS_TRUST_POLICY,
                ]),
            )
            .with_check(ExistenceCheck::new(CommandSpec::new("aws").args([
                "iam",
                "get-role",
                "--role-name",
                opts.execution_role.as_str(),
            ]))),
        )
        // attach-role-policy is a no-op when already attached
        .step(ProvisionStep::new(
            "execution-role-policy",
            format!("iam/{}/policy", opts.execution_role),
            CommandSpec::new("aws").args([
                "iam",
                "attach-role-policy",
                "--role-name",
                opts.execution_role.as_str(),
                "--policy-arn",
                ECS_EXECUTION_POLICY_ARN,
            ]),
        ));

    if let Some(dir) = &opts.terraform_dir {
        let chdir = format!("-chdir={}", dir.display());
        plan = plan
            .step(ProvisionStep::new(
                "terraform-init",
                format!("terraform/{}", dir.display()),
                CommandSpec::new("terraform").args([chdir.as_str(), "init", "-input=false"]),
            ))
            .step(ProvisionStep::new(
                "terraform-apply",
                format!("terraform/{}", dir.display()),
                CommandSpec::new("terraform")
                    .args([chdir.as_str(), "apply", "-auto-approve", "-input=false"])
                    .env("AWS_REGION", region),
            ));
    }

    plan
}
