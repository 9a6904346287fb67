use crate::config::presets::{EcsOptions, EksOptions, HelmRelease};
use crate::utils::error::{LaunchError, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "launchpad")]
#[command(about = "Idempotent AWS provisioning for ECS/EKS demo deployments")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU/memory usage after each step")]
    pub monitor: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run a plan described in a TOML file
    Provision {
        /// Path to the plan file
        #[arg(short, long, default_value = "launchpad.toml")]
        plan: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Provision an EKS cluster (eksctl + aws + helm)
    Eks {
        #[command(flatten)]
        eks: EksArgs,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Provision ECR/ECS resources for a Fargate service
    Ecs {
        #[command(flatten)]
        ecs: EcsArgs,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Smoke-test a deployed service's /health and / endpoints
    Verify {
        /// Base URL of the service, e.g. http://my-alb-123.us-east-1.elb.amazonaws.com
        #[arg(long)]
        url: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Run existence checks only; never invoke create commands
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the tool availability check
    #[arg(long)]
    pub skip_preflight: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct EksArgs {
    #[arg(long, default_value = "demo-eks")]
    pub cluster_name: String,

    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    #[arg(long, default_value = "1.29")]
    pub kubernetes_version: String,

    #[arg(long, default_value = "t3.medium")]
    pub node_type: String,

    #[arg(long, default_value = "2")]
    pub nodes: u32,

    #[arg(long, default_value = "1")]
    pub nodes_min: u32,

    #[arg(long, default_value = "3")]
    pub nodes_max: u32,

    /// KMS key ARN for envelope encryption of Kubernetes secrets
    #[arg(long = "kms")]
    pub kms_key_arn: Option<String>,

    /// AWS account ID, used to wire the EBS CSI addon to its IAM role
    #[arg(long)]
    pub account_id: Option<String>,

    /// Do not enable CloudWatch control-plane logging
    #[arg(long)]
    pub skip_logging: bool,

    #[arg(long, requires = "helm_chart")]
    pub helm_release: Option<String>,

    #[arg(long, requires = "helm_release")]
    pub helm_chart: Option<String>,

    #[arg(long, requires = "helm_repo_url")]
    pub helm_repo_name: Option<String>,

    #[arg(long, requires = "helm_repo_name")]
    pub helm_repo_url: Option<String>,

    #[arg(long)]
    pub helm_values: Option<PathBuf>,

    #[arg(long, default_value = "default")]
    pub namespace: String,
}

impl EksArgs {
    pub fn to_options(&self) -> Result<EksOptions> {
        let helm = match (&self.helm_release, &self.helm_chart) {
            (Some(release), Some(chart)) => Some(HelmRelease {
                release: release.clone(),
                chart: chart.clone(),
                namespace: self.namespace.clone(),
                values_file: self.helm_values.clone(),
                repo: self.helm_repo_name.clone().zip(self.helm_repo_url.clone()),
            }),
            (None, None) => {
                if self.helm_values.is_some() || self.helm_repo_name.is_some() {
                    return Err(LaunchError::MissingConfigError {
                        field: "helm_release".to_string(),
                    });
                }
                None
            }
            _ => {
                return Err(LaunchError::ConfigError {
                    message: "--helm-release and --helm-chart must be given together".to_string(),
                })
            }
        };

        Ok(EksOptions {
            cluster_name: self.cluster_name.clone(),
            region: self.region.clone(),
            kubernetes_version: self.kubernetes_version.clone(),
            node_type: self.node_type.clone(),
            nodes: self.nodes,
            nodes_min: self.nodes_min,
            nodes_max: self.nodes_max,
            kms_key_arn: self.kms_key_arn.clone(),
            account_id: self.account_id.clone(),
            enable_logging: !self.skip_logging,
            helm,
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct EcsArgs {
    #[arg(long, default_value = "demo-ecs-cluster")]
    pub cluster_name: String,

    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// ECR repository name
    #[arg(long, default_value = "demo-app")]
    pub repository: String,

    #[arg(long, default_value = "/ecs/demo-app")]
    pub log_group: String,

    #[arg(long, default_value = "ecsTaskExecutionRole")]
    pub execution_role: String,

    /// Run `terraform init` and `terraform apply` in this directory afterwards
    #[arg(long)]
    pub terraform_dir: Option<PathBuf>,
}

impl EcsArgs {
    pub fn to_options(&self) -> EcsOptions {
        EcsOptions {
            cluster_name: self.cluster_name.clone(),
            region: self.region.clone(),
            repository: self.repository.clone(),
            log_group: self.log_group.clone(),
            execution_role: self.execution_role.clone(),
            terraform_dir: self.terraform_dir.clone(),
        }
    }
}
