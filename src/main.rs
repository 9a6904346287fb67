use aws_launchpad::config::cli::RunArgs;
use aws_launchpad::config::{ecs_plan, eks_plan, CliConfig, Commands, PlanConfig};
use aws_launchpad::domain::model::{ProvisionPlan, RunReport};
use aws_launchpad::utils::{logger, validation::Validate};
use aws_launchpad::{HealthVerifier, LaunchError, ProcessRunner, ProvisioningDriver, Result};
use clap::Parser;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting launchpad");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = run(config).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        // 輸出用戶友好的錯誤信息
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(config: CliConfig) -> Result<()> {
    match &config.command {
        Commands::Provision { plan, run } => {
            tracing::info!("📁 Loading plan from: {}", plan.display());
            let plan_config = PlanConfig::from_file(plan)?;
            let plan = plan_config.to_plan()?;
            execute(&plan, run, config.monitor).await
        }
        Commands::Eks { eks, run } => {
            let options = eks.to_options()?;
            options.validate()?;
            execute(&eks_plan(&options), run, config.monitor).await
        }
        Commands::Ecs { ecs, run } => {
            let options = ecs.to_options();
            options.validate()?;
            execute(&ecs_plan(&options), run, config.monitor).await
        }
        Commands::Verify { url, timeout } => {
            let verifier = HealthVerifier::new(url, Duration::from_secs(*timeout))?;
            let report = verifier.verify().await?;
            println!(
                "✅ {} is {} and serves {}",
                report.base_url, report.health_status, report.index_content_type
            );
            Ok(())
        }
    }
}

async fn execute(plan: &ProvisionPlan, args: &RunArgs, monitor: bool) -> Result<()> {
    let driver = ProvisioningDriver::new_with_monitoring(ProcessRunner::new(), monitor)
        .dry_run(args.dry_run)
        .preflight(!args.skip_preflight);

    // Ctrl-C drops the run future; child processes are killed on drop
    let report = tokio::select! {
        report = driver.run(plan) => report?,
        _ = tokio::signal::ctrl_c() => return Err(LaunchError::Interrupted),
    };

    print_report(&report, args.json)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for step in &report.steps {
        println!("  {:<24} {:<40} {}", step.name, step.resource, step.outcome);
    }
    println!("✅ {}", report.summary());
    Ok(())
}
