use anyhow::Result;
use clap::Parser;
use iam_key_audit::commands;
use iam_key_audit::config::ReportOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "iam-key-report")]
#[command(about = "Audit IAM user access keys into a CSV report", long_about = None)]
#[command(version)]
struct Cli {
    /// Environment label written into the report (spaces are dropped from the file name)
    environment: String,

    /// IAM user to elevate for the scan (default: $IAM_AUDIT_ELEVATION_USER or sre-cli-user)
    #[arg(long)]
    elevation_user: Option<String>,

    /// Managed policy to attach while scanning (default: $IAM_AUDIT_POLICY_ARN or AdministratorAccess)
    #[arg(long)]
    policy_arn: Option<String>,

    /// Scan with the caller's current permissions, without attaching a policy
    #[arg(long)]
    no_elevation: bool,

    /// Directory to write the report into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Seconds to wait for an attached policy to take effect
    #[arg(long)]
    propagation_timeout: Option<u64>,

    /// Attempts per directory call when throttled or unavailable
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let options = ReportOptions {
        elevation_user: cli.elevation_user,
        policy_arn: cli.policy_arn,
        no_elevation: cli.no_elevation,
        output_dir: cli.output_dir,
        propagation_timeout_secs: cli.propagation_timeout,
        max_attempts: cli.max_attempts,
    };

    commands::key_report::run(&cli.environment, &options).await
}
