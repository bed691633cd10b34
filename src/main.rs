// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::{Context, Result};
use bundle_operator::app_types::App;
use bundle_operator::bundle_config::BundleRegistry;
use bundle_operator::common::DEFAULT_ORG_NAMESPACE;
use bundle_operator::reconciler::BundleReconciler;
use bundle_operator::shim_layer::controller_runtime::{run_controller, Data};
use bundle_operator::shim_layer::kube_store::KubeStore;
use clap::{Parser, Subcommand, ValueEnum};
use kube::{Client, CustomResourceExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bundle-operator", version, about = "Wires bundle Apps to their extra-config ConfigMaps")]
struct Cli {
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the App custom resource definition
    Export,
    /// Run the controller
    Run(RunArgs),
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Bundle definition file
    #[arg(long, env = "BUNDLE_CONFIG")]
    bundle_config: PathBuf,

    /// The only namespace whose Apps are reconciled
    #[arg(long, env = "WATCH_NAMESPACE", default_value = DEFAULT_ORG_NAMESPACE)]
    namespace: String,

    /// Seconds to wait before retrying a failed reconciliation
    #[arg(long, env = "REQUEUE_AFTER_ERROR_SECS", default_value_t = 10)]
    requeue_after_error_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Export => {
            info!("exporting custom resource definition");
            println!("{}", serde_yaml::to_string(&App::crd())?);
        }
        Command::Run(args) => {
            info!("running bundle-operator");
            let registry = BundleRegistry::load(&args.bundle_config)
                .with_context(|| format!("loading {}", args.bundle_config.display()))?;
            let client = Client::try_default().await?;

            let cancellation = CancellationToken::new();
            let signal_token = cancellation.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_token.cancel();
                }
            });

            let data = Arc::new(Data {
                store: Arc::new(KubeStore::new(client.clone())),
                reconciler: BundleReconciler::new(Arc::new(registry), args.namespace),
                cancellation,
                requeue_after_error: Duration::from_secs(args.requeue_after_error_secs),
            });
            run_controller(client, data).await;
        }
    }
    Ok(())
}
