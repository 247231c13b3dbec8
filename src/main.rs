//! Kube Nukem
//!
//! Entry point: parses flags, sets up logging and the Kubernetes client,
//! then nukes every CRD named on the command line.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kube_nukem::cli::{version_banner, Args};
use kube_nukem::cluster::{connect, KubeCluster};
use kube_nukem::nuker::nuke_all;

/// RFC 1123 style timestamps for text output
const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    if args.version {
        println!("{}", version_banner());
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing(args.verbose, args.log_json);

    if args.crds.is_empty() {
        error!("No CRD names provided.");
        return Ok(ExitCode::FAILURE);
    }

    let client = connect(args.kubeconfig.as_deref()).await?;
    let cluster = KubeCluster::new(client);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let report = nuke_all(&cancel, &cluster, &args.crds, &args.nuke_config()).await;

    if report.is_success() {
        info!("Everything nuked successfully.");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            "{} of {} CRD(s) could not be nuked.",
            report.failed() + report.skipped.len(),
            args.crds.len()
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "info,kube_nukem=debug,kube=warn"
    } else {
        "info,kube=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string())),
            )
            .init();
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal, aborting");
        }
        _ = terminate => {
            info!("Received SIGTERM signal, aborting");
        }
    }
}
