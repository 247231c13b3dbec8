//! Command line arguments

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{NukeConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

/// Remove CRDs and clear finalizers on their stuck custom resources
#[derive(Debug, Parser)]
#[command(name = "kube-nukem", disable_version_flag = true)]
pub struct Args {
    /// kubeconfig file to use (uses $KUBECONFIG by default)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// enable more verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// show version info and exit immediately
    #[arg(short = 'V', long)]
    pub version: bool,

    /// log as JSON instead of text
    #[arg(long)]
    pub log_json: bool,

    /// seconds to wait for a deleted CRD to disappear
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// milliseconds between two checks while waiting
    #[arg(long, value_name = "MILLIS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub interval: u64,

    /// fail when a list call reports the resource type as not found
    #[arg(long)]
    pub strict_list: bool,

    /// names of the CRDs to nuke, e.g. widgets.example.com
    #[arg(value_name = "CRD")]
    pub crds: Vec<String>,
}

impl Args {
    /// Settings for the nuke run
    pub fn nuke_config(&self) -> NukeConfig {
        let config = NukeConfig::default()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_poll_interval(Duration::from_millis(self.interval));

        if self.strict_list {
            config.strict_list()
        } else {
            config
        }
    }
}

/// One-line description of this build
pub fn version_banner() -> String {
    let commit = option_env!("KUBE_NUKEM_BUILD_COMMIT").unwrap_or("unknown");
    let date = option_env!("KUBE_NUKEM_BUILD_DATE").unwrap_or("unknown");

    format!(
        "Kube Nukem {} ({}), built with rustc on {}",
        env!("CARGO_PKG_VERSION"),
        commit.get(..10).unwrap_or(commit),
        date,
    )
}
