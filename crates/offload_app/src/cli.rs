use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use offload_core::{JobOptions, PollPolicy};
use offload_engine::{ConfigError, ServiceConfig, DEFAULT_BASE_URL};
use serde_json::Value;

use crate::logging::LogDestination;

/// Run files through the remote processing service.
#[derive(Debug, Parser)]
#[command(name = "offload")]
#[command(about = "Upload files to the processing service and download the results", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Input files; each one runs as its own job
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Tool family, e.g. pdf or images
    #[arg(long)]
    pub tool: String,

    /// Operation within the tool, e.g. compress or toCsv
    #[arg(long)]
    pub operation: String,

    /// Job option as KEY=VALUE; VALUE is read as JSON when it parses, else as a string
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, Value)>,

    /// Directory for downloaded results
    #[arg(long, default_value = "output")]
    pub out: PathBuf,

    /// Service base URL
    #[arg(long, env = "OFFLOAD_SERVICE_URL", default_value = DEFAULT_BASE_URL)]
    pub service_url: String,

    /// Delay between status polls
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Give up after this many status polls
    #[arg(long)]
    pub max_polls: Option<u32>,

    /// Give up on a job after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,
}

impl Cli {
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let base = ServiceConfig::with_base_url(self.service_url.clone())?;
        Ok(ServiceConfig {
            poll: PollPolicy {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_polls: self.max_polls,
                ..base.poll
            },
            max_wait: self.timeout_secs.map(Duration::from_secs),
            ..base
        })
    }

    pub fn job_options(&self) -> JobOptions {
        self.options.iter().cloned().collect()
    }
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option key in {raw:?}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
