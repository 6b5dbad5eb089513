use clap::{Parser, Subcommand};
use hydroline_lib::Mode;
use simplelog::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Log level for output (error, warn, info, debug, trace)
    #[arg(global = true, long, default_value = "info")]
    pub loglevel: LevelFilter,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an unattended observation campaign
    Observe(ObserveArgs),

    /// Print the statistics stored in an artifact file
    Analyze(AnalyzeArgs),

    /// Send liveness pings to the backend
    Heartbeat(HeartbeatArgs),
}

#[derive(Parser)]
pub struct ObserveArgs {
    /// Number of back-to-back observation runs
    #[arg(long, default_value = "1")]
    pub runs: u32,

    /// Pause between runs in seconds
    #[arg(long, default_value = "180")]
    pub pause: u64,

    /// Antenna pointing: 'on' (at source) or 'off' (reference)
    #[arg(long)]
    pub mode: Mode,

    /// Observation name tag for the logs
    #[arg(long, default_value = "observation")]
    pub name: String,

    /// Skip network disable (for laptops/systems without sudo)
    #[arg(long, default_value = "false")]
    pub no_radio_silence: bool,

    /// Disable liveness pings to the backend
    #[arg(long, default_value = "false")]
    pub no_heartbeat: bool,

    /// Directory for artifact files (default: $OUTPUT_DIR or ./output)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Node identifier for heartbeats (default: $NODE_ID)
    #[arg(long)]
    pub node_id: Option<String>,

    /// Backend base URL for heartbeats (default: $BACKEND_URL)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// rclone remote receiving the batch upload (default: $REMOTE_DIR)
    #[arg(long)]
    pub remote: Option<String>,
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Artifact file to inspect
    pub file: PathBuf,
}

#[derive(Parser)]
pub struct HeartbeatArgs {
    /// Node identifier (default: $NODE_ID)
    #[arg(long)]
    pub node_id: Option<String>,

    /// Backend base URL (default: $BACKEND_URL)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Seconds between heartbeats in continuous mode
    #[arg(long, default_value = "30")]
    pub interval: u64,

    /// Send a single heartbeat and exit
    #[arg(long, default_value = "false")]
    pub once: bool,
}
