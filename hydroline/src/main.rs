mod analyze;
mod cli;
mod observe;

use clap::Parser;
use hydroline_lib::{HeartbeatClient, DEFAULT_BACKEND_URL, DEFAULT_NODE_ID};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::error::Error;
use std::time::Duration;

use crate::cli::{Cli, Commands, HeartbeatArgs};

fn main() {
    let cli = Cli::parse();

    TermLogger::init(
        cli.loglevel,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .expect("failed to initialize logger");

    let result = match cli.command {
        Commands::Observe(args) => observe::run(args),
        Commands::Analyze(args) => analyze::run(args),
        Commands::Heartbeat(args) => run_heartbeat(args),
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run_heartbeat(args: HeartbeatArgs) -> Result<(), Box<dyn Error>> {
    let client = HeartbeatClient::new(
        args.node_id
            .or_else(|| std::env::var("NODE_ID").ok())
            .unwrap_or_else(|| DEFAULT_NODE_ID.to_owned()),
        args.backend_url
            .or_else(|| std::env::var("BACKEND_URL").ok())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned()),
    );

    if args.once {
        client.send(None, None, None)?;
        log::info!("heartbeat sent");
        return Ok(());
    }

    log::info!(
        "heartbeat service for {} -> {}, every {}s",
        client.node_id(),
        client.backend_url(),
        args.interval
    );
    loop {
        match client.send(None, None, None) {
            Ok(()) => log::info!("heartbeat sent"),
            Err(e) => log::warn!("heartbeat failed: {e}"),
        }
        std::thread::sleep(Duration::from_secs(args.interval));
    }
}
