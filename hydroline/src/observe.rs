use hydroline_lib::{
    check_sudo, AirspyRx, CampaignConfig, CampaignOrchestrator, HeartbeatClient, InterfaceControl,
    NetworkControl, RcloneUploader, SystemDisk, SystemRunner, DEFAULT_BACKEND_URL,
    DEFAULT_INTERFACES, DEFAULT_NODE_ID,
};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::ObserveArgs;

pub fn run(args: ObserveArgs) -> Result<(), Box<dyn Error>> {
    let isolate = !args.no_radio_silence;
    if isolate {
        // Fail fast if sudo would block on a password prompt mid-campaign.
        check_sudo(&SystemRunner).map_err(|e| {
            format!(
                "sudo is not available without a password ({e}); \
                 configure NOPASSWD or rerun with --no-radio-silence"
            )
        })?;
    }

    let output_dir = args.output_dir.unwrap_or_else(default_output_dir);
    fs::create_dir_all(&output_dir)?;

    let mut config = CampaignConfig::new(args.runs, args.mode, output_dir.clone());
    config.pause = Duration::from_secs(args.pause);
    config.isolate_network = isolate;
    config.name = args.name;

    let interfaces: Vec<String> = DEFAULT_INTERFACES.iter().map(|s| s.to_string()).collect();

    // Last-resort safety: if the operator interrupts mid-capture, force the
    // network back on before dying.
    let handler_ctl = InterfaceControl::new(SystemRunner, interfaces.clone());
    ctrlc::set_handler(move || {
        if isolate {
            log::warn!("interrupted, forcing network back on");
            handler_ctl.restore();
        }
        std::process::exit(130);
    })?;

    let heartbeat = if args.no_heartbeat {
        None
    } else {
        Some(HeartbeatClient::new(
            resolve(args.node_id, "NODE_ID", DEFAULT_NODE_ID),
            resolve(args.backend_url, "BACKEND_URL", DEFAULT_BACKEND_URL),
        ))
    };
    let remote = resolve(args.remote, "REMOTE_DIR", "gdrive:");

    let mut orchestrator = CampaignOrchestrator::new(
        config,
        AirspyRx::new(SystemRunner),
        InterfaceControl::new(SystemRunner, interfaces),
        SystemDisk::new(output_dir.clone()),
        RcloneUploader::new(SystemRunner, output_dir, remote.clone()),
        heartbeat,
    );

    match orchestrator.run() {
        Ok(summary) => {
            log::info!(
                "campaign complete: {} run(s), {} file(s) uploaded",
                summary.runs_completed,
                summary.uploaded.len()
            );
            Ok(())
        }
        Err(e) => {
            let retained = orchestrator.artifacts();
            if !retained.is_empty() {
                eprintln!("retained artifacts ({}):", retained.len());
                for path in retained {
                    eprintln!("  - {}", path.display());
                }
                eprintln!("to retry the upload manually: rclone copy <output dir> {remote}");
            }
            Err(Box::new(e))
        }
    }
}

fn default_output_dir() -> PathBuf {
    std::env::var("OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("output"))
}

fn resolve(flag: Option<String>, env_var: &str, default: &str) -> String {
    flag.or_else(|| std::env::var(env_var).ok())
        .unwrap_or_else(|| default.to_owned())
}
