//! Radio-silence interface control and connectivity waiting.
//!
//! Interface control is strictly best-effort: a failure to bring an
//! interface down is logged and the observation continues, because
//! finishing the capture matters more than a hard isolation guarantee.

use std::time::{Duration, Instant};

use crate::errors::ProcessError;
use crate::process::ProcessRunner;

/// Interfaces silenced during capture on the observing node.
pub const DEFAULT_INTERFACES: &[&str] = &["wlan0", "eth0"];

/// Hostname resolved to probe for restored connectivity.
const PROBE_HOST: &str = "google.com";
const PROBE_POLL: Duration = Duration::from_secs(1);
const IFACE_TIMEOUT: Duration = Duration::from_secs(15);

pub trait NetworkControl {
    /// Takes the configured interfaces down, best-effort.
    fn silence(&self);
    /// Brings the configured interfaces back up, best-effort.
    fn restore(&self);
    /// Blocks until DNS resolution works or `max_wait` elapses. Returns
    /// whether connectivity came back; giving up is not an error.
    fn wait_for_network(&self, max_wait: Duration) -> bool;
}

/// Production control via `sudo ifconfig <iface> down|up` and a
/// `getent hosts` DNS probe.
pub struct InterfaceControl<R: ProcessRunner> {
    runner: R,
    interfaces: Vec<String>,
}

impl<R: ProcessRunner> InterfaceControl<R> {
    pub fn new(runner: R, interfaces: Vec<String>) -> Self {
        Self { runner, interfaces }
    }

    fn set_link(&self, iface: &str, state: &str) {
        let args = vec!["ifconfig".to_owned(), iface.to_owned(), state.to_owned()];
        match self.runner.run("sudo", &args, IFACE_TIMEOUT) {
            Ok(out) if out.success() => log::info!("  {} {} -> ok", iface, state),
            Ok(out) => log::warn!(
                "  {} {} -> failed (rc={}), continuing anyway",
                iface,
                state,
                out.code
            ),
            Err(e) => log::warn!("  {} {} -> failed ({}), continuing anyway", iface, state, e),
        }
    }
}

impl<R: ProcessRunner> NetworkControl for InterfaceControl<R> {
    fn silence(&self) {
        log::info!("radio silence ON: disabling {}", self.interfaces.join(" and "));
        for iface in &self.interfaces {
            self.set_link(iface, "down");
        }
    }

    fn restore(&self) {
        log::info!("radio silence OFF: enabling {}", self.interfaces.join(" and "));
        for iface in self.interfaces.iter().rev() {
            self.set_link(iface, "up");
        }
    }

    fn wait_for_network(&self, max_wait: Duration) -> bool {
        log::info!("waiting for network to come back...");
        let deadline = Instant::now() + max_wait;
        let args = vec!["hosts".to_owned(), PROBE_HOST.to_owned()];
        while Instant::now() < deadline {
            if let Ok(out) = self.runner.run("getent", &args, PROBE_POLL * 5) {
                if out.success() {
                    log::info!("network looks up (DNS ok)");
                    return true;
                }
            }
            std::thread::sleep(PROBE_POLL);
        }
        log::warn!(
            "network did not come back within {}s, continuing anyway",
            max_wait.as_secs()
        );
        false
    }
}

/// Fails fast when `sudo` would stop to ask for a password mid-campaign.
pub fn check_sudo<R: ProcessRunner>(runner: &R) -> Result<(), ProcessError> {
    runner
        .run_checked(
            "sudo",
            &["-n".to_owned(), "true".to_owned()],
            Duration::from_secs(10),
        )
        .map(|_| ())
}
