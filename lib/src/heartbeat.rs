//! Liveness reporting to the campaign backend.
//!
//! Heartbeats are strictly advisory: every caller downgrades a failure to
//! a log line. The orchestrator holds an `Option<HeartbeatClient>`;
//! `None` simply means no heartbeats are attempted.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::time::Duration;

use crate::errors::HeartbeatError;

pub const DEFAULT_NODE_ID: &str = "Spartan-001";
pub const DEFAULT_BACKEND_URL: &str = "https://astron00b.com";
/// Seconds between pings in continuous mode.
pub const DEFAULT_INTERVAL_S: u64 = 30;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct HeartbeatPayload {
    /// ISO-8601 UTC timestamp with a Z suffix.
    ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    uptime_s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    load: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_runs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_capture: Option<String>,
}

pub struct HeartbeatClient {
    agent: ureq::Agent,
    node_id: String,
    backend_url: String,
}

impl HeartbeatClient {
    pub fn new(node_id: String, backend_url: String) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            node_id,
            backend_url,
        }
    }

    /// Node id and backend from `NODE_ID` / `BACKEND_URL` env vars, with
    /// the observing-site defaults.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("NODE_ID").unwrap_or_else(|_| DEFAULT_NODE_ID.to_owned()),
            std::env::var("BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_owned()),
        )
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Sends one liveness ping. Uptime and load average are included when
    /// the /proc reads work, omitted otherwise.
    pub fn send(
        &self,
        run_index: Option<u32>,
        total_runs: Option<u32>,
        last_capture: Option<&str>,
    ) -> Result<(), HeartbeatError> {
        let url = format!(
            "{}/api/nodes/heartbeat/{}",
            self.backend_url, self.node_id
        );
        let payload = HeartbeatPayload {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            uptime_s: uptime_seconds(),
            load: load_average(),
            run_index,
            total_runs,
            last_capture: last_capture.map(str::to_owned),
        };
        self.agent
            .post(&url)
            .send_json(payload)
            .map_err(|e| HeartbeatError::Http(Box::new(e)))?;
        Ok(())
    }
}

fn uptime_seconds() -> Option<u64> {
    parse_uptime(&fs::read_to_string("/proc/uptime").ok()?)
}

fn load_average() -> Option<String> {
    parse_loadavg(&fs::read_to_string("/proc/loadavg").ok()?)
}

fn parse_uptime(contents: &str) -> Option<u64> {
    contents
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .map(|s| s as u64)
}

fn parse_loadavg(contents: &str) -> Option<String> {
    let parts: Vec<&str> = contents.split_whitespace().take(3).collect();
    if parts.len() == 3 {
        Some(parts.join(" "))
    } else {
        None
    }
}
