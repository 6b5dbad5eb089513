//! Disk-space statistics for the preflight guard.

use std::io;
use std::path::PathBuf;
use std::process::Command;

pub trait DiskUsage {
    /// Free space in MB on the volume holding the observation output.
    fn free_mb(&self) -> io::Result<u64>;
}

/// Production implementation shelling out to POSIX `df`.
pub struct SystemDisk {
    path: PathBuf,
}

impl SystemDisk {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DiskUsage for SystemDisk {
    fn free_mb(&self) -> io::Result<u64> {
        let output = Command::new("df")
            .arg("-Pk")
            .arg(&self.path)
            .output()?;
        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("df exited with {}", output.status),
            ));
        }
        parse_df_free_kb(&String::from_utf8_lossy(&output.stdout))
            .map(|kb| kb / 1024)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unparseable df output"))
    }
}

/// Pulls the "Available" kilobyte column out of `df -Pk` output.
fn parse_df_free_kb(output: &str) -> Option<u64> {
    output
        .lines()
        .nth(1)?
        .split_whitespace()
        .nth(3)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_posix_df_output() {
        let out = "Filesystem     1024-blocks     Used Available Capacity Mounted on\n\
                   /dev/root         61101556 14897364  43671328      26% /\n";
        assert_eq!(parse_df_free_kb(out), Some(43_671_328));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_df_free_kb("no such device"), None);
        assert_eq!(parse_df_free_kb(""), None);
    }
}
