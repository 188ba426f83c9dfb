// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! GPU and VRAM detection via vendor command-line tools

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound on any single probe command
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Estimate used when `rocm-smi` reports a GPU without a usable size
const ROCM_VRAM_ESTIMATE_GB: f64 = 8.0;

/// Share of Apple Silicon unified memory assumed usable by the GPU
const APPLE_GPU_SHARE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct GpuInfo {
    pub has_gpu: bool,
    pub vendor: Option<String>,
    pub vram_gb: f64,
    pub model: Option<String>,
}

impl GpuInfo {
    pub fn none() -> Self {
        Self { has_gpu: false, vendor: None, vram_gb: 0.0, model: None }
    }
}

/// Probe NVIDIA, then AMD ROCm, then Apple Silicon
pub fn detect_gpu() -> GpuInfo {
    if let Some(stdout) = run("nvidia-smi", &["--query-gpu=memory.total,name", "--format=csv,noheader,nounits"]) {
        if let Some(info) = parse_nvidia_smi(&stdout) {
            return info;
        }
    }

    if let Some(stdout) = run("rocm-smi", &["--showmeminfo", "vram"]) {
        if let Some(info) = parse_rocm_smi(&stdout) {
            return info;
        }
    }

    if cfg!(target_os = "macos") {
        if let Some(brand) = run("sysctl", &["-n", "machdep.cpu.brand_string"]) {
            let memsize = run("sysctl", &["-n", "hw.memsize"]).and_then(|s| s.trim().parse::<u64>().ok());
            if let Some(info) = apple_silicon(&brand, memsize) {
                return info;
            }
        }
    }

    GpuInfo::none()
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    run_with_timeout(program, args, PROBE_TIMEOUT)
}

/// Run a probe command and return its stdout; `None` if it is missing,
/// exits non-zero or is still running at `timeout` (it is killed then)
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!("{} not usable: {}", program, e);
            return None;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                let mut stdout = Vec::new();
                child.stdout.take()?.read_to_end(&mut stdout).ok()?;
                return Some(String::from_utf8_lossy(&stdout).into_owned());
            }
            Ok(Some(status)) => {
                debug!("{} exited with {}", program, status);
                return None;
            }
            Ok(None) if Instant::now() >= deadline => {
                warn!("{} did not finish within {:?}, killing it", program, timeout);
                if let Err(e) = child.kill() {
                    debug!("Failed to kill {}: {}", program, e);
                }
                let _ = child.wait();
                return None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                debug!("Waiting on {} failed: {}", program, e);
                return None;
            }
        }
    }
}

/// First line of `memory.total,name` CSV (MiB, no units)
pub fn parse_nvidia_smi(stdout: &str) -> Option<GpuInfo> {
    let line = stdout.trim().lines().next()?;
    let (mem, name) = line.split_once(',')?;
    let vram_mb: f64 = mem.trim().parse().ok()?;
    Some(GpuInfo {
        has_gpu: true,
        vendor: Some("NVIDIA".to_string()),
        vram_gb: round1(vram_mb / 1024.0),
        model: Some(name.trim().to_string()),
    })
}

pub fn parse_rocm_smi(stdout: &str) -> Option<GpuInfo> {
    if !stdout.contains("GPU") {
        return None;
    }
    Some(GpuInfo {
        has_gpu: true,
        vendor: Some("AMD".to_string()),
        vram_gb: ROCM_VRAM_ESTIMATE_GB,
        model: None,
    })
}

/// Unified memory estimate from the CPU brand string and `hw.memsize`
pub fn apple_silicon(brand: &str, memsize_bytes: Option<u64>) -> Option<GpuInfo> {
    if !brand.contains("Apple") {
        return None;
    }
    let vram_gb = match memsize_bytes {
        Some(bytes) => round1(bytes as f64 / (1024.0 * 1024.0 * 1024.0) * APPLE_GPU_SHARE),
        None => 8.0,
    };
    Some(GpuInfo {
        has_gpu: true,
        vendor: Some("Apple".to_string()),
        vram_gb,
        model: Some(brand.trim().to_string()),
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nvidia_output_is_converted_to_gib() {
        let info = parse_nvidia_smi("8192, NVIDIA GeForce RTX 3070\n").unwrap();
        assert_eq!(info.vram_gb, 8.0);
        assert_eq!(info.vendor.as_deref(), Some("NVIDIA"));
        assert_eq!(info.model.as_deref(), Some("NVIDIA GeForce RTX 3070"));

        let info = parse_nvidia_smi("12288, RTX 4070\n24576, RTX 4090\n").unwrap();
        assert_eq!(info.vram_gb, 12.0);
    }

    #[test]
    fn garbage_nvidia_output_is_ignored() {
        assert!(parse_nvidia_smi("").is_none());
        assert!(parse_nvidia_smi("No devices were found").is_none());
    }

    #[test]
    fn rocm_uses_fixed_estimate() {
        let info = parse_rocm_smi("GPU 0: VRAM info...").unwrap();
        assert_eq!(info.vram_gb, 8.0);
        assert!(parse_rocm_smi("nothing here").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn probe_output_is_captured() {
        assert_eq!(run_with_timeout("echo", &["8192, RTX"], PROBE_TIMEOUT).as_deref(), Some("8192, RTX\n"));
        assert!(run_with_timeout("false", &[], PROBE_TIMEOUT).is_none());
        assert!(run_with_timeout("definitely-not-a-real-tool", &[], PROBE_TIMEOUT).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn hung_probe_is_killed_at_the_deadline() {
        let started = Instant::now();
        assert!(run_with_timeout("sleep", &["30"], Duration::from_millis(200)).is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn apple_silicon_gets_sixty_percent_of_memory() {
        let info = apple_silicon("Apple M2 Pro", Some(34_359_738_368)).unwrap();
        assert_eq!(info.vram_gb, 19.2);
        assert_eq!(apple_silicon("Apple M1", None).unwrap().vram_gb, 8.0);
        assert!(apple_silicon("Intel(R) Core(TM) i9", Some(1)).is_none());
    }
}
