//! Periodic resource sampling for a subprocess: hang detection plus
//! memory/CPU/fd breaches against the configured limits.

use sysinfo::{Pid, ProcessesToUpdate, System};

use aegis_domain::config::StdioConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthVerdict {
    Ok,
    Hung,
    MemoryBreach { rss_mb: u64 },
    FdBreach { fds: u64 },
    CpuWarning { percent: f32 },
}

pub struct HealthSampler {
    system: System,
}

impl HealthSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Samples the process identified by `pid` and returns every breach
    /// found, most severe first. Memory and fd breaches are fatal (the
    /// caller should kill the process); a CPU breach is logged only.
    pub fn sample(&mut self, pid: u32, config: &StdioConfig) -> Vec<HealthVerdict> {
        let sys_pid = Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[sys_pid]));

        let mut verdicts = Vec::new();
        let Some(proc) = self.system.process(sys_pid) else {
            return verdicts;
        };

        let rss_mb = proc.memory() / 1024 / 1024;
        if rss_mb > config.max_memory_mb {
            verdicts.push(HealthVerdict::MemoryBreach { rss_mb });
        }

        let cpu = proc.cpu_usage();
        if cpu > config.max_cpu_percent {
            verdicts.push(HealthVerdict::CpuWarning { percent: cpu });
        }

        if let Some(fds) = open_fd_count(pid) {
            if fds > config.max_fds {
                verdicts.push(HealthVerdict::FdBreach { fds });
            }
        }

        verdicts
    }

    pub fn check_hang(&self, idle: std::time::Duration, config: &StdioConfig) -> bool {
        idle.as_secs() > config.hung_timeout_secs
    }
}

impl Default for HealthSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn open_fd_count(pid: u32) -> Option<u64> {
    std::fs::read_dir(format!("/proc/{pid}/fd"))
        .ok()
        .map(|entries| entries.count() as u64)
}

#[cfg(not(target_os = "linux"))]
fn open_fd_count(_pid: u32) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hang_check_uses_configured_threshold() {
        let sampler = HealthSampler::new();
        let config = StdioConfig {
            hung_timeout_secs: 15,
            ..StdioConfig::default()
        };
        assert!(!sampler.check_hang(std::time::Duration::from_secs(5), &config));
        assert!(sampler.check_hang(std::time::Duration::from_secs(20), &config));
    }
}
