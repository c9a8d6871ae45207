use std::path::Path;

use sysinfo::{Disks, System};
use tracing::{debug, warn};

/// Stands in for any fact that could not be collected.
pub const UNKNOWN: &str = "Unknown";

const BYTES_PER_GB: u64 = 1 << 30;
const BYTES_PER_MB: u64 = 1 << 20;

/// A snapshot of the host, taken once per invocation.
///
/// Facets that fail to load are `None` (or [`UNKNOWN`] for text fields)
/// rather than an error, so a sandboxed host still gets a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemFacts {
    pub os: String,
    pub shell: String,
    pub current_dir: String,
    pub free_disk_bytes: Option<u64>,
    pub free_memory_bytes: Option<u64>,
    pub cpu_count: Option<usize>,
    pub cpu_usage: Option<f32>,
    /// Process environment, in the order the OS reports it.
    pub env_vars: Vec<(String, String)>,
}

impl SystemFacts {
    pub fn collect() -> Self {
        let env_vars: Vec<(String, String)> = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        let shell = env_vars
            .iter()
            .find(|(k, _)| k == "SHELL")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let current_dir = match std::env::current_dir() {
            Ok(dir) => dir.display().to_string(),
            Err(e) => {
                warn!("Unable to read current directory: {}", e);
                UNKNOWN.to_string()
            }
        };

        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        // usage is a delta between two refreshes
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let free_memory_bytes = Some(sys.available_memory()).filter(|bytes| *bytes > 0);
        let cpu_count = Some(sys.cpus().len()).filter(|count| *count > 0);
        let cpu_usage = cpu_count.map(|_| sys.global_cpu_usage());

        let facts = Self {
            os: os_description(),
            shell,
            current_dir,
            free_disk_bytes: root_disk_free_bytes(),
            free_memory_bytes,
            cpu_count,
            cpu_usage,
            env_vars,
        };
        debug!(
            "Collected system facts: os={}, disk={:?}, memory={:?}, cpus={:?}",
            facts.os, facts.free_disk_bytes, facts.free_memory_bytes, facts.cpu_count
        );
        facts
    }

    /// Whole gigabytes, rounded down.
    pub fn free_disk_space(&self) -> String {
        match self.free_disk_bytes {
            Some(bytes) => format!("{} GB", bytes / BYTES_PER_GB),
            None => UNKNOWN.to_string(),
        }
    }

    /// Whole megabytes, rounded down.
    pub fn free_memory(&self) -> String {
        match self.free_memory_bytes {
            Some(bytes) => format!("{} MB", bytes / BYTES_PER_MB),
            None => UNKNOWN.to_string(),
        }
    }

    pub fn cpu_count(&self) -> String {
        self.cpu_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn cpu_usage(&self) -> String {
        match self.cpu_usage {
            Some(usage) => format!("{:.1}%", usage),
            None => UNKNOWN.to_string(),
        }
    }
}

fn os_description() -> String {
    let name = System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string());
    match System::kernel_version() {
        Some(kernel) => format!("{} (kernel {}, {})", name, kernel, std::env::consts::ARCH),
        None => format!("{} ({})", name, std::env::consts::ARCH),
    }
}

fn root_disk_free_bytes() -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"));
    if root.is_none() {
        warn!("No disk mounted at /, free disk space unavailable");
    }
    root.map(|disk| disk.available_space())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> SystemFacts {
        SystemFacts {
            os: "Linux".into(),
            shell: "/bin/zsh".into(),
            current_dir: "/home/joe".into(),
            free_disk_bytes: Some(5 * BYTES_PER_GB + BYTES_PER_GB - 1),
            free_memory_bytes: Some(2048 * BYTES_PER_MB + 17),
            cpu_count: Some(8),
            cpu_usage: Some(12.34),
            env_vars: vec![],
        }
    }

    #[test]
    fn sizes_round_down() {
        let facts = facts();
        assert_eq!(facts.free_disk_space(), "5 GB");
        assert_eq!(facts.free_memory(), "2048 MB");
        assert_eq!(facts.cpu_count(), "8");
        assert_eq!(facts.cpu_usage(), "12.3%");
    }

    #[test]
    fn missing_facets_use_sentinel() {
        let facts = SystemFacts {
            free_disk_bytes: None,
            free_memory_bytes: None,
            cpu_count: None,
            cpu_usage: None,
            ..facts()
        };
        assert_eq!(facts.free_disk_space(), UNKNOWN);
        assert_eq!(facts.free_memory(), UNKNOWN);
        assert_eq!(facts.cpu_count(), UNKNOWN);
        assert_eq!(facts.cpu_usage(), UNKNOWN);
    }

    #[test]
    fn collect_reads_process_environment() {
        let facts = SystemFacts::collect();
        assert!(!facts.os.is_empty());
        assert!(!facts.current_dir.is_empty());
        let path = std::env::var_os("PATH").map(|p| p.to_string_lossy().into_owned());
        if let Some(path) = path {
            assert!(facts.env_vars.iter().any(|(k, v)| k == "PATH" && *v == path));
        }
    }
}
