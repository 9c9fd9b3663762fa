use serde::Serialize;

/// Point-in-time resource snapshot attached to health responses and log
/// records. Memory figures come from procfs and are absent on platforms
/// without it.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub cpu_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_available_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_memory_mb: Option<f64>,
}

pub fn snapshot() -> SystemInfo {
    SystemInfo {
        cpu_count: cpu_count(),
        memory_available_gb: available_memory_gb(),
        process_memory_mb: process_memory_mb(),
    }
}

pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resident set size of this process in megabytes.
pub fn process_memory_mb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let kb = read_kb_field(&status, "VmRSS:")?;
        Some(kb / 1024.0)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

pub fn available_memory_gb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        let kb = read_kb_field(&meminfo, "MemAvailable:")?;
        Some((kb / (1024.0 * 1024.0) * 100.0).round() / 100.0)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(target_os = "linux")]
fn read_kb_field(raw: &str, field: &str) -> Option<f64> {
    raw.lines()
        .find_map(|line| line.strip_prefix(field))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_has_at_least_one_cpu() {
        assert!(snapshot().cpu_count >= 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn procfs_fields_parse() {
        let raw = "VmPeak:\t  12345 kB\nVmRSS:\t   2048 kB\n";
        assert_eq!(read_kb_field(raw, "VmRSS:"), Some(2048.0));
        assert_eq!(read_kb_field(raw, "MemAvailable:"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_memory_is_positive() {
        let mb = process_memory_mb().expect("procfs should be readable on linux");
        assert!(mb > 0.0);
    }
}
