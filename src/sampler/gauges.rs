use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, System};

/// Memory figures, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
}

impl MemoryUsage {
    /// Used memory as a percentage of the total memory.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }
}

/// Source of the host gauges.
pub trait GaugeSource: Send {
    /// CPU utilization since the previous call, in percent.
    fn cpu_percent(&mut self) -> f64;
    fn memory(&mut self) -> MemoryUsage;
}

pub struct SysinfoGauges {
    system: System,
}

impl SysinfoGauges {
    /// Blocks for `MINIMUM_CPU_UPDATE_INTERVAL` so the first CPU reading
    /// is already meaningful.
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a difference between two refreshes, prime the first one
        system.refresh_cpu_usage();
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        Self { system }
    }
}

impl Default for SysinfoGauges {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeSource for SysinfoGauges {
    fn cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        self.system.global_cpu_usage() as f64
    }

    fn memory(&mut self) -> MemoryUsage {
        self.system.refresh_memory();
        MemoryUsage {
            used: self.system.used_memory(),
            total: self.system.total_memory(),
        }
    }
}
