//! GPU utilisation snapshot from `nvidia-smi`.

use std::fmt;

/// Host-side query; one CSV line per GPU, first GPU is used.
pub const GPU_QUERY: &str = "nvidia-smi --query-gpu=utilization.gpu,memory.used,memory.total,temperature.gpu --format=csv,noheader,nounits";

/// Assumed capacity when the driver does not report a total.
const DEFAULT_TOTAL_GB: f64 = 128.0;

/// Pre-flight warns above this utilisation or memory percentage.
pub const BUSY_THRESHOLD_PCT: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GpuSnapshot {
    pub util_pct: u32,
    pub mem_used_gb: f64,
    pub mem_total_gb: f64,
    pub temp_c: Option<u32>,
}

impl GpuSnapshot {
    /// Parse `util, used_mib, total_mib[, temp]`. Fields the driver reports
    /// as `[N/A]` fall back to zero (or the default total).
    pub fn parse(output: &str) -> Option<GpuSnapshot> {
        let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            return None;
        }
        let util_pct = parts[0].parse::<f64>().ok()?.round() as u32;
        let used_mib = parts[1].parse::<f64>().unwrap_or(0.0);
        let total_gb = parts[2]
            .parse::<f64>()
            .ok()
            .filter(|t| *t > 0.0)
            .map(|t| t / 1024.0)
            .unwrap_or(DEFAULT_TOTAL_GB);
        let temp_c = parts.get(3).and_then(|t| t.parse::<f64>().ok()).map(|t| t.round() as u32);
        Some(GpuSnapshot {
            util_pct,
            mem_used_gb: used_mib / 1024.0,
            mem_total_gb: total_gb,
            temp_c,
        })
    }

    pub fn mem_pct(&self) -> f64 {
        if self.mem_total_gb <= 0.0 {
            0.0
        } else {
            self.mem_used_gb / self.mem_total_gb * 100.0
        }
    }

    /// Advisory warnings for starting another job on this GPU.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.util_pct as f64 > BUSY_THRESHOLD_PCT {
            out.push(format!("GPU is {}% utilized", self.util_pct));
        }
        if self.mem_pct() > BUSY_THRESHOLD_PCT {
            out.push(format!(
                "GPU memory {:.0}% used ({:.1}/{:.0} GB)",
                self.mem_pct(),
                self.mem_used_gb,
                self.mem_total_gb
            ));
        }
        out
    }
}

impl fmt::Display for GpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GPU: {}% util | Memory: {:.1}/{:.0} GB",
            self.util_pct, self.mem_used_gb, self.mem_total_gb
        )?;
        if let Some(t) = self.temp_c {
            write!(f, " | {}°C", t)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_gpu() {
        let g = GpuSnapshot::parse("87, 65536, 131072, 71\n3, 0, 131072, 40\n").unwrap();
        assert_eq!(g.util_pct, 87);
        assert_eq!(g.mem_used_gb, 64.0);
        assert_eq!(g.mem_total_gb, 128.0);
        assert_eq!(g.temp_c, Some(71));
        assert_eq!(g.to_string(), "GPU: 87% util | Memory: 64.0/128 GB | 71°C");
    }

    #[test]
    fn missing_total_uses_default() {
        let g = GpuSnapshot::parse("10, 1024, [N/A]").unwrap();
        assert_eq!(g.mem_total_gb, DEFAULT_TOTAL_GB);
        assert_eq!(g.temp_c, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(GpuSnapshot::parse("").is_none());
        assert!(GpuSnapshot::parse("bash: nvidia-smi: command not found").is_none());
    }

    #[test]
    fn warnings_above_half() {
        let idle = GpuSnapshot::parse("10, 1024, 131072").unwrap();
        assert!(idle.warnings().is_empty());
        let busy = GpuSnapshot::parse("90, 100000, 131072").unwrap();
        let w = busy.warnings();
        assert_eq!(w.len(), 2);
        assert!(w[0].contains("90%"));
        assert!(w[1].starts_with("GPU memory 76% used"));
    }
}
