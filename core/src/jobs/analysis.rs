//! Cross-job views: metric comparison and aggregate statistics.

use std::collections::BTreeSet;

use crate::error::{JobError, Result};
use crate::infrastructure::runner::Remote;
use crate::jobs::format::format_duration;
use crate::jobs::ids::validate_job_id;
use crate::jobs::manager::JobManager;
use crate::jobs::records::{parse_stats, StatsRecord};
use crate::jobs::scanner::{extract_metrics, Metric};
use crate::jobs::script;

/// Metrics are expected near the end of a log.
pub const COMPARE_TAIL_LINES: usize = 100;
pub const DEFAULT_STATS_SAMPLE: usize = 20;

/// Differences smaller than this count as unchanged.
const EPSILON: f64 = 0.001;


// ---------------------------------------------------------------------------
// compare
// ---------------------------------------------------------------------------

/// Render the metric table for two jobs, plus a callout for `headline`
/// when both jobs report it.
pub fn compare_metrics(
    id_a: &str,
    a: &[Metric],
    id_b: &str,
    b: &[Metric],
    headline: &str,
) -> String {
    let mut text = format!("\u{1f4ca} Comparing {} vs {}\n\n", id_a, id_b);
    let names: BTreeSet<&str> = a.iter().chain(b.iter()).map(|m| m.name.as_str()).collect();
    if names.is_empty() {
        text.push_str("No metrics found in either job\n");
        return text;
    }
    fn find(set: &[Metric], name: &str) -> Option<Metric> {
        set.iter().find(|m| m.name == name).cloned()
    }

    text.push_str("Metric | Job 1 | Job 2 | \u{394} Change\n");
    text.push_str("-------|-------|-------|---------\n");
    for name in &names {
        let (ma, mb) = (find(a, name), find(b, name));
        let cell = |m: &Option<Metric>| match m {
            Some(m) => format!("{}{}", m.value, m.unit),
            None => "\u{2014}".to_string(),
        };
        let delta = match (&ma, &mb) {
            (Some(x), Some(y)) => match (x.numeric(), y.numeric()) {
                (Some(va), Some(vb)) => format_delta(va, vb, &x.unit),
                _ => String::new(),
            },
            _ => String::new(),
        };
        text.push_str(&format!("{} | {} | {} | {}\n", name, cell(&ma), cell(&mb), delta));
    }

    if let (Some(x), Some(y)) = (find(a, headline), find(b, headline)) {
        if let (Some(va), Some(vb)) = (x.numeric(), y.numeric()) {
            let diff = vb - va;
            text.push('\n');
            if diff.abs() < EPSILON {
                text.push_str(&format!("\u{27a1}\u{fe0f}  {} essentially unchanged\n", headline));
            } else if diff < 0.0 {
                text.push_str(&format!(
                    "\u{1f4c9} {} decreased by {:.3}{}\n",
                    headline,
                    -diff,
                    x.unit.trim()
                ));
            } else {
                text.push_str(&format!(
                    "\u{1f4c8} {} increased by {:.3}{}\n",
                    headline,
                    diff,
                    x.unit.trim()
                ));
            }
        }
    }
    text
}

/// `+0.50s (+12.5%)`, or `same`.
fn format_delta(a: f64, b: f64, unit: &str) -> String {
    let diff = b - a;
    if diff.abs() < EPSILON {
        return "same".into();
    }
    if a == 0.0 {
        format!("{:+.2}{}", diff, unit)
    } else {
        format!("{:+.2}{} ({:+.1}%)", diff, unit, diff / a * 100.0)
    }
}


// ---------------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    pub fn of(values: &[f64]) -> Option<Distribution> {
        if values.is_empty() {
            return None;
        }
        let sum: f64 = values.iter().sum();
        Some(Distribution {
            mean: sum / values.len() as f64,
            min: values.iter().cloned().fold(f64::INFINITY, f64::min),
            max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobStats {
    pub total: usize,
    /// Exit code exactly 0.
    pub succeeded: usize,
    /// Exit code present and non-zero.
    pub failed: usize,
    /// Over jobs with a positive duration.
    pub runtime: Option<Distribution>,
    /// Over jobs where the metric was found.
    pub metric: Option<Distribution>,
}

impl JobStats {
    pub fn from_records(records: &[StatsRecord]) -> JobStats {
        let runtimes: Vec<f64> = records
            .iter()
            .filter_map(|r| r.duration())
            .filter(|d| *d > 0)
            .map(|d| d as f64)
            .collect();
        let metrics: Vec<f64> = records.iter().filter_map(|r| r.metric).collect();
        JobStats {
            total: records.len(),
            succeeded: records.iter().filter(|r| r.exit_code == Some(0)).count(),
            failed: records
                .iter()
                .filter(|r| matches!(r.exit_code, Some(c) if c != 0))
                .count(),
            runtime: Distribution::of(&runtimes),
            metric: Distribution::of(&metrics),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }

    pub fn render(&self, metric_name: &str) -> String {
        let mut text = format!("\u{1f4c8} Job statistics (last {} jobs)\n", self.total);
        text.push_str(&format!(
            "   Succeeded: {} | Failed: {} | Other: {}\n",
            self.succeeded,
            self.failed,
            self.total - self.succeeded - self.failed
        ));
        if self.total == 0 {
            return text;
        }
        text.push_str(&format!("   Success rate: {:.1}%\n", self.success_rate()));
        if let Some(r) = &self.runtime {
            text.push_str(&format!(
                "   Runtime: avg {} | fastest {} | slowest {}\n",
                format_duration(r.mean.round() as i64),
                format_duration(r.min as i64),
                format_duration(r.max as i64)
            ));
        }
        if let Some(m) = &self.metric {
            text.push_str(&format!(
                "   {}: avg {:.4} | range {:.4} .. {:.4}\n",
                metric_name, m.mean, m.min, m.max
            ));
        }
        text
    }
}


impl<R: Remote> JobManager<R> {
    pub fn compare(&self, id_a: &str, id_b: &str, container: Option<&str>) -> Result<String> {
        validate_job_id(id_a)?;
        validate_job_id(id_b)?;
        let container = self.container_or(container);
        let fetch = |id: &str| {
            let out = self.run_in(
                &container,
                &script::tail_script(self.paths(), id, COMPARE_TAIL_LINES),
            );
            if out.success() {
                Ok(extract_metrics(&out.output))
            } else {
                Err(JobError::JobNotFound(id.to_string()))
            }
        };
        let a = fetch(id_a)?;
        let b = fetch(id_b)?;
        Ok(compare_metrics(id_a, &a, id_b, &b, &self.settings().headline_metric))
    }

    pub fn stats(&self, container: Option<&str>, sample: usize) -> Result<String> {
        let container = self.container_or(container);
        let sample = if sample == 0 { DEFAULT_STATS_SAMPLE } else { sample };
        let metric_name = &self.settings().headline_metric;
        let out = self.run_checked(
            &container,
            &script::stats_query(self.paths(), sample, metric_name),
        )?;
        Ok(JobStats::from_records(&parse_stats(&out)).render(metric_name))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::MockRunner;
    use crate::jobs::testutil::manager;

    #[test]
    fn headline_decrease() {
        let mock = MockRunner::new()
            .on("job_a.log", "Selection bias: 3.000%\nTotal runtime: 10.0s\n", 0)
            .on("job_b.log", "Selection bias: 2.500%\nTotal runtime: 12.5s\n", 0);
        let (mgr, _dir) = manager(mock);
        let out = mgr.compare("job_a", "job_b", None).unwrap();
        assert!(out.contains("Metric | Job 1 | Job 2 | \u{394} Change"));
        assert!(out.contains("Selection bias | 3.000% | 2.500% | -0.50% (-16.7%)"));
        assert!(out.contains("Total runtime | 10.0s | 12.5s | +2.50s (+25.0%)"));
        assert!(out.contains("Selection bias decreased by 0.500%"));
        assert_eq!(mgr.remote().commands_containing("tail -n 100").len(), 2);
    }

    #[test]
    fn one_sided_and_unchanged() {
        let a = extract_metrics("K = 100\nSelection bias: 1.0%");
        let b = extract_metrics("Selection bias: 1.0004%\nGPU: 50% util");
        let out = compare_metrics("x", &a, "y", &b, "Selection bias");
        assert!(out.contains("K | 100 | \u{2014} | \n"));
        assert!(out.contains("GPU util | \u{2014} | 50% | \n"));
        assert!(out.contains("Selection bias | 1.0% | 1.0004% | same"));
        assert!(out.contains("Selection bias essentially unchanged"));
    }

    #[test]
    fn compare_missing_job() {
        let (mgr, _dir) = manager(MockRunner::new().on("job_b.log", "tail: cannot open", 1));
        let err = mgr.compare("job_a", "job_b", None).unwrap_err();
        assert_eq!(err.to_string(), "Job not found: job_b");
    }

    #[test]
    fn compare_without_metrics() {
        let out = compare_metrics("x", &[], "y", &[], "Selection bias");
        assert!(out.ends_with("No metrics found in either job\n"));
    }

    #[test]
    fn stats_aggregate() {
        let rows = "job_4|-|400|-|-\n\
                    job_3|0|300|360|Selection bias: 2.0\n\
                    job_2|1|200|230|-\n\
                    job_1|0|100|190|Selection bias: 3.0\n";
        let stats = JobStats::from_records(&parse_stats(rows));
        assert_eq!(stats.total, 4);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success_rate(), 50.0);
        let r = stats.runtime.unwrap();
        assert_eq!((r.mean, r.min, r.max), (60.0, 30.0, 90.0));
        let m = stats.metric.unwrap();
        assert_eq!((m.mean, m.min, m.max), (2.5, 2.0, 3.0));

        let text = stats.render("Selection bias");
        assert!(text.contains("Succeeded: 2 | Failed: 1 | Other: 1"));
        assert!(text.contains("Success rate: 50.0%"));
        assert!(text.contains("Runtime: avg 1m 0s | fastest 30s | slowest 1m 30s"));
        assert!(text.contains("Selection bias: avg 2.5000 | range 2.0000 .. 3.0000"));
    }

    #[test]
    fn stats_empty_sample() {
        let stats = JobStats::from_records(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.runtime.is_none());
        let text = stats.render("Selection bias");
        assert!(!text.contains("Success rate"));
    }

    #[test]
    fn stats_through_manager() {
        let (mgr, _dir) = manager(MockRunner::new().on("metric=", "job_1|0|100|150|-\n", 0));
        let out = mgr.stats(None, 5).unwrap();
        assert!(out.contains("last 1 jobs"));
        assert!(mgr.remote().commands_containing("head -n 5").len() == 1);
    }
}
