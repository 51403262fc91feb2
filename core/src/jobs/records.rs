//! Parsed rows of the batched remote queries.

use crate::jobs::status::{effective_status, parse_exit_code, JobStatus};


fn num<T: std::str::FromStr + Default>(s: &str) -> T {
    s.trim().parse().unwrap_or_default()
}


/// One row of the list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRecord {
    pub id: String,
    pub exit_code: Option<i32>,
    pub raw_status: String,
    pub command: String,
    pub start: u64,
    pub end: u64,
    pub duration: i64,
    pub remote_now: u64,
    pub has_errors: bool,
    /// `None` when liveness was not checked.
    pub pid_alive: Option<bool>,
}

impl ListRecord {
    /// Rows with fewer than nine fields are dropped.
    pub fn parse(line: &str) -> Option<ListRecord> {
        let f: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('|').collect();
        if f.len() < 9 || f[0].trim().is_empty() {
            return None;
        }
        let pid_alive = match f.get(9).map(|s| s.trim()) {
            Some("1") => Some(true),
            Some("0") => Some(false),
            _ => None,
        };
        Some(ListRecord {
            id: f[0].trim().to_string(),
            exit_code: parse_exit_code(f[1]),
            raw_status: f[2].trim().to_string(),
            command: f[3].trim().to_string(),
            start: num(f[4]),
            end: num(f[5]),
            duration: num(f[6]),
            remote_now: num(f[7]),
            has_errors: f[8].trim() == "1",
            pid_alive,
        })
    }

    pub fn status(&self) -> JobStatus {
        effective_status(&self.raw_status, self.exit_code, self.pid_alive)
    }
}

pub fn parse_list(output: &str) -> Vec<ListRecord> {
    output.lines().filter_map(ListRecord::parse).collect()
}


/// One row of the stats query.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRecord {
    pub id: String,
    pub exit_code: Option<i32>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub metric: Option<f64>,
}

impl StatsRecord {
    pub fn parse(line: &str) -> Option<StatsRecord> {
        let f: Vec<&str> = line.trim().split('|').collect();
        if f.len() < 5 || f[0].is_empty() {
            return None;
        }
        Some(StatsRecord {
            id: f[0].to_string(),
            exit_code: parse_exit_code(f[1]),
            start: f[2].trim().parse().ok(),
            end: f[3].trim().parse().ok(),
            metric: parse_metric_match(f[4]),
        })
    }

    /// `end - start` when both are recorded.
    pub fn duration(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some(e as i64 - s as i64),
            _ => None,
        }
    }
}

/// Number after the last `:` of a `Name: 1,234.5` grep match.
fn parse_metric_match(s: &str) -> Option<f64> {
    let value = s.rsplit(':').next()?.trim();
    if value.is_empty() || value == "-" {
        return None;
    }
    value.replace(',', "").trim_end_matches('.').parse().ok()
}

pub fn parse_stats(output: &str) -> Vec<StatsRecord> {
    output.lines().filter_map(StatsRecord::parse).collect()
}


/// Result of probing one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub size: u64,
    pub exit_code: Option<i32>,
    pub start: u64,
    pub end: u64,
    pub remote_now: u64,
    pub raw_status: String,
}

impl Probe {
    pub fn parse(output: &str) -> Option<Probe> {
        let line = output.lines().rev().find(|l| l.contains('|'))?;
        let f: Vec<&str> = line.trim().split('|').collect();
        if f.len() < 6 {
            return None;
        }
        Some(Probe {
            size: num(f[0]),
            exit_code: parse_exit_code(f[1]),
            start: num(f[2]),
            end: num(f[3]),
            remote_now: num(f[4]),
            raw_status: f[5].trim().to_string(),
        })
    }

    /// Terminal iff an exit code was recorded.
    pub fn is_terminal(&self) -> bool {
        self.exit_code.is_some()
    }

    pub fn status(&self) -> JobStatus {
        effective_status(&self.raw_status, self.exit_code, None)
    }

    /// Seconds run so far, or in total once ended.
    pub fn elapsed(&self) -> i64 {
        match (self.start, self.end) {
            (0, _) => 0,
            (s, 0) => self.remote_now as i64 - s as i64,
            (s, e) => e as i64 - s as i64,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_record_with_exit_overrides_status() {
        let r = ListRecord::parse("job_1|0|running|python a.py|100|160|60|200|-|-").unwrap();
        assert_eq!(r.status(), JobStatus::Completed);
        let r = ListRecord::parse("job_1|2|completed|python a.py|100|160|60|200|1|-").unwrap();
        assert_eq!(r.status(), JobStatus::Failed);
        assert!(r.has_errors);
    }

    #[test]
    fn list_record_without_exit() {
        let r = ListRecord::parse("job_1|-|running|python a.py|100|0|100|200|-|1").unwrap();
        assert_eq!(r.exit_code, None);
        assert_eq!(r.status(), JobStatus::Running);
        let r = ListRecord::parse("job_1|-|running|python a.py|100|0|100|200|-|0").unwrap();
        assert_eq!(r.status(), JobStatus::Stale);
        let r = ListRecord::parse("job_1|-|killed|python a.py|100|0|100|200|-|0").unwrap();
        assert_eq!(r.status(), JobStatus::Killed);
    }

    #[test]
    fn nine_field_rows_are_accepted_shorter_dropped() {
        assert!(ListRecord::parse("job_1|-|running|cmd|1|0|5|6|-").is_some());
        assert!(ListRecord::parse("job_1|-|running|cmd|1|0|5|6").is_none());
        assert!(parse_list("garbage\n\njob_1|-|running|cmd|1|0|5|6|-|-\n").len() == 1);
    }

    #[test]
    fn stats_record_parses_metric_match() {
        let r = StatsRecord::parse("job_1|0|100|160|Selection bias: 2.941").unwrap();
        assert_eq!(r.metric, Some(2.941));
        assert_eq!(r.duration(), Some(60));
        let r = StatsRecord::parse("job_2|-|100|-|-").unwrap();
        assert_eq!(r.metric, None);
        assert_eq!(r.duration(), None);
        assert_eq!(parse_metric_match("K: 1,024"), Some(1024.0));
    }

    #[test]
    fn probe_parse_and_elapsed() {
        let p = Probe::parse("1234|-|100|0|190|running\n").unwrap();
        assert!(!p.is_terminal());
        assert_eq!(p.elapsed(), 90);
        assert_eq!(p.status(), JobStatus::Running);
        let p = Probe::parse("10|1|100|150|190|completed").unwrap();
        assert_eq!(p.status(), JobStatus::Failed);
        assert_eq!(p.elapsed(), 50);
        assert!(Probe::parse("nope").is_none());
    }
}
