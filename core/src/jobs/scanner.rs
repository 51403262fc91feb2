//! Pattern-based error detection and metric extraction over job output.
//!
//! Both tables are ordered: detection reports hits in table order within a
//! line, and extraction reports metrics in table order. Matching is case
//! insensitive. Everything here is a pure function of its input text.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::jobs::format::truncate_chars;


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Error,
    Warning,
}

/// (pattern, severity, description)
const ERROR_PATTERNS: &[(&str, Severity, &str)] = &[
    ("CUDA out of memory", Severity::Critical, "GPU memory exhausted"),
    ("torch.cuda.OutOfMemoryError", Severity::Critical, "PyTorch GPU OOM"),
    ("RuntimeError:", Severity::Error, "Runtime error"),
    (r"Traceback \(most recent call last\)", Severity::Error, "Python exception"),
    ("MemoryError", Severity::Critical, "System memory exhausted"),
    ("Killed", Severity::Critical, "Process killed (likely OOM)"),
    ("OOM", Severity::Critical, "Out of memory"),
    ("KeyboardInterrupt", Severity::Warning, "Interrupted by user"),
    ("ModuleNotFoundError", Severity::Error, "Missing Python module"),
    ("ImportError", Severity::Error, "Import failed"),
    ("FileNotFoundError", Severity::Error, "File not found"),
    ("PermissionError", Severity::Error, "Permission denied"),
    ("NCCL error", Severity::Critical, "Multi-GPU communication error"),
    ("cuDNN error", Severity::Error, "cuDNN library error"),
    ("AssertionError", Severity::Error, "Assertion failed"),
    ("ValueError", Severity::Warning, "Invalid value"),
    ("TypeError", Severity::Warning, "Type mismatch"),
    ("ZeroDivisionError", Severity::Error, "Division by zero"),
    ("Segmentation fault", Severity::Critical, "Segfault"),
    ("core dumped", Severity::Critical, "Process crashed"),
];

/// (name, pattern with one capture group, unit)
const METRIC_PATTERNS: &[(&str, &str, &str)] = &[
    ("Selection bias", r"Selection bias:\s*([\d.]+)%", "%"),
    ("Total runtime", r"Total runtime:\s*([\d.]+)s", "s"),
    ("K", r"K\s*=\s*([\d,]+)", ""),
    ("Phase 1", r"Phase 1.*?([\d.]+)s", "s"),
    ("Phase 2", r"Phase 2.*?([\d.]+)s", "s"),
    ("Phase 3", r"Phase 3.*?([\d.]+)s", "s"),
    ("Fused kernel", r"fused computation:\s*([\d.]+)s", "s"),
    ("GPU util", r"GPU:\s*(\d+)%\s*util", "%"),
    ("Memory", r"Memory.*?([\d.]+)\s*GB", " GB"),
    ("PC ω", r"PC composite ω\s*=\s*([\d.]+)", ""),
    ("CC ω", r"CC composite ω\s*=\s*([\d.]+)", ""),
];

const LINE_KEEP_CHARS: usize = 100;
const LINE_SHOW_CHARS: usize = 80;
const SHOWN_PER_GROUP: usize = 3;


fn compile(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

fn error_regexes() -> &'static [(Regex, Severity, &'static str, &'static str)] {
    static RE: OnceLock<Vec<(Regex, Severity, &'static str, &'static str)>> = OnceLock::new();
    RE.get_or_init(|| {
        ERROR_PATTERNS
            .iter()
            .filter_map(|(p, sev, desc)| compile(p).map(|re| (re, *sev, *p, *desc)))
            .collect()
    })
}

fn metric_regexes() -> &'static [(&'static str, Regex, &'static str)] {
    static RE: OnceLock<Vec<(&'static str, Regex, &'static str)>> = OnceLock::new();
    RE.get_or_init(|| {
        METRIC_PATTERNS
            .iter()
            .filter_map(|(name, p, unit)| compile(p).map(|re| (*name, re, *unit)))
            .collect()
    })
}


// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedError {
    pub pattern: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    /// Offending line, cut to 100 chars.
    pub line: String,
    /// 1-based.
    pub line_number: usize,
}

/// One entry per (line, pattern) hit, in line order then table order.
pub fn detect_errors(text: &str) -> Vec<DetectedError> {
    let mut found = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for (re, severity, pattern, description) in error_regexes() {
            if re.is_match(line) {
                found.push(DetectedError {
                    pattern,
                    severity: *severity,
                    description,
                    line: truncate_chars(line, LINE_KEEP_CHARS).to_string(),
                    line_number: idx + 1,
                });
            }
        }
    }
    found
}

/// Grouped summary; empty when nothing was detected.
pub fn format_errors(errors: &[DetectedError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let of = |sev: Severity| errors.iter().filter(move |e| e.severity == sev);
    let critical: Vec<&DetectedError> = of(Severity::Critical).collect();
    let error: Vec<&DetectedError> = of(Severity::Error).collect();
    let warnings = of(Severity::Warning).count();

    let mut out = format!("\u{26a0}\u{fe0f}  DETECTED ISSUES ({}):\n", errors.len());
    if !critical.is_empty() {
        out.push_str("  \u{1f534} CRITICAL:\n");
        for e in critical.iter().take(SHOWN_PER_GROUP) {
            out.push_str(&format!("     Line {}: {}\n", e.line_number, e.description));
            out.push_str(&format!("     \u{2192} {}\n", truncate_chars(&e.line, LINE_SHOW_CHARS)));
        }
        push_overflow(&mut out, critical.len());
    }
    if !error.is_empty() {
        out.push_str("  \u{1f7e0} ERRORS:\n");
        for e in error.iter().take(SHOWN_PER_GROUP) {
            out.push_str(&format!("     Line {}: {}\n", e.line_number, e.description));
        }
        push_overflow(&mut out, error.len());
    }
    if warnings > 0 {
        out.push_str(&format!("  \u{1f7e1} WARNINGS: {} issue(s)\n", warnings));
    }
    out.push('\n');
    out
}

fn push_overflow(out: &mut String, total: usize) {
    if total > SHOWN_PER_GROUP {
        out.push_str(&format!("     ... and {} more\n", total - SHOWN_PER_GROUP));
    }
}


// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub name: String,
    pub value: String,
    pub unit: String,
}

impl Metric {
    /// Numeric value, ignoring thousands separators.
    pub fn numeric(&self) -> Option<f64> {
        self.value.replace(',', "").parse().ok()
    }
}

/// First match of each table entry anywhere in `text`.
pub fn extract_metrics(text: &str) -> Vec<Metric> {
    metric_regexes()
        .iter()
        .filter_map(|(name, re, unit)| {
            let value = re.captures(text)?.get(1)?.as_str();
            Some(Metric {
                name: name.to_string(),
                value: value.to_string(),
                unit: unit.to_string(),
            })
        })
        .collect()
}

/// Headline metric, K and runtime get their own lines; phase timings share
/// one line; anything else is collected at the end.
pub fn format_metrics(metrics: &[Metric]) -> String {
    if metrics.is_empty() {
        return String::new();
    }
    let find = |name: &str| metrics.iter().find(|m| m.name == name);
    let mut out = String::from("\u{1f4ca} METRICS:\n");
    if let Some(m) = find("Selection bias") {
        out.push_str(&format!("   \u{2605} Selection bias: {}{}\n", m.value, m.unit));
    }
    if let Some(m) = find("K") {
        out.push_str(&format!("   K = {}\n", m.value));
    }
    if let Some(m) = find("Total runtime") {
        out.push_str(&format!("   Runtime: {}{}\n", m.value, m.unit));
    }
    let is_phase = |m: &&Metric| m.name.starts_with("Phase") || m.name == "Fused kernel";
    let phases: Vec<String> = metrics.iter().filter(is_phase).map(inline).collect();
    if !phases.is_empty() {
        out.push_str(&format!("   Phases: {}\n", phases.join(" | ")));
    }
    let rest: Vec<String> = metrics
        .iter()
        .filter(|m| !is_phase(m))
        .filter(|m| !matches!(m.name.as_str(), "Selection bias" | "K" | "Total runtime"))
        .map(inline)
        .collect();
    if !rest.is_empty() {
        out.push_str(&format!("   Other: {}\n", rest.join(" | ")));
    }
    out.push('\n');
    out
}

fn inline(m: &Metric) -> String {
    format!("{}: {}{}", m.name, m.value, m.unit)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_compile() {
        assert_eq!(error_regexes().len(), ERROR_PATTERNS.len());
        assert_eq!(metric_regexes().len(), METRIC_PATTERNS.len());
    }

    #[test]
    fn cuda_oom_on_line_five() {
        let text = "epoch 1\nepoch 2\nepoch 3\nloading batch\nCUDA out of memory. Tried to allocate 2.00 GiB\nbye\n";
        let errors = detect_errors(text);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Critical);
        assert_eq!(errors[0].line_number, 5);
        assert_eq!(errors[0].description, "GPU memory exhausted");
        assert_eq!(detect_errors(text), errors);
    }

    #[test]
    fn detection_is_case_insensitive_and_one_per_pattern_per_line() {
        let errors = detect_errors("valueerror here, ValueError there\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Warning);
    }

    #[test]
    fn multiple_patterns_on_one_line_in_table_order() {
        let errors = detect_errors("RuntimeError: CUDA out of memory");
        let patterns: Vec<&str> = errors.iter().map(|e| e.pattern).collect();
        assert_eq!(patterns, vec!["CUDA out of memory", "RuntimeError:"]);
    }

    #[test]
    fn long_lines_are_cut() {
        let line = format!("Segmentation fault {}", "x".repeat(200));
        let errors = detect_errors(&line);
        assert_eq!(errors[0].line.chars().count(), 100);
    }

    #[test]
    fn format_caps_groups_at_three() {
        let text = "Killed\nKilled\nKilled\nKilled\nImportError\nKeyboardInterrupt\n";
        let out = format_errors(&detect_errors(text));
        assert!(out.starts_with("\u{26a0}\u{fe0f}  DETECTED ISSUES (6):\n"));
        assert_eq!(out.matches("Process killed (likely OOM)").count(), 3);
        assert!(out.contains("     ... and 1 more\n"));
        assert!(out.contains("  \u{1f7e0} ERRORS:\n     Line 5: Import failed\n"));
        assert!(out.contains("WARNINGS: 1 issue(s)"));
    }

    #[test]
    fn format_empty_is_empty() {
        assert_eq!(format_errors(&[]), "");
        assert_eq!(format_metrics(&[]), "");
    }

    #[test]
    fn extracts_bias_and_runtime() {
        let text = "starting\nSelection bias: 2.941%\nlots of noise here\nTotal runtime: 12.5s\ndone";
        let metrics = extract_metrics(text);
        assert_eq!(
            metrics,
            vec![
                Metric { name: "Selection bias".into(), value: "2.941".into(), unit: "%".into() },
                Metric { name: "Total runtime".into(), value: "12.5".into(), unit: "s".into() },
            ]
        );
    }

    #[test]
    fn first_match_wins() {
        let m = extract_metrics("Selection bias: 1.0%\nSelection bias: 2.0%");
        assert_eq!(m[0].value, "1.0");
    }

    #[test]
    fn numeric_strips_commas() {
        let m = extract_metrics("K = 1,000,000\n");
        assert_eq!(m[0].name, "K");
        assert_eq!(m[0].numeric(), Some(1_000_000.0));
    }

    #[test]
    fn format_groups_phases() {
        let text = "Selection bias: 2.5%\nK = 100\nTotal runtime: 9.0s\nPhase 1 sieve: 1.5s\nPhase 2 scan: 3.0s\nfused computation: 0.7s\nPC composite ω = 0.66";
        let out = format_metrics(&extract_metrics(text));
        assert!(out.contains("   \u{2605} Selection bias: 2.5%\n"));
        assert!(out.contains("   K = 100\n"));
        assert!(out.contains("   Runtime: 9.0s\n"));
        assert!(out.contains("   Phases: Phase 1: 1.5s | Phase 2: 3.0s | Fused kernel: 0.7s\n"));
        assert!(out.contains("   Other: PC ω: 0.66\n"));
    }
}
