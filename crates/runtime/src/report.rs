//! At-exit report for Slang runs
//!
//! Dumps scheduler KPIs when a host finishes, controlled by `SLANG_REPORT`:
//! - Unset → no report
//! - `1` → human-readable to stderr
//! - `json` → JSON to stderr
//! - `json:/path` → JSON to file
//!
//! ## Feature Flag
//!
//! JSON output requires the `report-json` feature (enabled by default).
//! Without it, JSON requests fall back to the human format.

use crate::scheduler::{self, SchedulerStats};
use std::io::Write;

// =============================================================================
// Report Configuration (parsed from SLANG_REPORT env var)
// =============================================================================

/// Output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    Stderr,
    File(String),
}

/// Parsed report configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub destination: ReportDestination,
}

impl ReportConfig {
    /// Parse from the SLANG_REPORT environment variable
    pub fn from_env() -> Option<Self> {
        let val = std::env::var("SLANG_REPORT").ok()?;
        Self::parse(&val)
    }

    pub fn parse(val: &str) -> Option<Self> {
        match val {
            "" | "0" => None,
            "1" => Some(ReportConfig {
                format: ReportFormat::Human,
                destination: ReportDestination::Stderr,
            }),
            "json" => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::Stderr,
            }),
            s if s.starts_with("json:") => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::File(s["json:".len()..].to_string()),
            }),
            _ => {
                tracing::warn!("SLANG_REPORT='{}' not recognized, ignoring", val);
                None
            }
        }
    }
}

// =============================================================================
// Report Data
// =============================================================================

/// Collected metrics for the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportData {
    pub wall_clock_ms: u64,
    pub stats: SchedulerStats,
}

pub fn collect_report_data() -> ReportData {
    ReportData {
        wall_clock_ms: scheduler::elapsed()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0),
        stats: scheduler::stats(),
    }
}

// =============================================================================
// Formatting
// =============================================================================

pub fn format_human(data: &ReportData) -> String {
    let s = &data.stats;
    let mut out = String::new();
    out.push_str("=== SLANG REPORT ===\n");
    out.push_str(&format!("Wall clock:      {} ms\n", data.wall_clock_ms));
    out.push_str(&format!("Turns executed:  {}\n", s.tasks_executed));
    out.push_str(&format!("Tasks scheduled: {}\n", s.tasks_scheduled));
    out.push_str(&format!("Timers fired:    {}\n", s.timers_fired));
    out.push_str(&format!("Dispatch depth:  {}\n", s.max_dispatch_depth));
    out.push_str(&format!("Procs spawned:   {}\n", s.processes_spawned));
    out.push_str(&format!("Procs done:      {}\n", s.processes_completed));
    out.push_str(&format!("Peak procs:      {}\n", s.peak_processes));
    out.push_str(&format!("Messages posted: {}\n", s.messages_posted));
    out.push_str(&format!("Messages recv:   {}\n", s.messages_received));
    out.push_str("====================\n");
    out
}

#[cfg(feature = "report-json")]
pub fn format_json(data: &ReportData) -> String {
    let s = &data.stats;
    let obj = serde_json::json!({
        "wall_clock_ms": data.wall_clock_ms,
        "turns_executed": s.tasks_executed,
        "tasks_scheduled": s.tasks_scheduled,
        "timers_fired": s.timers_fired,
        "max_dispatch_depth": s.max_dispatch_depth,
        "processes_spawned": s.processes_spawned,
        "processes_completed": s.processes_completed,
        "peak_processes": s.peak_processes,
        "messages_posted": s.messages_posted,
        "messages_received": s.messages_received,
    });
    serde_json::to_string(&obj).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(not(feature = "report-json"))]
pub fn format_json(data: &ReportData) -> String {
    tracing::warn!("SLANG_REPORT=json requires the 'report-json' feature; using human format");
    format_human(data)
}

// =============================================================================
// Emit
// =============================================================================

/// Write the report if `SLANG_REPORT` asks for one
pub fn emit_report() {
    if let Some(config) = ReportConfig::from_env() {
        emit(&config);
    }
}

pub fn emit(config: &ReportConfig) {
    let data = collect_report_data();
    let output = match config.format {
        ReportFormat::Human => format_human(&data),
        ReportFormat::Json => format_json(&data),
    };

    match &config.destination {
        ReportDestination::Stderr => {
            let _ = std::io::stderr().write_all(output.as_bytes());
        }
        ReportDestination::File(path) => {
            if let Err(e) = std::fs::write(path, output.as_bytes()) {
                tracing::warn!(path = %path, error = %e, "could not write report, using stderr");
                let _ = std::io::stderr().write_all(output.as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_variants() {
        assert_eq!(ReportConfig::parse("0"), None);
        assert_eq!(ReportConfig::parse(""), None);
        assert_eq!(ReportConfig::parse("bogus"), None);
        assert_eq!(
            ReportConfig::parse("1"),
            Some(ReportConfig {
                format: ReportFormat::Human,
                destination: ReportDestination::Stderr,
            })
        );
        assert_eq!(
            ReportConfig::parse("json:/tmp/report.json"),
            Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::File("/tmp/report.json".to_string()),
            })
        );
    }

    #[test]
    fn test_human_report_lists_counters() {
        let data = ReportData {
            wall_clock_ms: 12,
            stats: SchedulerStats {
                processes_spawned: 3,
                messages_posted: 7,
                ..Default::default()
            },
        };
        let text = format_human(&data);
        assert!(text.contains("Wall clock:      12 ms"));
        assert!(text.contains("Procs spawned:   3"));
        assert!(text.contains("Messages posted: 7"));
    }

    #[cfg(feature = "report-json")]
    #[test]
    fn test_json_report() {
        let data = ReportData {
            wall_clock_ms: 5,
            stats: SchedulerStats {
                max_dispatch_depth: 1,
                ..Default::default()
            },
        };
        let parsed: serde_json::Value = serde_json::from_str(&format_json(&data)).unwrap();
        assert_eq!(parsed["wall_clock_ms"], 5);
        assert_eq!(parsed["max_dispatch_depth"], 1);
    }
}
