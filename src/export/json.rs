// TraceCrab - GPL-3.0-or-later
// This file is part of TraceCrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// TraceCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// TraceCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with TraceCrab.  If not, see <https://www.gnu.org/licenses/>.

use crate::anomaly::{BurstInterval, RepeatingPattern};
use crate::core::hotspot::HotspotTable;
use crate::core::report::{AnalysisReport, Summary};
use crate::parser::ParseStats;
use serde::Serialize;

/// The report without its entries and time series.
#[derive(Debug, Serialize)]
pub struct Metrics<'a> {
    pub summary: &'a Summary,
    pub bursts: &'a [BurstInterval],
    pub repeating: &'a [RepeatingPattern],
    pub hotspots: &'a [HotspotTable],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_stats: Option<&'a ParseStats>,
}

impl<'a> From<&'a AnalysisReport> for Metrics<'a> {
    fn from(report: &'a AnalysisReport) -> Self {
        Self {
            summary: &report.summary,
            bursts: &report.bursts,
            repeating: &report.repeating,
            hotspots: &report.hotspots,
            parse_stats: report.parse_stats.as_ref(),
        }
    }
}

pub fn metrics_to_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Metrics::from(report))
}

/// The complete report, entries included.
pub fn report_to_json(report: &AnalysisReport) -> serde_json::Result<String> {
    profiling::scope!("report_to_json");
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analyzer::ErrorAnalyzer;
    use crate::AnalysisConfig;
    use serde_json::{json, Value};

    const SAMPLE: &str = "10-Jun-2025 08:26:46.310 심각 [t1] com.x.Y boom\nnested exception is java.lang.NullPointerException: oops\n\tat com.x.Y.run(Y.java:42)\n10-Jun-2025 08:27:00.000 정보 [t1] com.x.Y ok";

    fn report() -> AnalysisReport {
        ErrorAnalyzer::new(AnalysisConfig::default())
            .expect("default config is valid")
            .analyze_text(SAMPLE, "catalina.log")
    }

    #[test]
    fn test_metrics_shape() {
        let text = metrics_to_json(&report()).expect("serializes");
        let json: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(json["summary"]["total_entries"], json!(2));
        assert_eq!(json["summary"]["error_count"], json!(1));
        assert_eq!(
            json["summary"]["top_exceptions"][0]["key"],
            "java.lang.NullPointerException"
        );
        assert_eq!(json["parse_stats"]["entries"], json!(2));
        assert!(json.get("entries").is_none());
        assert!(json["bursts"].as_array().is_some_and(Vec::is_empty));
    }

    #[test]
    fn test_full_report_round_trips() {
        let report = report();
        let json = report_to_json(&report).expect("serializes");
        let back: AnalysisReport = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, report);
    }
}
