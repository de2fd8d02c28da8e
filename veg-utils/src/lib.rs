//! Shared utility functions for veg crates.

/// Timestamp utility functions
pub mod dates {
    use chrono::{DateTime, Utc};

    /// Current UTC time.
    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Milliseconds since the Unix epoch, used for generated ids and cache busting.
    pub fn epoch_millis(at: &DateTime<Utc>) -> i64 {
        at.timestamp_millis()
    }

}

/// Rounding helpers for reported statistics
pub mod numbers {
    /// Round to a fixed number of decimal places, the way reported
    /// averages and percentages are presented (e.g. 2 places).
    pub fn round_to(value: f64, places: u32) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let factor = 10f64.powi(places as i32);
        (value * factor).round() / factor
    }

    /// Arithmetic mean, 0 for an empty slice.
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

}

/// Identifier helpers
pub mod ids {
    use regex::Regex;
    use std::sync::LazyLock;

    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    /// Collapse every whitespace run into a single underscore,
    /// e.g. "Shorea  robusta" -> "Shorea_robusta".
    pub fn underscore_whitespace(s: &str) -> String {
        WHITESPACE_RE.replace_all(s, "_").into_owned()
    }

}
