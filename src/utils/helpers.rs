/// Formatting helpers shared by the fetcher and the table renderer

use regex::Regex;
use std::sync::OnceLock;

use crate::core::error::MetricsError;
use crate::utils::{BAR_EMPTY, BAR_FILLED, BYTES_PER_GB};

/// Percentage of `used` over `total`, formatted with exactly two decimals
///
/// A zero total (or any other input producing a non-finite ratio) is an error
/// rather than a rendered "NaN"/"inf".
pub fn percentage(used: f64, total: f64) -> Result<String, MetricsError> {
    if total == 0.0 {
        return Err(MetricsError::NonFinite { used, total });
    }

    let ratio = (used / total) * 100.0;
    if !ratio.is_finite() {
        return Err(MetricsError::NonFinite { used, total });
    }

    Ok(format!("{:.2}", round_half_up(ratio)))
}

/// Bytes to gigabytes (2^30), two decimals
pub fn bytes_to_gb(bytes: f64) -> String {
    format!("{:.2}", round_half_up(bytes / BYTES_PER_GB))
}

/// Two-decimal rounding with ties away from zero; `{:.2}` alone rounds ties to even
fn round_half_up(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// "{pct}% ({used}GB/{total}GB)" for memory and filesystem cells
pub fn describe_capacity(used: f64, total: f64) -> Result<String, MetricsError> {
    let pct = percentage(used, total)?;
    Ok(format!("{}% ({}GB/{}GB)", pct, bytes_to_gb(used), bytes_to_gb(total)))
}

/// Extract the leading "NN.NN%" value from an already formatted cell
pub fn parse_percentage(text: &str) -> Option<f64> {
    static PERCENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = PERCENT_RE.get_or_init(|| Regex::new(r"(\d+\.\d+)%").expect("static regex"));

    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Fixed-width bar with round(pct / 100 * width) filled glyphs
pub fn progress_bar(pct: f64, width: usize) -> String {
    let filled = ((pct / 100.0) * width as f64).round().clamp(0.0, width as f64) as usize;
    format!(
        "{}{}",
        BAR_FILLED.to_string().repeat(filled),
        BAR_EMPTY.to_string().repeat(width - filled)
    )
}

/// Mask a sensitive value for display, keeping a few characters on each end
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_chars * 2 {
        "*".repeat(chars.len())
    } else {
        let start: String = chars[..visible_chars].iter().collect();
        let end: String = chars[chars.len() - visible_chars..].iter().collect();
        format!("{}...{}", start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::BAR_WIDTH;

    fn filled(bar: &str) -> usize {
        bar.chars().filter(|c| *c == BAR_FILLED).count()
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(30.0, 100.0).unwrap(), "30.00");
        assert_eq!(percentage(1.0, 3.0).unwrap(), "33.33");
        assert_eq!(percentage(2.0, 3.0).unwrap(), "66.67");
        assert_eq!(percentage(0.0, 5.0).unwrap(), "0.00");
        assert_eq!(percentage(5.0, 5.0).unwrap(), "100.00");
    }

    #[test]
    fn test_percentage_rounds_ties_up() {
        // 12.125 and 0.125 are exact binary ties
        assert_eq!(percentage(97.0, 800.0).unwrap(), "12.13");
        assert_eq!(percentage(1.0, 800.0).unwrap(), "0.13");
        assert_eq!(bytes_to_gb(0.125 * BYTES_PER_GB), "0.13");
    }

    #[test]
    fn test_percentage_zero_total() {
        assert!(matches!(
            percentage(0.0, 0.0),
            Err(MetricsError::NonFinite { .. })
        ));
        assert!(percentage(10.0, 0.0).is_err());
        assert!(percentage(f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_describe_capacity() {
        let total = 100.0 * BYTES_PER_GB;
        let used = 60.0 * BYTES_PER_GB;
        assert_eq!(
            describe_capacity(used, total).unwrap(),
            "60.00% (60.00GB/100.00GB)"
        );
    }

    #[test]
    fn test_bytes_to_gb() {
        assert_eq!(bytes_to_gb(BYTES_PER_GB), "1.00");
        assert_eq!(bytes_to_gb(512.0 * 1024.0 * 1024.0), "0.50");
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("30.00%"), Some(30.0));
        assert_eq!(parse_percentage("45.12% (1.80GB/3.99GB)"), Some(45.12));
        assert_eq!(parse_percentage("N/A"), None);
        assert_eq!(parse_percentage(""), None);
    }

    #[test]
    fn test_progress_bar_bounds() {
        let full = progress_bar(parse_percentage("100.00%").unwrap(), BAR_WIDTH);
        assert_eq!(filled(&full), 20);
        assert_eq!(full.chars().count(), 20);

        let empty = progress_bar(parse_percentage("0.00%").unwrap(), BAR_WIDTH);
        assert_eq!(filled(&empty), 0);
        assert_eq!(empty.chars().count(), 20);
    }

    #[test]
    fn test_progress_bar_rounding() {
        assert_eq!(filled(&progress_bar(30.0, BAR_WIDTH)), 6);
        assert_eq!(filled(&progress_bar(52.0, BAR_WIDTH)), 10);
        assert_eq!(filled(&progress_bar(150.0, BAR_WIDTH)), 20);
    }

    #[test]
    fn test_mask_sensitive() {
        let token = "dop_v1_5e7f294e4c92a9aa661fae8d347d832d";
        assert_eq!(mask_sensitive(token, 4), "dop_...832d");
        assert_eq!(mask_sensitive("short", 4), "*****");
    }
}
