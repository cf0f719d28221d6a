//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Shared primitives and utilities for the NCM runtime."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use chrono::{DateTime, Local, Offset, Utc};

/// Snapshot dates are stored as non-negative epoch seconds.
pub fn epoch_seconds() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// System-assigned baseline name: `Baseline_<yyyyMMddHHmmss>_UTC<offset>`,
/// e.g. `Baseline_20250602085419_UTC+8`.
pub fn system_assigned_baseline_name() -> String {
    assigned_baseline_name_at(Local::now())
}

fn assigned_baseline_name_at<Tz: chrono::TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let offset_hours = now.offset().fix().local_minus_utc() / 3600;
    let sign = if offset_hours >= 0 { "+" } else { "" };
    format!(
        "Baseline_{}_UTC{}{}",
        now.format("%Y%m%d%H%M%S"),
        sign,
        offset_hours
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn assigned_name_embeds_timestamp_and_offset() {
        let name = system_assigned_baseline_name();
        assert!(name.starts_with("Baseline_"));
        assert!(name.contains("_UTC"));
        // Baseline_ + 14 digit timestamp + _UTC + signed offset
        let digits: String = name
            .trim_start_matches("Baseline_")
            .chars()
            .take(14)
            .collect();
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn positive_offset_renders_with_plus_sign() {
        let fixed = chrono::FixedOffset::east_opt(8 * 3600).unwrap();
        let when = fixed.with_ymd_and_hms(2025, 6, 2, 8, 54, 19).unwrap();
        assert_eq!(
            assigned_baseline_name_at(when),
            "Baseline_20250602085419_UTC+8"
        );
    }

    #[test]
    fn negative_offset_keeps_its_sign() {
        let fixed = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let when = fixed.with_ymd_and_hms(2025, 6, 2, 8, 54, 19).unwrap();
        assert_eq!(
            assigned_baseline_name_at(when),
            "Baseline_20250602085419_UTC-5"
        );
    }
}
