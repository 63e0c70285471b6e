use crate::models::MachineStatus;

/// Format a unit count with thousands separators.
///
/// # Examples
///
/// ```
/// use board_core::formatting::format_units;
///
/// assert_eq!(format_units(0), "0");
/// assert_eq!(format_units(1234), "1,234");
/// assert_eq!(format_units(1_234_567), "1,234,567");
/// ```
pub fn format_units(units: u64) -> String {
    group_thousands(&units.to_string())
}

/// Format an OEE value as a percentage with one decimal place.
///
/// Non-finite inputs render as `"--"`.
///
/// # Examples
///
/// ```
/// use board_core::formatting::format_oee;
///
/// assert_eq!(format_oee(80.0), "80.0%");
/// assert_eq!(format_oee(66.666), "66.7%");
/// assert_eq!(format_oee(f64::NAN), "--");
/// ```
pub fn format_oee(oee: f64) -> String {
    if !oee.is_finite() {
        return "--".to_string();
    }
    format!("{:.1}%", oee)
}

/// Operator-facing label for a status.
pub fn status_label(status: MachineStatus) -> &'static str {
    match status {
        MachineStatus::Running => "Running",
        MachineStatus::Stoppage => "Stoppage",
        MachineStatus::StoppedYetProducing => "Stopped (producing)",
        MachineStatus::Inactive => "Inactive",
    }
}

/// Truncate `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let lead = s.len() % 3;
    for (i, c) in s.chars().enumerate() {
        if i != 0 && i % 3 == lead {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units_small() {
        assert_eq!(format_units(5), "5");
        assert_eq!(format_units(999), "999");
    }

    #[test]
    fn test_format_units_grouping() {
        assert_eq!(format_units(1_000), "1,000");
        assert_eq!(format_units(12_345), "12,345");
        assert_eq!(format_units(123_456_789), "123,456,789");
    }

    #[test]
    fn test_format_oee() {
        assert_eq!(format_oee(0.0), "0.0%");
        assert_eq!(format_oee(100.0), "100.0%");
        assert_eq!(format_oee(f64::INFINITY), "--");
    }

    #[test]
    fn test_status_labels_are_distinct() {
        let labels = [
            status_label(MachineStatus::Running),
            status_label(MachineStatus::Stoppage),
            status_label(MachineStatus::StoppedYetProducing),
            status_label(MachineStatus::Inactive),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Press", 10), "Press");
        assert_eq!(truncate("Hydraulic press 12", 8), "Hydraul…");
        assert_eq!(truncate("abc", 0), "");
    }
}
