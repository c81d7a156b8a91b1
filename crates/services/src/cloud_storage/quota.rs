const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

/// Renders a byte count for display. Counts below 1 KB are shown as the bare
/// number; larger ones are scaled to the biggest binary unit with one decimal.
pub fn format_quota(bytes: u64) -> String {
    if bytes < 1024 {
        return bytes.to_string();
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// `"{used} of {total}"`, both rendered with [`format_quota`].
pub fn quota_summary(used: u64, total: u64) -> String {
    format!("{} of {}", format_quota(used), format_quota(total))
}
