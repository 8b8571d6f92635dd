const UNITS: [&str; 8] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

/// Render a byte count with binary prefixes, e.g. `31.5 KiB`.
///
/// The sign is dropped: `-1` renders as `1.0 B`.
pub fn bytes_fmt(num: f64) -> String {
    let mut num = num.abs();
    for unit in UNITS {
        if num < 1024.0 {
            return format!("{:.1} {}B", num, unit);
        }
        num /= 1024.0;
    }
    format!("{:.1} YiB", num)
}
