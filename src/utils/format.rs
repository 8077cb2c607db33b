use chrono::NaiveTime;

/// Format a duration in seconds to "Xh Ym" or "Ym" string
pub fn format_duration_secs(secs: i64) -> String {
    if secs <= 0 {
        return "now".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Format a NaiveTime to "HH:MM"
pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration_secs(0), "now");
        assert_eq!(format_duration_secs(-5), "now");
        assert_eq!(format_duration_secs(59), "0m");
        assert_eq!(format_duration_secs(60), "1m");
        assert_eq!(format_duration_secs(3660), "1h 1m");
    }

    #[test]
    fn times_render_as_hh_mm() {
        assert_eq!(
            format_time(NaiveTime::from_hms_opt(4, 5, 0).unwrap()),
            "04:05"
        );
    }
}
