use std::time::Duration;

/// Formats an elapsed duration as "2h 13m 4s", dropping leading zero units.
pub fn pretty_time(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(pretty_time(Duration::from_secs(42)), "42s");
        assert_eq!(pretty_time(Duration::from_secs(62)), "1m 2s");
        assert_eq!(pretty_time(Duration::from_secs(3 * 3600 + 61)), "3h 1m 1s");
    }
}
