//! Same-day adherence snapshot.

/// Share of today's events without an anomaly, floored to whole percent.
///
/// `today_codes` are the anomaly codes already recorded today; `new_code` is
/// the reading being recorded. Returns a 0.0 - 1.0 fraction.
pub fn daily_adherence(today_codes: &[i64], new_code: i64) -> f64 {
    let total = today_codes.len() + 1;
    let bad = today_codes.iter().filter(|&&code| code != 0).count() + usize::from(new_code != 0);
    let percent = (100 * (total - bad)) / total;
    percent as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_event_of_day() {
        assert_eq!(daily_adherence(&[], 0), 1.0);
        assert_eq!(daily_adherence(&[], 3), 0.0);
    }

    #[test]
    fn test_floors_to_whole_percent() {
        assert_eq!(daily_adherence(&[0, 2], 0), 0.66);
        assert_eq!(daily_adherence(&[1, 0], 3), 0.33);
        assert_eq!(daily_adherence(&[0, 0, 0, 0], 1), 0.8);
    }
}
