//! Helpers for formatting epoch milliseconds.
use chrono::{DateTime, TimeZone, Utc};

pub fn epoch_ms_to_rfc3339_utc(ms: i64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).single().unwrap());
    dt.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_utc() {
        assert_eq!(
            epoch_ms_to_rfc3339_utc(1_724_328_000_000),
            "2024-08-22T12:00:00+00:00"
        );
    }
}
