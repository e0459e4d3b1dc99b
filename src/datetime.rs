use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

/// The device's current UTC offset. Day boundaries are computed in this offset,
/// never at UTC midnight.
pub fn device_offset() -> FixedOffset {
    *Local::now().offset()
}

/// Calendar day of `ts_ms` in the given local offset.
pub fn local_day(offset: FixedOffset, ts_ms: i64) -> NaiveDate {
    let utc = DateTime::<Utc>::from_timestamp_millis(ts_ms).unwrap_or(DateTime::<Utc>::MIN_UTC);
    utc.with_timezone(&offset).date_naive()
}

pub fn local_today(offset: FixedOffset) -> NaiveDate {
    local_day(offset, now_ms())
}

/// Inclusive `[00:00:00.000, 23:59:59.999]` bounds of a local calendar day,
/// as epoch milliseconds. Conversion to absolute time happens here and only
/// here; everything above this works in calendar days.
pub fn day_bounds_ms(offset: FixedOffset, day: NaiveDate) -> (i64, i64) {
    let start = offset
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0);
    (start, start + DAY_MS - 1)
}

/// Stable `YYYY-MM-DD` key for a calendar day.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_east(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).expect("offset")
    }

    #[test]
    fn day_bounds_cover_exactly_one_local_day() {
        let offset = offset_east(2);
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).expect("date");
        let (start, end) = day_bounds_ms(offset, day);

        assert_eq!(end - start, DAY_MS - 1);
        assert_eq!(local_day(offset, start), day);
        assert_eq!(local_day(offset, end), day);
        assert_ne!(local_day(offset, start - 1), day);
        assert_ne!(local_day(offset, end + 1), day);
    }

    #[test]
    fn calendar_day_uses_local_offset_not_utc() {
        // 2024-03-10T23:30 UTC is already 2024-03-11 in UTC+5.
        let ts = Utc
            .with_ymd_and_hms(2024, 3, 10, 23, 30, 0)
            .single()
            .expect("ts")
            .timestamp_millis();

        assert_eq!(
            local_day(offset_east(5), ts),
            NaiveDate::from_ymd_opt(2024, 3, 11).expect("date")
        );
        assert_eq!(
            local_day(offset_east(0), ts),
            NaiveDate::from_ymd_opt(2024, 3, 10).expect("date")
        );
    }

    #[test]
    fn negative_offset_maps_to_the_previous_day() {
        let offset = FixedOffset::west_opt(7 * 3600).expect("offset");
        // 2024-06-01T03:00 UTC and 2024-06-01T05:00 UTC are both 2024-05-31 in UTC-7.
        let a = Utc
            .with_ymd_and_hms(2024, 6, 1, 3, 0, 0)
            .single()
            .expect("ts")
            .timestamp_millis();
        let b = Utc
            .with_ymd_and_hms(2024, 6, 1, 5, 0, 0)
            .single()
            .expect("ts")
            .timestamp_millis();

        assert_eq!(local_day(offset, a), local_day(offset, b));
        assert_eq!(
            local_day(offset, a),
            NaiveDate::from_ymd_opt(2024, 5, 31).expect("date")
        );
    }

    #[test]
    fn day_key_is_iso_formatted() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).expect("date");
        assert_eq!(day_key(day), "2024-01-05");
    }
}
