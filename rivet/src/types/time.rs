use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{Error, Result};

pub(crate) const MILLIS_PER_DAY: i64 = 86_400_000;

pub(crate) const EPOCH_DATE: Date = match Date::from_calendar_date(1970, Month::January, 1) {
    Ok(ok) => ok,
    Err(_) => panic!("unix epoch is a valid date"),
};

fn component_range(err: time::error::ComponentRange) -> Error {
    Error::value_illegal(err.to_string())
}

fn format_error(err: time::error::Format) -> Error {
    Error::value_illegal(err.to_string())
}

/// Instant from milliseconds since unix epoch plus nanoseconds within the millisecond.
pub(crate) fn from_epoch_millis(millis: i64, nanos: u32) -> Result<OffsetDateTime> {
    let total = millis as i128 * 1_000_000 + nanos as i128;
    OffsetDateTime::from_unix_timestamp_nanos(total).map_err(component_range)
}

/// Milliseconds since unix epoch and nanoseconds within the millisecond.
pub(crate) fn to_epoch_millis(value: OffsetDateTime) -> (i64, u32) {
    let nanos = value.unix_timestamp_nanos();
    (nanos.div_euclid(1_000_000) as i64, nanos.rem_euclid(1_000_000) as u32)
}

pub(crate) fn date_from_millis(millis: i64) -> Result<Date> {
    Ok(from_epoch_millis(millis, 0)?.date())
}

pub(crate) fn date_to_millis(date: Date) -> i64 {
    (date.to_julian_day() - EPOCH_DATE.to_julian_day()) as i64 * MILLIS_PER_DAY
}

/// Time of day, precision is milliseconds.
pub(crate) fn time_from_millis(millis: i64) -> Result<Time> {
    if !(0..MILLIS_PER_DAY).contains(&millis) {
        return Err(Error::value_illegal(format!("time of day out of range: {millis}ms")));
    }
    let secs = millis / 1000;
    Time::from_hms_milli(
        (secs / 3600) as u8,
        (secs / 60 % 60) as u8,
        (secs % 60) as u8,
        (millis % 1000) as u16,
    )
    .map_err(component_range)
}

pub(crate) fn time_to_millis(time: Time) -> i64 {
    let (h, m, s, milli) = time.as_hms_milli();
    ((h as i64 * 60 + m as i64) * 60 + s as i64) * 1000 + milli as i64
}

pub(crate) fn format_date(date: Date) -> Result<String> {
    date.format(DATE).map_err(format_error)
}

pub(crate) fn format_time(time: Time) -> Result<String> {
    time.format(TIME).map_err(format_error)
}

pub(crate) fn format_offset_time(time: Time, offset: UtcOffset) -> Result<String> {
    EPOCH_DATE
        .with_time(time)
        .assume_offset(offset)
        .format(OFFSET_TIME)
        .map_err(format_error)
}

pub(crate) fn format_timestamp(value: PrimitiveDateTime) -> Result<String> {
    value.format(TIMESTAMP).map_err(format_error)
}

pub(crate) fn format_offset_timestamp(value: OffsetDateTime) -> Result<String> {
    value.format(OFFSET_TIMESTAMP).map_err(format_error)
}

/// Parse text written by the format functions into an instant, text
/// without offset is assumed to be in `offset`.
pub(crate) fn parse_instant(text: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let text = text.trim();
    if let Ok(ok) = OffsetDateTime::parse(text, OFFSET_TIMESTAMP) {
        return Some(ok);
    }
    if let Ok(ok) = PrimitiveDateTime::parse(text, TIMESTAMP) {
        return Some(ok.assume_offset(offset));
    }
    if let Ok(ok) = Date::parse(text, DATE) {
        return Some(ok.midnight().assume_offset(offset));
    }
    if let Ok(ok) = OffsetDateTime::parse(&format!("1970-01-01 {text}"), OFFSET_TIMESTAMP) {
        return Some(ok);
    }
    if let Ok(ok) = Time::parse(text, TIME) {
        return Some(EPOCH_DATE.with_time(ok).assume_offset(offset));
    }
    None
}

const DATE: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

const TIME: &[BorrowedFormatItem<'_>] = format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]");

const OFFSET_TIME: &[BorrowedFormatItem<'_>] = format_description!(
    "[hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
);

const TIMESTAMP: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]");

const OFFSET_TIMESTAMP: &[BorrowedFormatItem<'_>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
);

#[cfg(test)]
mod test {
    use super::*;
    use time::macros::{date, datetime, offset, time};

    #[test]
    fn epoch_millis() {
        let (millis, nanos) = to_epoch_millis(datetime!(1969-12-31 23:59:59.999_000_001 UTC));
        assert_eq!((millis, nanos), (-1, 1));
        assert_eq!(from_epoch_millis(millis, nanos).unwrap(), datetime!(1969-12-31 23:59:59.999_000_001 UTC));

        assert_eq!(date_to_millis(date!(1970-01-02)), MILLIS_PER_DAY);
        assert_eq!(date_from_millis(-1).unwrap(), date!(1969-12-31));
    }

    #[test]
    fn time_of_day() {
        let t = time!(13:14:15.016);
        assert_eq!(time_from_millis(time_to_millis(t)).unwrap(), t);
        assert!(time_from_millis(MILLIS_PER_DAY).is_err());
    }

    #[test]
    fn format_parse() {
        assert_eq!(format_date(date!(0987-06-05)).unwrap(), "0987-06-05");
        assert_eq!(format_time(time!(01:02:03)).unwrap(), "01:02:03.0");
        assert_eq!(
            format_offset_time(time!(01:02:03.25), offset!(-5:30)).unwrap(),
            "01:02:03.25-05:30"
        );
        assert_eq!(parse_instant("01:02:03-05:30", UtcOffset::UTC).unwrap(), datetime!(1970-01-01 01:02:03 -5:30));
        assert_eq!(parse_instant("01:02:03", offset!(+2)).unwrap(), datetime!(1970-01-01 01:02:03 +2));

        let ts = datetime!(2024-02-29 08:09:10.5 +07:00);
        let text = format_offset_timestamp(ts).unwrap();
        assert_eq!(text, "2024-02-29 08:09:10.5+07:00");
        assert_eq!(parse_instant(&text, UtcOffset::UTC).unwrap(), ts);

        assert_eq!(
            parse_instant("2024-02-29", offset!(+1)).unwrap(),
            datetime!(2024-02-29 00:00 +1)
        );
        assert_eq!(
            parse_instant("2024-02-29 01:02:03", UtcOffset::UTC).unwrap(),
            datetime!(2024-02-29 01:02:03 UTC)
        );
    }
}
