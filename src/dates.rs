use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Every calendar day from `start` to `end`, both inclusive. `end` defaults to `start`.
pub fn date_interval(start: NaiveDate, end: Option<NaiveDate>) -> Vec<NaiveDate> {
    let end = end.unwrap_or(start);
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        day += Duration::days(1);
    }
    days
}

/// Kick-off converted into `zone`.
///
/// A unix timestamp wins. Otherwise the site's `dd.mm.yyyy.` date plus `HH:MM` time are read
/// as UTC.
pub fn kickoff_in_zone(
    start_timestamp: Option<i64>,
    formatted_date: Option<&str>,
    start_time: Option<&str>,
    zone: Tz,
) -> Option<DateTime<FixedOffset>> {
    let utc = match start_timestamp {
        Some(ts) => DateTime::<Utc>::from_timestamp(ts, 0)?,
        None => {
            let date = parse_dotted_date(formatted_date?)?;
            let time = start_time
                .and_then(|raw| NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok())
                .unwrap_or(NaiveTime::MIN);
            Utc.from_utc_datetime(&NaiveDateTime::new(date, time))
        }
    };
    Some(utc.with_timezone(&zone).fixed_offset())
}

/// Calendar day of the match as the site lists it.
///
/// The `dd.mm.yyyy.` date wins. Otherwise the UTC date of the timestamp, so a late kick-off
/// keeps the day the results feed files it under.
pub fn match_day(start_timestamp: Option<i64>, formatted_date: Option<&str>) -> Option<NaiveDate> {
    formatted_date
        .and_then(parse_dotted_date)
        .or_else(|| Some(DateTime::<Utc>::from_timestamp(start_timestamp?, 0)?.date_naive()))
}

fn parse_dotted_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim().trim_end_matches('.');
    NaiveDate::parse_from_str(trimmed, "%d.%m.%Y").ok()
}

/// Lenient calendar-date parser for the formats seen on profile pages and feeds.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw
        .trim()
        .replace("Sept.", "Sep.")
        .replace("June", "Jun")
        .replace("July", "Jul");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    // ISO timestamps keep only their date part.
    let head = cleaned.split('T').next().unwrap_or(cleaned);
    if let Ok(date) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(date) = parse_slashed_date(cleaned) {
        return Some(date);
    }
    if let Some(date) = parse_dotted_date(cleaned) {
        return Some(date);
    }

    const WORDY_FORMATS: &[&str] = &["%b. %d, %Y", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"];
    WORDY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
}

/// `dd/mm/yyyy` or `dd/mm/yy`.
pub fn parse_slashed_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().split('/');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let year_raw = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }
    let year: i32 = year_raw.parse().ok()?;
    let year = match year_raw.len() {
        2 => 2000 + year,
        4 => year,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn interval_is_inclusive() {
        let days = date_interval(ymd(2019, 12, 30), Some(ymd(2020, 1, 2)));
        assert_eq!(days.len(), 4);
        assert_eq!(days.first(), Some(&ymd(2019, 12, 30)));
        assert_eq!(days.last(), Some(&ymd(2020, 1, 2)));
        assert_eq!(date_interval(ymd(2020, 1, 2), None), vec![ymd(2020, 1, 2)]);
        assert!(date_interval(ymd(2020, 1, 2), Some(ymd(2020, 1, 1))).is_empty());
    }

    #[test]
    fn formatted_kickoff_is_shifted_into_reference_zone() {
        let kickoff = kickoff_in_zone(None, Some("17.08.2019."), Some("14:00"), chrono_tz::Europe::Budapest)
            .expect("kickoff");
        assert_eq!(kickoff.to_rfc3339(), "2019-08-17T16:00:00+02:00");
    }

    #[test]
    fn late_kickoff_keeps_the_listed_day() {
        // 23:30 UTC, already the next day in Budapest.
        let ts = 1_565_479_800;
        assert_eq!(match_day(Some(ts), Some("10.08.2019.")), Some(ymd(2019, 8, 10)));
        assert_eq!(match_day(Some(ts), None), Some(ymd(2019, 8, 10)));
        assert_eq!(match_day(None, Some("garbage")), None);
        assert_eq!(match_day(None, None), None);
    }

    #[test]
    fn timestamp_wins_over_formatted_fields() {
        let kickoff = kickoff_in_zone(Some(1_566_050_400), Some("01.01.2000."), None, chrono_tz::UTC)
            .expect("kickoff");
        assert_eq!(kickoff.to_rfc3339(), "2019-08-17T14:00:00+00:00");
    }

    #[test]
    fn loose_dates_cover_profile_formats() {
        assert_eq!(parse_loose_date("Feb. 11, 1992"), Some(ymd(1992, 2, 11)));
        assert_eq!(parse_loose_date("Sept. 19, 2019"), Some(ymd(2019, 9, 19)));
        assert_eq!(parse_loose_date("July 4, 1990"), Some(ymd(1990, 7, 4)));
        assert_eq!(parse_loose_date("1985-08-09T00:00:00"), Some(ymd(1985, 8, 9)));
        assert_eq!(parse_loose_date("not a date"), None);
    }

    #[test]
    fn slashed_dates_accept_two_and_four_digit_years() {
        assert_eq!(parse_slashed_date("10/08/2019"), Some(ymd(2019, 8, 10)));
        assert_eq!(parse_slashed_date("10/08/19"), Some(ymd(2019, 8, 10)));
        assert_eq!(parse_slashed_date("10/08/019"), None);
    }
}
