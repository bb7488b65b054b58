use jiff::{Timestamp, civil::Date};

use crate::error::{ExtractError, ExtractResult};

const MONTHS: [&str; 12] =
    ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];

/// Current calendar date in the named IANA timezone.
pub fn today_in(timezone: &str) -> Result<Date, jiff::Error> {
    Ok(Timestamp::now().in_tz(timezone)?.date())
}

/// Turns a day number and a three-letter month from a showtimes calendar into a
/// full date. The page never states the year: it is `today`'s year, or the next
/// one when the month lies before the current month.
///
/// A day earlier in the *current* month stays in the current year.
pub fn normalize_showtime(day: &str, month: &str, today: Date) -> ExtractResult<Date> {
    let month_num = parse_month(month).ok_or_else(|| ExtractError::InvalidValue {
        what: "showtime month",
        value: month.to_string(),
    })?;
    let day_num: i8 = day.trim().parse().map_err(|_| ExtractError::InvalidValue {
        what: "showtime day",
        value: day.to_string(),
    })?;

    let mut year = today.year();
    if month_num < today.month() {
        year += 1;
    }

    Date::new(year, month_num, day_num).map_err(|_| ExtractError::InvalidValue {
        what: "showtime date",
        value: format!("{year}-{month_num:02}-{day_num:02}"),
    })
}

fn parse_month(abbrev: &str) -> Option<i8> {
    let abbrev = abbrev.trim().to_lowercase();
    MONTHS.iter().position(|m| *m == abbrev).map(|idx| idx as i8 + 1)
}
