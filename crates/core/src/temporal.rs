//! Deterministic date/time extraction for German free-text messages.
//!
//! Two styles show up in chat: full tokens like `25.01.2026 14:30` and the
//! short forms `26.1.` / `14 uhr` / `14-16`. Everything here is plain token
//! scanning, no regex, matching the rest of the intent parsing in this
//! workspace.

use chrono::{Datelike, Days, NaiveDate};

/// Minutes since midnight used when a message mentions a day but no time.
pub const DEFAULT_START_MINUTES: u16 = 12 * 60;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A calendar day plus minutes since midnight.
///
/// This is deliberately not a `DateTime`: calendar instants leave the
/// process as fixed-offset strings built by [`format_instant`], and keeping
/// the wall-clock fields separate makes it impossible to route them through
/// offset-aware date arithmetic on the way out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant {
    pub date: NaiveDate,
    pub minutes: u16,
}

impl Instant {
    pub fn new(date: NaiveDate, minutes: u16) -> Self {
        Self { date, minutes: minutes.min(MINUTES_PER_DAY as u16 - 1) }
    }

    pub fn hour(&self) -> u16 {
        self.minutes / 60
    }

    pub fn minute(&self) -> u16 {
        self.minutes % 60
    }

    /// `HH:MM` display form.
    pub fn hhmm(&self) -> String {
        format!("{:02}:{:02}", self.hour(), self.minute())
    }

    /// `DD.MM.YYYY` display form.
    pub fn display_date(&self) -> String {
        format!("{:02}.{:02}.{:04}", self.date.day(), self.date.month(), self.date.year())
    }
}

/// Composes the wall-clock timestamp the calendar API expects by zero-padded
/// field concatenation. The offset is appended verbatim from configuration.
///
/// Invariant: this is the only way an `Instant` becomes a timestamp string.
/// Building the same value through an offset-aware date-time object applies
/// the host offset on top and shifts the intended wall-clock time.
pub fn format_instant(instant: &Instant, utc_offset: &str) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:00{}",
        instant.date.year(),
        instant.date.month(),
        instant.date.day(),
        instant.hour(),
        instant.minute(),
        utc_offset
    )
}

/// Adds a duration in minutes, carrying whole days when the sum crosses
/// midnight. A 23:00 start plus six hours lands on the next day at 05:00.
pub fn add_duration(start: &Instant, duration_minutes: u32) -> Instant {
    let total = u32::from(start.minutes) + duration_minutes;
    let carry_days = u64::from(total / MINUTES_PER_DAY);
    let minutes = (total % MINUTES_PER_DAY) as u16;
    let date = start.date.checked_add_days(Days::new(carry_days)).unwrap_or(start.date);
    Instant { date, minutes }
}

/// Minutes between two instants, zero when `end` is not after `start`.
pub fn duration_minutes(start: &Instant, end: &Instant) -> u32 {
    let days = end.date.signed_duration_since(start.date).num_days();
    let total = days * i64::from(MINUTES_PER_DAY as i32)
        + i64::from(end.minutes)
        - i64::from(start.minutes);
    total.clamp(0, i64::from(u32::MAX)) as u32
}

/// Finds the first `D.M.[YY[YY]]` token. A missing year defaults to the
/// current year; a two-digit year is normalized into the current century, so
/// `25.01.26` and `25.01.2026` come out identical.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    text.split_whitespace().find_map(|token| parse_date_token(token, today))
}

fn parse_date_token(token: &str, today: NaiveDate) -> Option<NaiveDate> {
    let trimmed = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.');
    let mut parts = trimmed.split('.');

    let day = parse_component(parts.next()?, 1, 31)?;
    let month = parse_component(parts.next()?, 1, 12)?;
    let year_part = parts.next().unwrap_or("");
    if parts.next().is_some_and(|rest| !rest.is_empty()) {
        return None;
    }

    let year = match year_part.len() {
        0 => today.year(),
        2 => {
            let short: i32 = year_part.parse().ok()?;
            (today.year() / 100) * 100 + short
        }
        4 => year_part.parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_component(part: &str, min: u32, max: u32) -> Option<u32> {
    if part.is_empty() || part.len() > 2 {
        return None;
    }
    let value: u32 = part.parse().ok()?;
    (min..=max).contains(&value).then_some(value)
}

/// Finds the first `H:MM` token, or a bare hour followed by "uhr", as
/// minutes since midnight.
pub fn parse_time(text: &str) -> Option<u16> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (index, token) in tokens.iter().enumerate() {
        if let Some(minutes) = parse_clock_token(token) {
            return Some(minutes);
        }
        let next_is_uhr = tokens.get(index + 1).is_some_and(|t| t.eq_ignore_ascii_case("uhr"));
        if next_is_uhr {
            if let Some(hour) = parse_hour(token) {
                return Some(hour * 60);
            }
        }
    }
    None
}

/// Parses a start-end pair like `14-16` or `14:30-16:00` as minutes since
/// midnight. Used by the draft edit path ("Zeit 14-16").
pub fn parse_time_range(text: &str) -> Option<(u16, u16)> {
    for token in text.split_whitespace() {
        let Some((left, right)) = token.split_once('-') else {
            continue;
        };
        let start = parse_clock_token(left).or_else(|| parse_hour(left).map(|h| h * 60))?;
        let end = parse_clock_token(right).or_else(|| parse_hour(right).map(|h| h * 60))?;
        return Some((start, end));
    }
    None
}

fn parse_clock_token(token: &str) -> Option<u16> {
    let trimmed = token.trim_matches(|c: char| !c.is_ascii_digit() && c != ':');
    let (hour_part, minute_part) = trimmed.split_once(':')?;
    let hour = parse_hour(hour_part)?;
    if minute_part.len() != 2 {
        return None;
    }
    let minute: u16 = minute_part.parse().ok()?;
    (minute < 60).then_some(hour * 60 + minute)
}

fn parse_hour(part: &str) -> Option<u16> {
    let trimmed = part.trim_matches(|c: char| !c.is_ascii_digit());
    if trimmed.is_empty() || trimmed.len() > 2 {
        return None;
    }
    let hour: u16 = trimmed.parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Fields addressable through the fast `<keyword>[:] <value>` correction
/// path, shared by draft edits and session-memory patches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchField {
    Datum,
    Zeit,
    Ort,
    Titel,
    Info,
    Gaeste,
    Kontakt,
    Teilnehmer,
}

impl PatchField {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "datum" | "tag" => Some(Self::Datum),
            "zeit" | "uhrzeit" => Some(Self::Zeit),
            "ort" | "location" | "studio" => Some(Self::Ort),
            "titel" | "title" | "betreff" => Some(Self::Titel),
            "info" | "beschreibung" | "notiz" => Some(Self::Info),
            "gäste" | "gaeste" | "einladen" => Some(Self::Gaeste),
            "kontakt" | "ansprechpartner" => Some(Self::Kontakt),
            "teilnehmer" => Some(Self::Teilnehmer),
            _ => None,
        }
    }
}

/// Recognizes `<keyword>[:] <value>` at the start of a message, e.g.
/// `Zeit 14-16`, `ort: Studio B`. Returns the field and the raw value text.
pub fn parse_field_patch(text: &str) -> Option<(PatchField, String)> {
    let trimmed = text.trim();
    let (head, rest) = trimmed.split_once(char::is_whitespace)?;
    let keyword = head.trim_end_matches(':').to_lowercase();
    let field = PatchField::from_keyword(&keyword)?;
    let value = rest.trim().to_string();
    (!value.is_empty()).then_some((field, value))
}
