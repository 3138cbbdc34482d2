//! Weekday tokens, weekday sets and the (date, weekday) target of a day scope.
//!
//! Rows store weekdays as free-form tokens written by several clients over
//! time (`"Mon"`, `"monday"`, `"MO"`). Tokens are normalised on the way in
//! and always written back as lowercase three-letter tokens.

use alloc::string::String;
use alloc::vec::Vec;
use chrono::{Datelike, NaiveDate, Weekday};
use core::fmt;
use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Parses a weekday token, ignoring case and surrounding whitespace.
///
/// Accepts full names, three-letter and two-letter abbreviations.
pub fn parse_weekday(token: &str) -> Option<Weekday> {
    let token = token.trim();
    if token.len() < 2 || !token.is_ascii() {
        return None;
    }
    let mut buf = [0u8; 9];
    if token.len() > buf.len() {
        return None;
    }
    for (dst, src) in buf.iter_mut().zip(token.bytes()) {
        *dst = src.to_ascii_lowercase();
    }
    let lower = &buf[..token.len()];

    WEEK.iter().copied().find(|day| {
        let full = full_name(*day).as_bytes();
        match lower.len() {
            2 | 3 => full.starts_with(lower),
            _ => full == lower || (lower.len() == 4 && full.starts_with(lower)),
        }
    })
}

/// Canonical lowercase three-letter token for a weekday.
pub fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

fn full_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// A set of weekdays, one bit per day.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// Creates an empty set.
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Creates a set containing all seven days.
    #[inline]
    pub const fn all() -> Self {
        Self(0b111_1111)
    }

    #[inline]
    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    /// Returns true if the set contains the given day.
    #[inline]
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    /// Adds a day. Returns true if it was not already present.
    pub fn insert(&mut self, day: Weekday) -> bool {
        let had = self.contains(day);
        self.0 |= Self::bit(day);
        !had
    }

    /// Removes a day. Returns true if it was present.
    pub fn remove(&mut self, day: Weekday) -> bool {
        let had = self.contains(day);
        self.0 &= !Self::bit(day);
        had
    }

    /// Returns a copy of the set without the given day.
    #[inline]
    pub fn without(mut self, day: Weekday) -> Self {
        self.remove(day);
        self
    }

    /// Returns the number of days in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns true if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates over the days in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEK.iter().copied().filter(move |day| self.contains(*day))
    }

    /// Parses a list of tokens, failing on the first unknown token.
    pub fn from_tokens<'a, I>(tokens: I) -> core::result::Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = Self::empty();
        for token in tokens {
            match parse_weekday(token) {
                Some(day) => {
                    set.insert(day);
                }
                None => return Err(alloc::format!("unknown weekday token {:?}", token)),
            }
        }
        Ok(set)
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(weekday_token)).finish()
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for day in self.iter() {
            seq.serialize_element(weekday_token(day))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let tokens: Vec<String> = Vec::deserialize(deserializer)?;
        WeekdaySet::from_tokens(tokens.iter().map(String::as_str)).map_err(D::Error::custom)
    }
}

/// The calendar target a day-scoped collection is evaluated against.
///
/// Date and weekday are carried separately; callers that derive both from a
/// local clock pass them in explicitly so resolution never reads the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DayScope {
    pub date: NaiveDate,
    pub weekday: Weekday,
}

impl DayScope {
    /// Creates a scope from an explicit date and weekday.
    pub fn new(date: NaiveDate, weekday: Weekday) -> Self {
        Self { date, weekday }
    }

    /// Creates a scope for a date, deriving the weekday from it.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            weekday: date.weekday(),
        }
    }
}
