//! Visibility of a care task on a given day.

use carelink_core::{CareTask, DayScope, NaiveDate, Recurrence, Weekday};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// How a `one_time` task is matched against a target day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneTimeMatch {
    /// Visible on every date sharing the weekday of `one_time_date`.
    ///
    /// This is what deployed clients do: a one-time task keeps showing up on
    /// its weekday in later weeks.
    #[default]
    SameWeekday,
    /// Visible only on `one_time_date` itself.
    ExactDate,
}

/// Decides task visibility for a (date, weekday) target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolver {
    one_time: OneTimeMatch,
}

impl Resolver {
    /// Creates a resolver with the given one-time matching rule.
    pub const fn new(one_time: OneTimeMatch) -> Self {
        Self { one_time }
    }

    /// Returns the one-time matching rule.
    #[inline]
    pub fn one_time_match(&self) -> OneTimeMatch {
        self.one_time
    }

    /// Returns true if the task applies to the target day.
    ///
    /// Inactive tasks are never visible. `target_weekday` is taken as given
    /// and is not re-derived from `target_date`.
    pub fn is_visible(&self, task: &CareTask, target_date: NaiveDate, target_weekday: Weekday) -> bool {
        if !task.active {
            return false;
        }
        self.recurrence_matches(&task.recurrence, target_date, target_weekday)
    }

    /// Same as `is_visible`, with the target bundled as a `DayScope`.
    #[inline]
    pub fn is_visible_in(&self, task: &CareTask, scope: &DayScope) -> bool {
        self.is_visible(task, scope.date, scope.weekday)
    }

    /// Evaluates the recurrence policy alone, ignoring the `active` flag.
    pub fn recurrence_matches(
        &self,
        recurrence: &Recurrence,
        target_date: NaiveDate,
        target_weekday: Weekday,
    ) -> bool {
        match recurrence {
            Recurrence::Daily => true,
            Recurrence::SpecificDays(days) => days.contains(target_weekday),
            Recurrence::OneTime(date) => match self.one_time {
                OneTimeMatch::SameWeekday => date.weekday() == target_date.weekday(),
                OneTimeMatch::ExactDate => *date == target_date,
            },
        }
    }
}

/// Visibility under the default resolver.
#[inline]
pub fn is_visible(task: &CareTask, target_date: NaiveDate, target_weekday: Weekday) -> bool {
    Resolver::default().is_visible(task, target_date, target_weekday)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::WeekdaySet;
    use proptest::prelude::*;
    use serde_json::json;

    fn task(recurrence: Recurrence) -> CareTask {
        let mut task: CareTask = serde_json::from_value(json!({
            "id": "t1",
            "household_id": "h1",
            "title": "Task",
            "time": "09:00",
            "created_at": "2024-05-01T00:00:00Z",
            "updated_at": "2024-05-01T00:00:00Z"
        }))
        .unwrap();
        task.recurrence = recurrence;
        task
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const WEEK: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    #[test]
    fn test_daily_visible_every_weekday() {
        let t = task(Recurrence::Daily);
        for day in WEEK {
            assert!(is_visible(&t, date(2024, 5, 6), day));
        }
    }

    #[test]
    fn test_inactive_never_visible() {
        let mut t = task(Recurrence::Daily);
        t.active = false;
        for day in WEEK {
            assert!(!is_visible(&t, date(2024, 5, 6), day));
        }
    }

    #[test]
    fn test_specific_days() {
        let days: WeekdaySet = [Weekday::Tue, Weekday::Thu].into_iter().collect();
        let t = task(Recurrence::SpecificDays(days));
        for day in WEEK {
            let expected = matches!(day, Weekday::Tue | Weekday::Thu);
            assert_eq!(is_visible(&t, date(2024, 5, 6), day), expected, "{:?}", day);
        }
    }

    #[test]
    fn test_specific_days_normalised_tokens() {
        let t: CareTask = serde_json::from_value(json!({
            "id": "t1",
            "household_id": "h1",
            "title": "Task",
            "time": "09:00",
            "recurrence": "specific_days",
            "recurrence_days": ["TUESDAY", " thu "],
            "created_at": "2024-05-01T00:00:00Z",
            "updated_at": "2024-05-01T00:00:00Z"
        }))
        .unwrap();
        assert!(is_visible(&t, date(2024, 5, 7), Weekday::Tue));
        assert!(!is_visible(&t, date(2024, 5, 8), Weekday::Wed));
    }

    #[test]
    fn test_empty_specific_days_never_visible() {
        let t = task(Recurrence::SpecificDays(WeekdaySet::empty()));
        for day in WEEK {
            assert!(!is_visible(&t, date(2024, 5, 6), day));
        }
    }

    #[test]
    fn test_one_time_recurs_on_weekday() {
        // 2024-05-08 is a Wednesday.
        let t = task(Recurrence::OneTime(date(2024, 5, 8)));
        assert!(is_visible(&t, date(2024, 5, 8), Weekday::Wed));
        assert!(is_visible(&t, date(2024, 5, 15), Weekday::Wed));
        assert!(is_visible(&t, date(2024, 5, 1), Weekday::Wed));
        assert!(!is_visible(&t, date(2024, 5, 9), Weekday::Thu));
    }

    #[test]
    fn test_one_time_matches_on_target_date_not_weekday_argument() {
        let t = task(Recurrence::OneTime(date(2024, 5, 8)));
        // The weekday argument disagrees with the date; the date decides.
        assert!(!is_visible(&t, date(2024, 5, 9), Weekday::Wed));
    }

    #[test]
    fn test_one_time_exact_date() {
        let resolver = Resolver::new(OneTimeMatch::ExactDate);
        let t = task(Recurrence::OneTime(date(2024, 5, 8)));
        assert!(resolver.is_visible(&t, date(2024, 5, 8), Weekday::Wed));
        assert!(!resolver.is_visible(&t, date(2024, 5, 15), Weekday::Wed));
    }

    #[test]
    fn test_is_visible_in_scope() {
        let t = task(Recurrence::Daily);
        let scope = DayScope::for_date(date(2024, 5, 6));
        assert!(Resolver::default().is_visible_in(&t, &scope));
    }

    proptest! {
        #[test]
        fn daily_visible_on_any_date(offset in 0i64..3650) {
            let t = task(Recurrence::Daily);
            let d = date(2020, 1, 1) + chrono::Duration::days(offset);
            prop_assert!(is_visible(&t, d, d.weekday()));
        }

        #[test]
        fn one_time_visible_every_seventh_day(weeks in -200i64..200) {
            let origin = date(2024, 5, 8);
            let t = task(Recurrence::OneTime(origin));
            let d = origin + chrono::Duration::days(weeks * 7);
            prop_assert!(is_visible(&t, d, d.weekday()));
            let off = d + chrono::Duration::days(1);
            prop_assert!(!is_visible(&t, off, off.weekday()));
        }
    }
}
