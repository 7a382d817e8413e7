//! QC cadences and the business-day calendar they run on.
//!
//! Every cadence divides the calendar into periods (a business day, an ISO
//! week, a month, a quarter, a year). One completed QC anywhere inside a
//! period satisfies it. The period's *deadline* is its last business day and
//! is the only day on which that cadence is applicable.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Lookback for the daily cadence, in calendar days including today.
pub const DAILY_WINDOW_DAYS: u32 = 7;

/// Upper bound on periods scanned when searching forward for a deadline.
const MAX_PERIOD_SCAN: usize = 1024;

/// Monday through Friday. There is no holiday calendar.
pub fn is_business_day(date: NaiveDate) -> bool {
  !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

// ─── Period ──────────────────────────────────────────────────────────────────

/// An inclusive span of calendar days satisfied by a single QC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl Period {
  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  /// Last business day of the period, or `None` if it has none (a weekend
  /// day under the daily cadence).
  pub fn deadline(&self) -> Option<NaiveDate> {
    let mut day = self.end;
    loop {
      if is_business_day(day) {
        return Some(day);
      }
      if day <= self.start {
        return None;
      }
      day = day.pred_opt()?;
    }
  }

  /// Whether a completion dated inside the period, and no later than
  /// `until`, exists.
  pub fn is_covered(&self, completions: &BTreeSet<NaiveDate>, until: NaiveDate) -> bool {
    let end = self.end.min(until);
    self.start <= end && completions.range(self.start..=end).next().is_some()
  }
}

// ─── Cadence ─────────────────────────────────────────────────────────────────

/// Required frequency of a QC check.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Cadence {
  Daily,
  Weekly,
  Monthly,
  Quarterly,
  Annual,
}

impl Cadence {
  pub const ALL: [Cadence; 5] = [
    Cadence::Daily,
    Cadence::Weekly,
    Cadence::Monthly,
    Cadence::Quarterly,
    Cadence::Annual,
  ];

  /// The period that `date` falls in.
  pub fn period_containing(self, date: NaiveDate) -> Period {
    let start = match self {
      Self::Daily => date,
      Self::Weekly => date
        .checked_sub_days(Days::new(u64::from(
          date.weekday().num_days_from_monday(),
        )))
        .unwrap_or(NaiveDate::MIN),
      Self::Monthly => first_of(date.year(), date.month()),
      Self::Quarterly => first_of(date.year(), (date.month0() / 3) * 3 + 1),
      Self::Annual => first_of(date.year(), 1),
    };
    let end = self
      .next_period_start(start)
      .and_then(|next| next.pred_opt())
      .unwrap_or(NaiveDate::MAX);
    Period { start, end }
  }

  fn next_period_start(self, start: NaiveDate) -> Option<NaiveDate> {
    match self {
      Self::Daily => start.succ_opt(),
      Self::Weekly => start.checked_add_days(Days::new(7)),
      Self::Monthly => start.checked_add_months(Months::new(1)),
      Self::Quarterly => start.checked_add_months(Months::new(3)),
      Self::Annual => start.checked_add_months(Months::new(12)),
    }
  }

  /// The period immediately before the one containing `date`.
  pub fn previous_period(self, date: NaiveDate) -> Period {
    let current = self.period_containing(date);
    self.period_containing(current.start.pred_opt().unwrap_or(NaiveDate::MIN))
  }

  /// Whether QC for this cadence falls due on `date`.
  pub fn is_applicable(self, date: NaiveDate) -> bool {
    self.period_containing(date).deadline() == Some(date)
  }

  /// Default lookback, in calendar days including `today`: a week for the
  /// daily cadence, otherwise back to the start of the previous period.
  pub fn default_window_days(self, today: NaiveDate) -> u32 {
    match self {
      Self::Daily => DAILY_WINDOW_DAYS,
      _ => {
        let start = self.previous_period(today).start;
        u32::try_from((today - start).num_days() + 1).unwrap_or(u32::MAX)
      }
    }
  }

  /// The first deadline on or after `from` whose period has no completion.
  pub fn next_deadline(
    self,
    completions: &BTreeSet<NaiveDate>,
    from: NaiveDate,
  ) -> Option<NaiveDate> {
    let mut period = self.period_containing(from);
    for _ in 0..MAX_PERIOD_SCAN {
      if let Some(deadline) = period.deadline()
        && deadline >= from
        && !period.is_covered(completions, NaiveDate::MAX)
      {
        return Some(deadline);
      }
      period = self.period_containing(period.end.succ_opt()?);
    }
    None
  }
}

fn first_of(year: i32, month: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn weekends_are_not_business_days() {
    assert!(is_business_day(d(2024, 6, 3))); // Monday
    assert!(is_business_day(d(2024, 6, 7))); // Friday
    assert!(!is_business_day(d(2024, 6, 1))); // Saturday
    assert!(!is_business_day(d(2024, 6, 2))); // Sunday
  }

  #[test]
  fn periods() {
    let wed = d(2024, 6, 5);
    assert_eq!(
      Cadence::Weekly.period_containing(wed),
      Period { start: d(2024, 6, 3), end: d(2024, 6, 9) }
    );
    assert_eq!(
      Cadence::Monthly.period_containing(wed),
      Period { start: d(2024, 6, 1), end: d(2024, 6, 30) }
    );
    assert_eq!(
      Cadence::Quarterly.period_containing(wed),
      Period { start: d(2024, 4, 1), end: d(2024, 6, 30) }
    );
    assert_eq!(
      Cadence::Annual.period_containing(wed),
      Period { start: d(2024, 1, 1), end: d(2024, 12, 31) }
    );
    assert_eq!(
      Cadence::Monthly.period_containing(d(2024, 2, 10)).end,
      d(2024, 2, 29)
    );
  }

  #[test]
  fn deadlines_fall_on_last_business_day() {
    // June 2024 ends on a Sunday.
    assert_eq!(
      Cadence::Monthly.period_containing(d(2024, 6, 5)).deadline(),
      Some(d(2024, 6, 28))
    );
    assert_eq!(
      Cadence::Weekly.period_containing(d(2024, 6, 5)).deadline(),
      Some(d(2024, 6, 7))
    );
    assert_eq!(
      Cadence::Annual.period_containing(d(2023, 5, 1)).deadline(),
      Some(d(2023, 12, 29))
    );
    assert_eq!(Cadence::Daily.period_containing(d(2024, 6, 1)).deadline(), None);
  }

  #[test]
  fn applicability() {
    assert!(Cadence::Daily.is_applicable(d(2024, 6, 4)));
    assert!(!Cadence::Daily.is_applicable(d(2024, 6, 8)));
    assert!(Cadence::Weekly.is_applicable(d(2024, 6, 7)));
    assert!(!Cadence::Weekly.is_applicable(d(2024, 6, 6)));
    assert!(Cadence::Quarterly.is_applicable(d(2024, 3, 29)));
    assert!(!Cadence::Annual.is_applicable(d(2024, 6, 5)));
  }

  #[test]
  fn default_windows() {
    let wed = d(2024, 6, 5);
    assert_eq!(Cadence::Daily.default_window_days(wed), 7);
    // Back to Monday 2024-05-27.
    assert_eq!(Cadence::Weekly.default_window_days(wed), 10);
    // Back to 2024-05-01.
    assert_eq!(Cadence::Monthly.default_window_days(wed), 36);
    // Back to 2023-01-01.
    assert_eq!(Cadence::Annual.default_window_days(d(2024, 1, 1)), 366);
  }

  #[test]
  fn next_deadline_skips_covered_periods() {
    let completions: BTreeSet<_> = [d(2024, 6, 3)].into_iter().collect();
    // Weekly: this week is covered, so next Friday.
    assert_eq!(
      Cadence::Weekly.next_deadline(&completions, d(2024, 6, 3)),
      Some(d(2024, 6, 14))
    );
    // Daily: Monday covered, Tuesday is next.
    assert_eq!(
      Cadence::Daily.next_deadline(&completions, d(2024, 6, 3)),
      Some(d(2024, 6, 4))
    );
    // Daily from a Saturday lands on Monday.
    assert_eq!(
      Cadence::Daily.next_deadline(&BTreeSet::new(), d(2024, 6, 8)),
      Some(d(2024, 6, 10))
    );
  }

  #[test]
  fn next_deadline_ignores_passed_deadlines() {
    // Saturday after an uncovered week: this week's Friday has passed.
    assert_eq!(
      Cadence::Weekly.next_deadline(&BTreeSet::new(), d(2024, 6, 8)),
      Some(d(2024, 6, 14))
    );
  }
}
