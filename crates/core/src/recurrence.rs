//! Expansion of recurring calendar events into concrete occurrences.
//!
//! Occurrences are never stored; they are derived per query window. A
//! recurring event with no end date is only expanded up to the end of the
//! window the caller asks for.

use chrono::{DateTime, Duration, Months, Utc};

use crate::model::{CalendarError, CalendarEvent, Occurrence, Recurrence};

/// Hard cap on occurrences produced for one event in one query.
pub const MAX_OCCURRENCES_PER_EVENT: usize = 1_000;

const SECONDS_PER_DAY: i64 = 86_400;

/// Inclusive query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns `CalendarError::InvalidRange` when `end < start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CalendarError> {
        if end < start {
            return Err(CalendarError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// True when `[from, to]` touches the window at all.
    #[must_use]
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        from <= self.end && to >= self.start
    }
}

/// Expands every event into the occurrences that fall inside `range`,
/// sorted by start time.
#[must_use]
pub fn expand_occurrences(events: &[CalendarEvent], range: DateRange) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for event in events {
        if event.recurrence.is_recurring() {
            expand_recurring(event, range, &mut out);
        } else if range.overlaps(event.start, event.end) {
            out.push(single(event));
        }
    }
    out.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    out
}

fn expand_recurring(event: &CalendarEvent, range: DateRange, out: &mut Vec<Occurrence>) {
    let limit = event
        .recurrence_end_date
        .map_or(range.end, |until| until.min(range.end));
    let duration = event.end - event.start;

    let mut n = first_step_at_or_after(event, range.start);
    let mut produced = 0;
    while let Some(cursor) = nth_start(event.start, event.recurrence, n) {
        if cursor > limit {
            break;
        }
        if cursor >= range.start {
            out.push(expanded(event, cursor, duration));
            produced += 1;
            if produced >= MAX_OCCURRENCES_PER_EVENT {
                break;
            }
        }
        n += 1;
    }
}

/// Fixed-length units can jump straight to the window; calendar units walk
/// from the original start.
fn first_step_at_or_after(event: &CalendarEvent, at: DateTime<Utc>) -> u32 {
    let unit_secs = match event.recurrence {
        Recurrence::Daily => SECONDS_PER_DAY,
        Recurrence::Weekly => 7 * SECONDS_PER_DAY,
        Recurrence::None | Recurrence::Monthly | Recurrence::Yearly => return 0,
    };
    let behind = (at - event.start).num_seconds();
    if behind <= 0 {
        return 0;
    }
    u32::try_from((behind + unit_secs - 1) / unit_secs).unwrap_or(u32::MAX)
}

/// Start of the `n`-th repetition, computed from the original start so that
/// month-end dates clamp per month instead of drifting.
fn nth_start(start: DateTime<Utc>, recurrence: Recurrence, n: u32) -> Option<DateTime<Utc>> {
    match recurrence {
        Recurrence::None => (n == 0).then_some(start),
        Recurrence::Daily => start.checked_add_signed(Duration::days(i64::from(n))),
        Recurrence::Weekly => start.checked_add_signed(Duration::weeks(i64::from(n))),
        Recurrence::Monthly => start.checked_add_months(Months::new(n)),
        Recurrence::Yearly => start.checked_add_months(Months::new(n.checked_mul(12)?)),
    }
}

fn single(event: &CalendarEvent) -> Occurrence {
    Occurrence {
        id: event.id.to_string(),
        parent_id: None,
        title: event.title.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start: event.start,
        end: event.end,
        all_day: event.all_day,
        audience: event.audience,
        recurrence: event.recurrence,
    }
}

fn expanded(event: &CalendarEvent, start: DateTime<Utc>, duration: Duration) -> Occurrence {
    Occurrence {
        id: format!("{}-{}", event.id, start.format("%Y-%m-%d")),
        parent_id: Some(event.id),
        start,
        end: start + duration,
        ..single(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Audience, EventId, UserId};
    use crate::time::fixed_now;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn event(id: u64, start: DateTime<Utc>, hours: i64, recurrence: Recurrence) -> CalendarEvent {
        CalendarEvent {
            id: EventId::new(id),
            title: format!("event {id}"),
            description: None,
            location: None,
            start,
            end: start + Duration::hours(hours),
            all_day: false,
            audience: Audience::All,
            recurrence,
            recurrence_end_date: None,
            created_by: UserId::new(1),
        }
    }

    #[test]
    fn weekly_event_yields_one_occurrence_per_week() {
        // started a month before the window
        let base = event(7, at(2024, 2, 5, 10), 2, Recurrence::Weekly);
        let range = DateRange::new(at(2024, 3, 4, 0), at(2024, 3, 10, 23)).unwrap();

        let out = expand_occurrences(&[base], range);
        assert_eq!(out.len(), 1);
        let occ = &out[0];
        assert_eq!(occ.id, "7-2024-03-04");
        assert_eq!(occ.parent_id, Some(EventId::new(7)));
        assert_eq!(occ.start, at(2024, 3, 4, 10));
        assert_eq!(occ.end - occ.start, Duration::hours(2));
    }

    #[test]
    fn daily_event_respects_recurrence_end_date() {
        let mut base = event(1, at(2024, 3, 1, 9), 1, Recurrence::Daily);
        base.recurrence_end_date = Some(at(2024, 3, 5, 12));
        let range = DateRange::new(at(2024, 3, 3, 0), at(2024, 3, 31, 0)).unwrap();

        let ids: Vec<String> = expand_occurrences(&[base], range)
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["1-2024-03-03", "1-2024-03-04", "1-2024-03-05"]);
    }

    #[test]
    fn unbounded_recurrence_stops_at_window_end() {
        let base = event(2, at(2024, 1, 1, 8), 1, Recurrence::Daily);
        let range = DateRange::new(at(2024, 1, 1, 0), at(2024, 1, 3, 23)).unwrap();
        assert_eq!(expand_occurrences(&[base], range).len(), 3);
    }

    #[test]
    fn monthly_event_clamps_without_drift() {
        let base = event(3, at(2024, 1, 31, 9), 1, Recurrence::Monthly);
        let range = DateRange::new(at(2024, 1, 1, 0), at(2024, 4, 30, 23)).unwrap();
        let starts: Vec<DateTime<Utc>> = expand_occurrences(&[base], range)
            .into_iter()
            .map(|o| o.start)
            .collect();
        assert_eq!(
            starts,
            vec![
                at(2024, 1, 31, 9),
                at(2024, 2, 29, 9),
                at(2024, 3, 31, 9),
                at(2024, 4, 30, 9),
            ]
        );
    }

    #[test]
    fn yearly_event() {
        let base = event(4, at(2020, 6, 15, 12), 3, Recurrence::Yearly);
        let range = DateRange::new(at(2023, 1, 1, 0), at(2024, 12, 31, 0)).unwrap();
        let ids: Vec<String> = expand_occurrences(&[base], range)
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["4-2023-06-15", "4-2024-06-15"]);
    }

    #[test]
    fn single_events_pass_through_when_overlapping() {
        let inside = event(5, fixed_now(), 1, Recurrence::None);
        let spanning = event(6, fixed_now() - Duration::days(3), 24 * 7, Recurrence::None);
        let outside = event(8, fixed_now() + Duration::days(30), 1, Recurrence::None);
        let range = DateRange::new(fixed_now() - Duration::hours(1), fixed_now() + Duration::days(1))
            .unwrap();

        let out = expand_occurrences(&[inside, spanning, outside], range);
        let ids: Vec<&str> = out.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["6", "5"]);
        assert!(out.iter().all(|o| o.parent_id.is_none()));
    }

    #[test]
    fn event_starting_after_window_yields_nothing() {
        let base = event(9, at(2024, 5, 1, 9), 1, Recurrence::Daily);
        let range = DateRange::new(at(2024, 3, 1, 0), at(2024, 3, 31, 0)).unwrap();
        assert!(expand_occurrences(&[base], range).is_empty());
    }

    #[test]
    fn occurrences_are_capped() {
        let base = event(10, at(2000, 1, 1, 0), 1, Recurrence::Daily);
        let range = DateRange::new(at(2000, 1, 1, 0), at(2030, 1, 1, 0)).unwrap();
        assert_eq!(
            expand_occurrences(&[base], range).len(),
            MAX_OCCURRENCES_PER_EVENT
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            DateRange::new(fixed_now(), fixed_now() - Duration::seconds(1)).unwrap_err(),
            CalendarError::InvalidRange
        );
    }
}
