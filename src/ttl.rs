//! Validity window classification.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use strum_macros::Display;

const NANOS_PER_DAY: f64 = 86_400e9;
const MILLIS_PER_DAY: f64 = 86_400e3;

/// Where a reference time falls relative to a certificate's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TtlState {
    #[strum(to_string = "OK")]
    Valid,
    #[strum(to_string = "EX")]
    Expired,
    #[strum(to_string = "NY")]
    NotYetValid,
}

/// Returns the signed day count and state of a validity window at `now`.
///
/// Before the window opens the day count is the total window length. Once it
/// has opened it is the time left until `not_after`, negative when expired.
pub fn classify(
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (f64, TtlState) {
    if now < not_before {
        return (days(not_after - not_before), TtlState::NotYetValid);
    }

    let left = not_after - now;
    if left < Duration::zero() {
        (days(left), TtlState::Expired)
    } else {
        (days(left), TtlState::Valid)
    }
}

fn days(span: Duration) -> f64 {
    match span.num_nanoseconds() {
        Some(nanos) => nanos as f64 / NANOS_PER_DAY,
        // beyond roughly 292 years
        None => span.num_milliseconds() as f64 / MILLIS_PER_DAY,
    }
}
