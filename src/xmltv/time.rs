//! XMLTV timestamps and time shift specifications
//!
//! Timestamps use the fixed-width form `YYYYMMDDHHMMSS ±HHMM`. They keep the
//! offset they were read with, so shifting is wall-clock arithmetic and only
//! `to_utc` changes the offset field.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Utc};
use tracing::warn;

use crate::error::{Result, XmltvError};

/// strftime pattern of an XMLTV timestamp
pub const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

const SECS_PER_DAY: i64 = 86_400;

/// Calendar date-time with the fixed UTC offset it was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    /// Parse `YYYYMMDDHHMMSS ±HHMM`. Anything else is rejected, including the
    /// offset-less and `+HH:MM` variants some generators emit.
    pub fn parse(text: &str) -> Result<Self> {
        if !has_xmltv_shape(text) {
            return Err(XmltvError::InvalidTimestamp(text.to_string()));
        }
        DateTime::parse_from_str(text, XMLTV_TIME_FORMAT)
            .map(Timestamp)
            .map_err(|_| XmltvError::InvalidTimestamp(text.to_string()))
    }

    pub fn encode(&self) -> String {
        self.0.format(XMLTV_TIME_FORMAT).to_string()
    }

    /// Add `delta` keeping the original offset field.
    pub fn shifted_by(&self, delta: TimeDelta) -> Result<Self> {
        self.0
            .checked_add_signed(delta)
            .map(Timestamp)
            .ok_or_else(|| XmltvError::TimestampOutOfRange(self.encode()))
    }

    /// Same instant, expressed with a `+0000` offset.
    pub fn to_utc(&self) -> Self {
        Timestamp(self.0.with_timezone(&Utc).fixed_offset())
    }

    /// Calendar date in the timestamp's own offset
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    pub fn format(&self, pattern: &str) -> String {
        self.0.format(pattern).to_string()
    }
}

fn has_xmltv_shape(text: &str) -> bool {
    let b = text.as_bytes();
    b.len() == 20
        && b[..14].iter().all(u8::is_ascii_digit)
        && b[14] == b' '
        && (b[15] == b'+' || b[15] == b'-')
        && b[16..].iter().all(u8::is_ascii_digit)
}

/// Raw `stop - start`. May be negative; programme-level code clamps it.
pub(crate) fn duration(start: &Timestamp, stop: &Timestamp) -> TimeDelta {
    stop.0 - start.0
}

/// Render a non-negative duration as `H:MM:SS`, prefixed with
/// `N day(s), ` once it spans a full day.
pub fn format_duration(delta: TimeDelta) -> String {
    let total = delta.num_seconds().max(0);
    let days = total / SECS_PER_DAY;
    let rest = total % SECS_PER_DAY;
    let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);

    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Which way a shift specification moves timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Onwards,
    Backwards,
}

/// Per-unit accumulator built from `--shift-time-*` specifications.
///
/// Years collapse to 365 days each and months are accepted but never reach
/// the elapsed-time offset, so `"1M"` parses cleanly and shifts nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeShift {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl TimeShift {
    /// Combine the onwards and backwards specifications. `None` when neither
    /// was supplied, meaning no shift pass runs at all.
    pub fn from_specs(onwards: Option<&str>, backwards: Option<&str>) -> Option<Self> {
        if onwards.is_none() && backwards.is_none() {
            return None;
        }

        let mut shift = TimeShift::default();
        if let Some(spec) = onwards {
            shift.apply_spec(spec, ShiftDirection::Onwards);
        }
        if let Some(spec) = backwards {
            shift.apply_spec(spec, ShiftDirection::Backwards);
        }
        Some(shift)
    }

    /// Accumulate every whitespace separated token of `spec`, e.g. `"1d -2h 30m"`.
    pub fn apply_spec(&mut self, spec: &str, direction: ShiftDirection) {
        for token in spec.split_whitespace() {
            if !self.apply_token(token, direction) {
                warn!("Ignoring malformed time shift: {}", token);
            }
        }
    }

    fn apply_token(&mut self, token: &str, direction: ShiftDirection) -> bool {
        let Some(unit) = token.chars().next_back() else {
            return false;
        };
        let Ok(amount) = token[..token.len() - unit.len_utf8()].parse::<i64>() else {
            return false;
        };
        let amount = match direction {
            ShiftDirection::Onwards => amount,
            ShiftDirection::Backwards => amount.saturating_neg(),
        };

        let slot = match unit {
            'y' => &mut self.years,
            'M' => &mut self.months,
            'w' => &mut self.weeks,
            'd' => &mut self.days,
            'h' => &mut self.hours,
            'm' => &mut self.minutes,
            's' => &mut self.seconds,
            _ => return false,
        };
        *slot = slot.saturating_add(amount);
        true
    }

    /// Elapsed-time offset applied to every programme.
    pub fn to_delta(&self) -> TimeDelta {
        let days = self.days.saturating_add(self.years.saturating_mul(365));
        let total = days
            .saturating_mul(SECS_PER_DAY)
            .saturating_add(self.weeks.saturating_mul(7 * SECS_PER_DAY))
            .saturating_add(self.hours.saturating_mul(3600))
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds);

        TimeDelta::try_seconds(total).unwrap_or(if total < 0 {
            TimeDelta::MIN
        } else {
            TimeDelta::MAX
        })
    }
}
