//! Rewriting programme start/stop times

use chrono::TimeDelta;
use tracing::{debug, warn};

use super::document::{Document, Programme};
use super::time::Timestamp;
use crate::error::Result;

/// Move every programme by `delta`, keeping each timestamp's own offset.
/// Returns the number of programmes rewritten.
pub fn shift_programmes(doc: &mut Document, delta: TimeDelta) -> usize {
    let changed = rewrite_times(doc, |ts| ts.shifted_by(delta));
    debug!("Shifted {} programmes by {}s", changed, delta.num_seconds());
    changed
}

/// Re-express every programme's start and stop in UTC.
pub fn normalize_utc(doc: &mut Document) -> usize {
    let changed = rewrite_times(doc, |ts| Ok(ts.to_utc()));
    debug!("Normalized {} programmes to UTC", changed);
    changed
}

fn rewrite_times<F>(doc: &mut Document, convert: F) -> usize
where
    F: Fn(&Timestamp) -> Result<Timestamp>,
{
    let mut changed = 0;
    for programme in doc.programmes_mut() {
        match convert_pair(programme, &convert) {
            Ok((start, stop)) => {
                programme.set_start(&start);
                programme.set_stop(&stop);
                changed += 1;
            }
            Err(e) => warn!(
                "Leaving programme times unchanged ({}): {}",
                e,
                programme.title().unwrap_or_default()
            ),
        }
    }
    changed
}

fn convert_pair<F>(programme: &Programme, convert: &F) -> Result<(Timestamp, Timestamp)>
where
    F: Fn(&Timestamp) -> Result<Timestamp>,
{
    let start = convert(&programme.start_time()?)?;
    let stop = convert(&programme.stop_time()?)?;
    Ok((start, stop))
}
