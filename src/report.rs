//! Summary reports over a processed guide
//!
//! Each report builds its own accumulator from the document; nothing is
//! shared between reports or between runs.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, TimeDelta};
use tracing::{debug, warn};

use crate::xmltv::{format_duration, Document};

/// Strftime pattern for programme times in the programme listing
const LISTING_TIME_FORMAT: &str = "%a %Y-%m-%d %H:%M %z";

/// Scheduled time per calendar day.
///
/// Days are grouped by year, then month, each level kept in first-seen
/// order. Unsorted input therefore gives unsorted output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayReport {
    years: Vec<(i32, Vec<(u32, Vec<(NaiveDate, TimeDelta)>)>)>,
}

impl DayReport {
    pub fn build(doc: &Document) -> Self {
        let mut report = Self::default();
        for programme in doc.programmes() {
            match programme.start_time() {
                Ok(start) => report.add(start.date(), programme.duration()),
                Err(e) => warn!(
                    "Skipping programme in day report ({}): {}",
                    e,
                    programme.title().unwrap_or_default()
                ),
            }
        }
        report
    }

    pub fn add(&mut self, date: NaiveDate, duration: TimeDelta) {
        let year = match self.years.iter().position(|(y, _)| *y == date.year()) {
            Some(i) => i,
            None => {
                self.years.push((date.year(), Vec::new()));
                self.years.len() - 1
            }
        };
        let months = &mut self.years[year].1;

        let month = match months.iter().position(|(m, _)| *m == date.month()) {
            Some(i) => i,
            None => {
                months.push((date.month(), Vec::new()));
                months.len() - 1
            }
        };
        let days = &mut months[month].1;

        match days.iter_mut().find(|(d, _)| *d == date) {
            Some((_, total)) => *total += duration,
            None => days.push((date, duration)),
        }
    }

    /// `<weekday> <year> <month> <day> : <duration>`, e.g. `Mon 2024 1 01 : 1:00:00`
    pub fn lines(&self) -> Vec<String> {
        self.years
            .iter()
            .flat_map(|(_, months)| months.iter())
            .flat_map(|(_, days)| days.iter())
            .map(|(date, total)| {
                format!(
                    "{} {} {} {:02} : {}",
                    date.format("%a"),
                    date.year(),
                    date.month(),
                    date.day(),
                    format_duration(*total)
                )
            })
            .collect()
    }
}

/// Appearances of each channel id across programmes and channel elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelReport {
    counts: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl ChannelReport {
    /// Programmes are counted before channel elements, which fixes the
    /// first-seen order of the output.
    pub fn build(doc: &Document) -> Self {
        let mut report = Self::default();
        for programme in doc.programmes() {
            match programme.channel() {
                Some(id) => report.add(id),
                None => debug!("Programme without channel not counted"),
            }
        }
        for channel in doc.channels() {
            match channel.id() {
                Some(id) => report.add(id),
                None => debug!("Channel without id not counted"),
            }
        }
        report
    }

    pub fn add(&mut self, id: &str) {
        match self.index.get(id) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(id.to_string(), self.counts.len());
                self.counts.push((id.to_string(), 1));
            }
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.counts
            .iter()
            .map(|(id, count)| format!("{}: {}", id, count))
            .collect()
    }
}

/// One line per programme in document order.
///
/// Untitled programmes print only start and channel. Titled ones add either
/// the stop time or, with `show_duration`, the programme length.
pub fn program_listing(doc: &Document, show_duration: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(doc.programme_count());

    for programme in doc.programmes() {
        let start = match programme.start_time() {
            Ok(ts) => ts.format(LISTING_TIME_FORMAT),
            Err(e) => {
                warn!(
                    "Skipping programme in listing ({}): {}",
                    e,
                    programme.title().unwrap_or_default()
                );
                continue;
            }
        };
        let channel = programme.channel().unwrap_or_default();

        let line = match programme.title() {
            None => format!("{}  {}", start, channel),
            Some(title) if show_duration => format!(
                "{}  {}\t - {} {}",
                start,
                channel,
                format_duration(programme.duration()),
                title
            ),
            Some(title) => {
                let stop = programme
                    .stop_time()
                    .map(|ts| ts.format(LISTING_TIME_FORMAT))
                    .unwrap_or_default();
                format!("{}  {} {}\t - {}", start, stop, channel, title)
            }
        };
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_log::capture_warnings;

    const GUIDE: &str = r#"<tv>
  <channel id="bbc1"><display-name>BBC One</display-name></channel>
  <programme start="20240101100000 +0000" stop="20240101110000 +0000" channel="bbc1"><title>News</title></programme>
</tv>"#;

    const UNORDERED: &str = r#"<tv>
  <channel id="itv"/>
  <programme start="20240201080000 +0000" stop="20240201083000 +0000" channel="itv"><title>A</title></programme>
  <programme start="20231231220000 +0000" stop="20231231230000 +0000" channel="bbc1"><title>B</title></programme>
  <programme start="20240102090000 +0000" stop="20240102100000 +0000" channel="itv"><title>C</title></programme>
  <programme start="20240201200000 +0000" stop="20240201213000 +0000" channel="bbc1"><title>D</title></programme>
  <programme start="20240102120000 +0000" stop="20240102110000 +0000" channel="itv"><title>Backwards</title></programme>
  <channel id="bbc1"/>
</tv>"#;

    #[test]
    fn test_backwards_programme_warns_once() {
        let xml = r#"<tv>
  <programme start="20240101110000 +0000" stop="20240101100000 +0000" channel="a"><title>Backwards</title></programme>
</tv>"#;
        let doc = Document::parse(xml).unwrap();

        let (report, logs) = capture_warnings(|| DayReport::build(&doc));
        assert_eq!(report.lines(), vec!["Mon 2024 1 01 : 0:00:00"]);
        assert_eq!(logs.count("Program without correct start / stop fields: Backwards"), 1);
        assert_eq!(logs.lines().len(), 1);
    }

    #[test]
    fn test_day_report_single_programme() {
        let doc = Document::parse(GUIDE).unwrap();
        assert_eq!(DayReport::build(&doc).lines(), vec!["Mon 2024 1 01 : 1:00:00"]);
    }

    #[test]
    fn test_day_report_groups_in_first_seen_order() {
        let doc = Document::parse(UNORDERED).unwrap();
        assert_eq!(
            DayReport::build(&doc).lines(),
            vec![
                "Thu 2024 2 01 : 2:00:00",
                "Tue 2024 1 02 : 1:00:00",
                "Sun 2023 12 31 : 1:00:00",
            ]
        );
    }

    #[test]
    fn test_day_report_spanning_days() {
        let mut report = DayReport::default();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        report.add(date, TimeDelta::hours(20));
        report.add(date, TimeDelta::hours(6));
        assert_eq!(report.lines(), vec!["Mon 2024 3 04 : 1 day, 2:00:00"]);
    }

    #[test]
    fn test_channel_report() {
        let doc = Document::parse(GUIDE).unwrap();
        let report = ChannelReport::build(&doc);
        assert_eq!(report.lines(), vec!["bbc1: 2"]);
    }

    #[test]
    fn test_channel_report_order() {
        let doc = Document::parse(UNORDERED).unwrap();
        assert_eq!(ChannelReport::build(&doc).lines(), vec!["itv: 4", "bbc1: 3"]);
    }

    #[test]
    fn test_program_listing() {
        let xml = r#"<tv>
  <programme start="20240101100000 +0000" stop="20240101110000 +0000" channel="bbc1"><title>News</title></programme>
  <programme start="20240101110000 +0000" stop="20240101113000 +0000" channel="bbc1"><title/></programme>
  <programme start="20240101113000 +0000" stop="20240101120000 +0000" channel="bbc1"/>
</tv>"#;
        let doc = Document::parse(xml).unwrap();

        assert_eq!(
            program_listing(&doc, false),
            vec![
                "Mon 2024-01-01 10:00 +0000  Mon 2024-01-01 11:00 +0000 bbc1\t - News",
                "Mon 2024-01-01 11:00 +0000  Mon 2024-01-01 11:30 +0000 bbc1\t - ",
                "Mon 2024-01-01 11:30 +0000  bbc1",
            ]
        );
        assert_eq!(
            program_listing(&doc, true),
            vec![
                "Mon 2024-01-01 10:00 +0000  bbc1\t - 1:00:00 News",
                "Mon 2024-01-01 11:00 +0000  bbc1\t - 0:30:00 ",
                "Mon 2024-01-01 11:30 +0000  bbc1",
            ]
        );
    }
}
