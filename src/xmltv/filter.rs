//! Channel and date filters
//!
//! Both filters work in two steps: the positions to drop are collected
//! first, then removed in a single pass over the document.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use super::document::{Document, Item};
use crate::error::{Result, XmltvError};

/// Offset appended to a `--filter-date` cutoff before comparison
pub const DEFAULT_DATE_FILTER_OFFSET: &str = "+0100";

/// Channel ids to keep, in the order they were given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelAllowList {
    ids: Vec<String>,
    lookup: HashSet<String>,
}

impl ChannelAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trimmed id. Blank entries stay in as `""`, which only ever
    /// matches an element whose id attribute is empty.
    pub fn push(&mut self, id: &str) {
        let id = id.trim();
        if self.lookup.insert(id.to_string()) {
            self.ids.push(id.to_string());
        }
    }

    /// Add every entry of a comma separated list, e.g. `"bbc1, itv"`.
    pub fn extend_from_list(&mut self, list: &str) {
        for id in list.split(',') {
            self.push(id);
        }
    }

    /// Add one id per line from `path`.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => XmltvError::FilterFileMissing(path.to_path_buf()),
            _ => XmltvError::io(path, e),
        })?;
        for line in content.lines() {
            self.push(line);
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup.contains(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// Drop channels and programmes whose id is not allowed. Elements lacking
/// the id attribute are kept and reported. Returns the number removed.
pub fn filter_channels(doc: &mut Document, allow: &ChannelAllowList) -> usize {
    let mut doomed = HashSet::new();

    for (index, item) in doc.items.iter().enumerate() {
        match item {
            Item::Channel(channel) => match channel.id() {
                Some(id) if !allow.contains(id) => {
                    doomed.insert(index);
                }
                Some(_) => {}
                None => warn!("channel element without id: {:?}", channel.0.attributes),
            },
            Item::Programme(programme) => match programme.channel() {
                Some(id) if !allow.contains(id) => {
                    doomed.insert(index);
                }
                Some(_) => {}
                None => warn!("programme element without channel: {:?}", programme.0.attributes),
            },
            Item::Other(_) => {}
        }
    }

    let removed = doomed.len();
    doc.remove_items(&doomed);
    debug!("Channel filter removed {} elements", removed);
    removed
}

/// Drop every programme starting at or after `cutoff`.
///
/// `cutoff` is a `YYYYMMDDHHMMSS` prefix; `offset` is appended to it and the
/// result is compared to the raw `start` text. The comparison is textual and
/// relies on the fixed-width, zero-padded timestamp layout, so programmes in
/// other offsets are compared by wall clock digits, not by instant.
pub fn filter_by_date(doc: &mut Document, cutoff: &str, offset: &str) -> usize {
    let cutoff = format!("{} {}", cutoff.trim(), offset);
    let mut doomed = HashSet::new();

    for (index, item) in doc.items.iter().enumerate() {
        let Item::Programme(programme) = item else {
            continue;
        };
        match programme.start() {
            Some(start) if start >= cutoff.as_str() => {
                doomed.insert(index);
            }
            Some(_) => {}
            None => warn!("programme element without start: {:?}", programme.0.attributes),
        }
    }

    let removed = doomed.len();
    doc.remove_items(&doomed);
    debug!("Date filter ({}) removed {} programmes", cutoff, removed);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_log::capture_warnings;

    const GUIDE: &str = r#"<tv>
  <channel id="bbc1"/>
  <channel id="itv"/>
  <channel><display-name>No id</display-name></channel>
  <programme start="20241231230000 +0100" stop="20250101000000 +0100" channel="bbc1"><title>Late</title></programme>
  <programme start="20250101000000 +0100" stop="20250101010000 +0100" channel="bbc1"><title>Midnight</title></programme>
  <programme start="20250102000000 +0000" stop="20250102010000 +0000" channel="itv"><title>Next day</title></programme>
  <programme stop="20250102010000 +0000"><title>Orphan</title></programme>
</tv>"#;

    fn titles(doc: &Document) -> Vec<String> {
        doc.programmes().filter_map(|p| p.title()).collect()
    }

    #[test]
    fn test_allow_list_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.txt");
        fs::write(&path, "itv\n\n  sky1  \nbbc1\n").unwrap();

        let mut allow = ChannelAllowList::new();
        allow.extend_from_list(" bbc1 ,bbc2");
        allow.extend_from_file(&path).unwrap();

        assert_eq!(allow.ids(), ["bbc1", "bbc2", "itv", "", "sky1"]);
        assert!(allow.contains("sky1"));
        assert!(allow.contains(""));
    }

    #[test]
    fn test_blank_filter_keeps_empty_ids() {
        let xml = r#"<tv>
  <channel id=""/>
  <channel id="bbc1"/>
  <programme start="20240101100000 +0000" channel=""><title>Blank</title></programme>
  <programme start="20240101100000 +0000" channel="bbc1"><title>News</title></programme>
</tv>"#;
        let mut doc = Document::parse(xml).unwrap();
        let mut allow = ChannelAllowList::new();
        allow.extend_from_list("");

        assert_eq!(filter_channels(&mut doc, &allow), 2);
        assert_eq!(doc.channels().filter_map(|c| c.id()).collect::<Vec<_>>(), [""]);
        assert_eq!(titles(&doc), vec!["Blank"]);
    }

    #[test]
    fn test_missing_attributes_are_warned() {
        let mut doc = Document::parse(GUIDE).unwrap();
        let mut allow = ChannelAllowList::new();
        allow.extend_from_list("bbc1,itv");

        let (removed, logs) = capture_warnings(|| filter_channels(&mut doc, &allow));
        assert_eq!(removed, 0);
        assert_eq!(logs.count("channel element without id"), 1);
        assert_eq!(logs.count("programme element without channel"), 1);

        let (_, logs) = capture_warnings(|| {
            filter_by_date(&mut doc, "20250101000000", DEFAULT_DATE_FILTER_OFFSET)
        });
        assert_eq!(logs.count("programme element without start"), 1);
    }

    #[test]
    fn test_allow_list_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChannelAllowList::new()
            .extend_from_file(&dir.path().join("nope.txt"))
            .unwrap_err();
        assert!(matches!(err, XmltvError::FilterFileMissing(_)));
    }

    #[test]
    fn test_filter_channels() {
        let mut doc = Document::parse(GUIDE).unwrap();
        let mut allow = ChannelAllowList::new();
        allow.extend_from_list("bbc1");

        let removed = filter_channels(&mut doc, &allow);

        assert_eq!(removed, 2);
        // the id-less channel and the channel-less programme stay
        assert_eq!(doc.channel_count(), 2);
        assert_eq!(titles(&doc), vec!["Late", "Midnight", "Orphan"]);
    }

    #[test]
    fn test_filter_channels_empty_list() {
        let mut doc = Document::parse(GUIDE).unwrap();
        filter_channels(&mut doc, &ChannelAllowList::new());

        assert!(doc.channels().all(|c| c.id().is_none()));
        assert!(doc.programmes().all(|p| p.channel().is_none()));
        assert_eq!(doc.programme_count(), 1);
    }

    #[test]
    fn test_filter_by_date() {
        let mut doc = Document::parse(GUIDE).unwrap();
        let removed = filter_by_date(&mut doc, "20250101000000", DEFAULT_DATE_FILTER_OFFSET);

        assert_eq!(removed, 2);
        assert_eq!(titles(&doc), vec!["Late", "Orphan"]);
        assert_eq!(doc.channel_count(), 3);
    }

    #[test]
    fn test_filter_by_date_prefix() {
        let mut doc = Document::parse(GUIDE).unwrap();
        // a shorter cutoff still compares as a prefix
        filter_by_date(&mut doc, "20250102", DEFAULT_DATE_FILTER_OFFSET);
        assert_eq!(titles(&doc), vec!["Late", "Midnight", "Orphan"]);
    }
}
