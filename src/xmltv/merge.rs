//! Combining several guides into one

use std::collections::HashSet;

use tracing::debug;

use super::document::{Document, Item};

impl Document {
    /// Move the channels and programmes of `other` into this document.
    ///
    /// Programmes are always appended. A channel is appended only if no channel
    /// with the same id is present yet, so the first occurrence wins. Other
    /// root children of `other` are discarded.
    pub fn absorb(&mut self, other: Document) {
        let mut known: HashSet<String> = self
            .channels()
            .filter_map(|c| c.id())
            .map(str::to_string)
            .collect();

        for item in other.items {
            match item {
                Item::Programme(programme) => self.items.push(Item::Programme(programme)),
                Item::Channel(channel) => {
                    if let Some(id) = channel.id() {
                        if !known.insert(id.to_string()) {
                            debug!("Dropping duplicate channel {}", id);
                            continue;
                        }
                    }
                    self.items.push(Item::Channel(channel));
                }
                Item::Other(_) => {}
            }
        }
    }
}

/// Merge `documents` into the first one. `None` for an empty input.
pub fn merge_documents<I>(documents: I) -> Option<Document>
where
    I: IntoIterator<Item = Document>,
{
    let mut documents = documents.into_iter();
    let mut primary = documents.next()?;
    for secondary in documents {
        primary.absorb(secondary);
    }
    Some(primary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE_A: &str = r#"<tv>
  <channel id="bbc1"><display-name>BBC One</display-name></channel>
  <programme start="20240101100000 +0000" stop="20240101110000 +0000" channel="bbc1"><title>News</title></programme>
</tv>"#;

    const GUIDE_B: &str = r#"<tv generator-info-name="other">
  <note/>
  <channel id="bbc1"><display-name>BBC 1 (duplicate)</display-name></channel>
  <channel id="itv"><display-name>ITV</display-name></channel>
  <programme start="20240101120000 +0000" stop="20240101130000 +0000" channel="itv"><title>Quiz</title></programme>
  <programme start="20240101100000 +0000" stop="20240101110000 +0000" channel="ghost"/>
</tv>"#;

    #[test]
    fn test_merge_with_itself() {
        let doc = Document::parse(GUIDE_A).unwrap();
        let merged = merge_documents([doc.clone(), doc]).unwrap();
        assert_eq!(merged.channel_count(), 1);
        assert_eq!(merged.programme_count(), 2);
    }

    #[test]
    fn test_first_channel_wins() {
        let merged = merge_documents([
            Document::parse(GUIDE_A).unwrap(),
            Document::parse(GUIDE_B).unwrap(),
        ])
        .unwrap();

        let ids: Vec<&str> = merged.channels().filter_map(|c| c.id()).collect();
        assert_eq!(ids, vec!["bbc1", "itv"]);
        let bbc1 = merged.channels().next().unwrap();
        assert_eq!(bbc1.0.child("display-name").unwrap().text(), "BBC One");

        // programmes referencing unknown channels are merged as-is
        assert_eq!(merged.programme_count(), 3);
        // root of the primary document is kept, extras from secondaries are not
        assert!(merged.root_attributes.is_empty());
        assert_eq!(merged.items.len(), 5);
    }

    #[test]
    fn test_merge_keeps_document_order() {
        let merged = merge_documents([
            Document::parse(GUIDE_B).unwrap(),
            Document::parse(GUIDE_A).unwrap(),
        ])
        .unwrap();

        let channels: Vec<Option<&str>> = merged.programmes().map(|p| p.channel()).collect();
        assert_eq!(channels, vec![Some("itv"), Some("ghost"), Some("bbc1")]);
        assert!(matches!(merged.items[0], Item::Other(_)));
    }

    #[test]
    fn test_merge_nothing() {
        assert!(merge_documents(Vec::new()).is_none());
    }
}
