//! XMLTV document tree
//!
//! Guides are read into an owned element tree so channel and programme
//! sub-content (display names, icons, descriptions, episode numbers...)
//! survives a merge/filter/shift round trip untouched. Only the attributes
//! this tool understands are given typed accessors.
//!
//! Input may be plain XML or gzip-compressed (.xml.gz); slightly broken
//! guides are cleaned up on the fly before they reach the XML reader.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use chrono::TimeDelta;
use flate2::read::GzDecoder;
use quick_xml::escape;
use quick_xml::events::{BytesDecl, BytesRef, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use tracing::{debug, warn};

use super::time::{self, Timestamp};
use crate::error::{Result, XmltvError};

pub const TAG_TV: &str = "tv";
pub const TAG_CHANNEL: &str = "channel";
pub const TAG_PROGRAMME: &str = "programme";
pub const TAG_TITLE: &str = "title";
pub const ATTR_ID: &str = "id";
pub const ATTR_CHANNEL: &str = "channel";
pub const ATTR_START: &str = "start";
pub const ATTR_STOP: &str = "stop";

const READ_BUFFER_SIZE: usize = 64 * 1024;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Element content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// Generic XML element, attributes kept in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite `key` in place, or append it if the element lacks it.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// First child element called `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// A `<channel>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel(pub Element);

impl Channel {
    pub fn id(&self) -> Option<&str> {
        self.0.attribute(ATTR_ID)
    }
}

/// A `<programme>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programme(pub Element);

impl Programme {
    pub fn channel(&self) -> Option<&str> {
        self.0.attribute(ATTR_CHANNEL)
    }

    pub fn start(&self) -> Option<&str> {
        self.0.attribute(ATTR_START)
    }

    pub fn stop(&self) -> Option<&str> {
        self.0.attribute(ATTR_STOP)
    }

    /// `None` when there is no `<title>` at all, `Some("")` for an empty one.
    pub fn title(&self) -> Option<String> {
        self.0.child(TAG_TITLE).map(Element::text)
    }

    pub fn start_time(&self) -> Result<Timestamp> {
        self.timestamp(ATTR_START)
    }

    pub fn stop_time(&self) -> Result<Timestamp> {
        self.timestamp(ATTR_STOP)
    }

    fn timestamp(&self, attr: &str) -> Result<Timestamp> {
        self.0
            .attribute(attr)
            .ok_or_else(|| XmltvError::MissingAttribute(attr.to_string()))
            .and_then(Timestamp::parse)
    }

    pub fn set_start(&mut self, ts: &Timestamp) {
        self.0.set_attribute(ATTR_START, ts.encode());
    }

    pub fn set_stop(&mut self, ts: &Timestamp) {
        self.0.set_attribute(ATTR_STOP, ts.encode());
    }

    /// Scheduled length. A programme that stops before it starts counts as
    /// zero and is reported once per call; missing or unreadable times
    /// count as zero silently.
    pub fn duration(&self) -> TimeDelta {
        let (Ok(start), Ok(stop)) = (self.start_time(), self.stop_time()) else {
            return TimeDelta::zero();
        };

        let elapsed = time::duration(&start, &stop);
        if elapsed < TimeDelta::zero() {
            warn!(
                "Program without correct start / stop fields: {}",
                self.title().unwrap_or_default()
            );
            return TimeDelta::zero();
        }
        elapsed
    }
}

/// Top-level child of the root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Channel(Channel),
    Programme(Programme),
    /// Anything else found under the root; kept for output only.
    Other(Element),
}

impl From<Element> for Item {
    fn from(element: Element) -> Self {
        match element.name.as_str() {
            TAG_CHANNEL => Item::Channel(Channel(element)),
            TAG_PROGRAMME => Item::Programme(Programme(element)),
            _ => Item::Other(element),
        }
    }
}

/// Parsed XMLTV document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root_name: String,
    pub root_attributes: Vec<(String, String)>,
    pub doctype: Option<String>,
    pub items: Vec<Item>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            root_name: TAG_TV.to_string(),
            root_attributes: Vec::new(),
            doctype: None,
            items: Vec::new(),
        }
    }
}

impl Document {
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.items.iter().filter_map(|item| match item {
            Item::Channel(c) => Some(c),
            _ => None,
        })
    }

    pub fn programmes(&self) -> impl Iterator<Item = &Programme> {
        self.items.iter().filter_map(|item| match item {
            Item::Programme(p) => Some(p),
            _ => None,
        })
    }

    pub fn programmes_mut(&mut self) -> impl Iterator<Item = &mut Programme> {
        self.items.iter_mut().filter_map(|item| match item {
            Item::Programme(p) => Some(p),
            _ => None,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels().count()
    }

    pub fn programme_count(&self) -> usize {
        self.programmes().count()
    }

    /// Drop the items at the given positions in one pass.
    pub fn remove_items(&mut self, doomed: &HashSet<usize>) {
        if doomed.is_empty() {
            return;
        }
        let mut index = 0;
        self.items.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });
    }

    fn from_root(root: Element, doctype: Option<String>) -> Self {
        let items = root
            .children
            .into_iter()
            .filter_map(|node| match node {
                Node::Element(e) => Some(Item::from(e)),
                Node::Text(_) => None,
            })
            .collect();

        Self {
            root_name: root.name,
            root_attributes: root.attributes,
            doctype,
            items,
        }
    }

    /// Parse a guide held in memory
    pub fn parse(xml: &str) -> Result<Document> {
        Self::parse_reader(xml.as_bytes(), Path::new("<inline>"))
    }

    /// Parse a guide from any buffered reader. `source` only labels errors.
    pub fn parse_reader<R: BufRead>(reader: R, source: &Path) -> Result<Document> {
        let mut xml_reader = Reader::from_reader(reader);
        // A bare `&` in guide text is kept as text instead of failing the read
        xml_reader.config_mut().allow_dangling_amp = true;
        let mut buf = Vec::with_capacity(8192);

        let mut stack: Vec<OpenElement> = Vec::new();
        let mut root: Option<Element> = None;
        let mut doctype = None;

        let xml_error = |position: u64, message: String| XmltvError::Xml {
            path: source.to_path_buf(),
            position,
            message,
        };

        loop {
            let position = xml_reader.buffer_position() as u64;
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.flush_text();
                    } else if root.is_some() {
                        return Err(xml_error(position, "multiple root elements".into()));
                    }
                    stack.push(OpenElement::new(element_from_start(e)));
                }
                Ok(Event::Empty(ref e)) => {
                    let element = element_from_start(e);
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.flush_text();
                            parent.element.children.push(Node::Element(element));
                        }
                        None if root.is_none() => root = Some(element),
                        None => return Err(xml_error(position, "multiple root elements".into())),
                    }
                }
                Ok(Event::End(_)) => {
                    let Some(mut open) = stack.pop() else {
                        return Err(xml_error(position, "unexpected closing tag".into()));
                    };
                    open.flush_text();
                    match stack.last_mut() {
                        Some(parent) => parent.element.children.push(Node::Element(open.element)),
                        None => root = Some(open.element),
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::GeneralRef(ref e)) => {
                    if let Some(open) = stack.last_mut() {
                        let name = String::from_utf8_lossy(e);
                        match resolve_reference(&name) {
                            Some(value) => open.text.push_str(&value),
                            None => {
                                open.text.push('&');
                                open.text.push_str(&name);
                                open.text.push(';');
                            }
                        }
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::DocType(ref e)) => {
                    doctype = Some(String::from_utf8_lossy(e).trim().to_string());
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(position, e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(xml_error(
                xml_reader.buffer_position() as u64,
                "unexpected end of document".into(),
            ));
        }
        let root = root
            .ok_or_else(|| xml_error(xml_reader.buffer_position() as u64, "no root element".into()))?;

        let document = Document::from_root(root, doctype);
        debug!(
            "{}: {} channels, {} programmes",
            source.display(),
            document.channel_count(),
            document.programme_count()
        );
        Ok(document)
    }

    /// Parse a guide file - auto-detects gzip compression
    pub fn read_file(path: &Path) -> Result<Document> {
        let metadata = std::fs::metadata(path).map_err(|e| XmltvError::io(path, e))?;
        if metadata.is_dir() {
            return Err(XmltvError::IsDirectory(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| XmltvError::io(path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        // Peek at the gzip magic number (1f 8b) without consuming it
        let is_gzip = reader
            .fill_buf()
            .map_err(|e| XmltvError::io(path, e))?
            .starts_with(&GZIP_MAGIC);

        if is_gzip {
            let decoder = GzDecoder::new(reader);
            let buf_reader = BufReader::with_capacity(READ_BUFFER_SIZE, decoder);
            Self::parse_reader(SanitizingBufReader::new(buf_reader), path)
        } else {
            Self::parse_reader(SanitizingBufReader::new(reader), path)
        }
    }

    /// Serialize as an indented XMLTV document
    pub fn write_to<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        if let Some(doctype) = &self.doctype {
            emit(
                &mut writer,
                Event::DocType(BytesText::from_escaped(doctype.as_str())),
            )?;
        }

        let root = start_tag(&self.root_name, &self.root_attributes);
        let root_end = root.to_end().into_owned();
        emit(&mut writer, Event::Start(root))?;
        for item in &self.items {
            let element = match item {
                Item::Channel(Channel(e)) | Item::Programme(Programme(e)) | Item::Other(e) => e,
            };
            write_element(&mut writer, element)?;
        }
        emit(&mut writer, Event::End(root_end))?;

        writer
            .get_mut()
            .write_all(b"\n")
            .map_err(|e| XmltvError::Write(e.to_string()))
    }
}

/// Element under construction while reading
struct OpenElement {
    element: Element,
    text: String,
}

impl OpenElement {
    fn new(element: Element) -> Self {
        Self {
            element,
            text: String::new(),
        }
    }

    /// Move pending text into the element; whitespace-only runs are layout.
    fn flush_text(&mut self) {
        if self.text.trim().is_empty() {
            self.text.clear();
            return;
        }
        let text = self.text.trim().to_string();
        self.text.clear();
        self.element.children.push(Node::Text(text));
    }
}

fn element_from_start(e: &BytesStart) -> Element {
    let attributes = e
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(attr.value.as_ref());
            (key, unescape_attribute(&raw))
        })
        .collect();

    Element {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
    }
}

fn start_tag<'a>(name: &'a str, attributes: &'a [(String, String)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    start
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    let start = start_tag(&element.name, &element.attributes);
    if element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    let end = start.to_end().into_owned();
    emit(writer, Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => emit(writer, Event::Text(BytesText::new(t)))?,
        }
    }
    emit(writer, Event::End(end))
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| XmltvError::Write(e.to_string()))
}

/// BufReader wrapper that replaces control characters illegal in XML 1.0
/// with spaces. Tab, newline and carriage return pass through. Bytes below
/// 0x20 never occur inside a multi-byte UTF-8 sequence, so this works on
/// raw reads without tracking character boundaries.
struct SanitizingBufReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
    filled: usize,
}

impl<R: Read> SanitizingBufReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            pos: 0,
            filled: 0,
        }
    }

    fn sanitize_byte(b: u8) -> u8 {
        match b {
            0x09 | 0x0A | 0x0D => b,
            0x00..=0x1F | 0x7F => b' ',
            _ => b,
        }
    }

    fn refill_buffer(&mut self) -> std::io::Result<()> {
        let n = self.inner.read(&mut self.buffer)?;
        for b in &mut self.buffer[..n] {
            *b = Self::sanitize_byte(*b);
        }
        self.pos = 0;
        self.filled = n;
        Ok(())
    }
}

impl<R: Read> Read for SanitizingBufReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let to_copy = available.len().min(buf.len());
        buf[..to_copy].copy_from_slice(&available[..to_copy]);
        self.consume(to_copy);
        Ok(to_copy)
    }
}

impl<R: Read> BufRead for SanitizingBufReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.pos >= self.filled {
            self.refill_buffer()?;
        }
        Ok(&self.buffer[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

/// Character or predefined entity reference by name (`amp`, `#8211`, `#x41`).
/// `None` for anything else, which callers keep literally.
fn resolve_reference(name: &str) -> Option<String> {
    match BytesRef::new(name).resolve_char_ref() {
        Ok(Some(c)) => Some(c.to_string()),
        Ok(None) => escape::resolve_predefined_entity(name).map(str::to_string),
        Err(_) => None,
    }
}

/// Unescape an attribute value. A bare `&` or an unknown entity makes the
/// strict pass fail; the value is then resolved reference by reference and
/// anything unresolvable is kept as written.
fn unescape_attribute(raw: &str) -> String {
    if let Ok(value) = escape::unescape(raw) {
        return value.into_owned();
    }

    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let resolved = rest
            .find(';')
            .and_then(|end| resolve_reference(&rest[1..end]).map(|value| (value, end)));
        match resolved {
            Some((value, end)) => {
                result.push_str(&value);
                rest = &rest[end + 1..];
            }
            None => {
                result.push('&');
                rest = &rest[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
