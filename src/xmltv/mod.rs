//! XMLTV (program guide) module
//!
//! Contains the document tree and the merge, filter and time shift passes
//! that run over it.

mod document;
mod filter;
mod merge;
mod shift;
pub mod time;

// Re-export public types
pub use document::{Channel, Document, Element, Item, Node, Programme};
pub use filter::{filter_by_date, filter_channels, ChannelAllowList, DEFAULT_DATE_FILTER_OFFSET};
pub use merge::merge_documents;
pub use shift::{normalize_utc, shift_programmes};
pub use time::{format_duration, ShiftDirection, TimeShift, Timestamp};
