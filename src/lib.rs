//! Inspect and transform XMLTV program guides: merge several files, filter
//! by channel or date, shift or normalize programme times, and summarize
//! the result.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod xmltv;

#[cfg(test)]
mod test_log;
