//! Merge -> filter -> shift -> report/serialize

use tracing::{debug, warn};

use crate::config::Options;
use crate::error::{Result, XmltvError};
use crate::report::{program_listing, ChannelReport, DayReport};
use crate::xmltv::{
    filter_by_date, filter_channels, merge_documents, normalize_utc, shift_programmes,
    ChannelAllowList, Document,
};

/// What a run produced
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to do; a warning has already been logged
    Skipped,
    /// Report lines for stdout
    Report(Vec<String>),
    /// Processed document to serialize
    Document(Document),
}

/// Read, merge, process and render the inputs named in `options`.
pub fn run(options: &Options) -> Result<Outcome> {
    if options.inputs.is_empty() {
        warn!("No files provided. Exiting.");
        return Ok(Outcome::Skipped);
    }

    let allow = match load_allow_list(options) {
        Ok(allow) => allow,
        Err(XmltvError::FilterFileMissing(path)) => {
            warn!("Channels filter file does not exist: {}", path.display());
            return Ok(Outcome::Skipped);
        }
        Err(e) => return Err(e),
    };

    if options.debug {
        if let Some(allow) = &allow {
            debug!("Filtering channels:\n{}", allow.ids().join("\n"));
        }
    }

    let documents = options
        .inputs
        .iter()
        .map(|path| Document::read_file(path))
        .collect::<Result<Vec<_>>>()?;
    let Some(mut doc) = merge_documents(documents) else {
        return Ok(Outcome::Skipped);
    };

    process(&mut doc, options, allow.as_ref());
    Ok(render(doc, options))
}

/// Build the channel allow-list from the flag/config entries and the filter
/// file. `None` when channel filtering was not requested.
pub fn load_allow_list(options: &Options) -> Result<Option<ChannelAllowList>> {
    if !options.filters_channels() {
        return Ok(None);
    }

    let mut allow = ChannelAllowList::new();
    for list in options.filter_channels.iter().flatten() {
        allow.extend_from_list(list);
    }
    if let Some(path) = &options.filter_channels_file {
        allow.extend_from_file(path)?;
    }
    Ok(Some(allow))
}

/// Apply the requested passes in order: channel filter, date filter, time
/// shift, UTC normalization.
pub fn process(doc: &mut Document, options: &Options, allow: Option<&ChannelAllowList>) {
    if let Some(allow) = allow {
        filter_channels(doc, allow);
    }
    if let Some(cutoff) = &options.filter_date {
        filter_by_date(doc, cutoff, &options.date_filter_offset);
    }
    if let Some(shift) = &options.shift {
        shift_programmes(doc, shift.to_delta());
    }
    if options.normalize_utc {
        normalize_utc(doc);
    }
}

/// Reports run in channel, day, programme order; without any report the
/// document itself is the output.
pub fn render(doc: Document, options: &Options) -> Outcome {
    if !options.wants_report() {
        return Outcome::Document(doc);
    }

    let mut lines = Vec::new();
    if options.print_channels {
        lines.extend(ChannelReport::build(&doc).lines());
    }
    if options.print_days {
        lines.extend(DayReport::build(&doc).lines());
    }
    if options.print_programs {
        lines.extend(program_listing(&doc, options.print_duration));
    }
    Outcome::Report(lines)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
