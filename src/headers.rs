//! Header field logging for fetched messages
//!
//! The FETCH command asks for a `HEADER.FIELDS (date from subject)`
//! section alongside the full body. Those bytes are buffered here and,
//! once the section is complete, decoded and logged so a run's output
//! shows what was downloaded.

use std::collections::BTreeMap;
use tracing::{Level, debug, info, warn};

#[derive(Debug, Default)]
pub struct HeaderPrinter {
    buffer: Vec<u8>,
    fields: BTreeMap<String, String>,
}

impl HeaderPrinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a chunk of the header section.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode and log the buffered fields, then reset.
    ///
    /// Short-circuits when INFO logging is off. Decode failures are
    /// logged and never abort the session; whatever fields were decoded
    /// before the failure still get printed.
    pub fn print(&mut self) {
        if !tracing::event_enabled!(Level::INFO) {
            self.buffer.clear();
            return;
        }
        if tracing::event_enabled!(Level::DEBUG) {
            debug!("Header: |{}|", String::from_utf8_lossy(&self.buffer));
        }

        match mailparse::parse_headers(&self.buffer) {
            Ok((headers, _)) => {
                for header in &headers {
                    self.fields
                        .insert(header.get_key().to_ascii_uppercase(), header.get_value());
                }
            }
            Err(e) => warn!("header decode failed: {e}"),
        }
        for (name, body) in &self.fields {
            info!("{name:<10} {body}");
        }

        self.buffer.clear();
        self.fields.clear();
    }
}
