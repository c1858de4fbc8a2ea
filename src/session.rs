//! Parser adapter: server responses become mailbox state and Maildir
//! side effects
//!
//! `Session` is the handler the response parser drives. It owns the
//! mailbox view (counts, UIDVALIDITY, the set of safely delivered UIDs),
//! the per-message scratch state, and the swappable body sink: header
//! sections collect in memory for logging, full bodies stream into a
//! Maildir temp file that is renamed into place when the section ends.

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::headers::HeaderPrinter;
use crate::maildir::{Delivery, Maildir};
use crate::parser::{ResponseHandler, TaggedResponse};
use crate::sequence::SequenceSet;
use crate::state::ConnectionState;

/// Destination for body-section payload.
#[derive(Debug)]
enum BodySink {
    /// Header sections: buffer for the header printer.
    Memory,
    /// Full bodies: an open Maildir temp file.
    File(Delivery),
}

pub(crate) struct Session {
    pub state: ConnectionState,
    pub capabilities: HashSet<Capability>,
    /// Set once a capability listing has completed; cancels the greeting
    /// wait.
    pub caps_announced: bool,
    /// Mailbox this session operates on. Reseeded from the journal
    /// during recovery, switched back to the configured mailbox when
    /// cleanup finishes.
    pub mailbox: String,
    pub exists: u32,
    pub recent: u32,
    pub uidvalidity: u32,
    /// UIDs whose messages reached `new/` or `cur/`; deletion candidates.
    pub uids: SequenceSet,

    // Per-message scratch.
    flags: Vec<char>,
    last_uid: u32,
    full_body: bool,
    sink: BodySink,

    maildir: Maildir,
    headers: HeaderPrinter,
    messages: Arc<AtomicU64>,
    simulate_error: u64,
    tagged: Option<TaggedResponse>,
}

impl Session {
    pub fn new(
        maildir: Maildir,
        mailbox: String,
        messages: Arc<AtomicU64>,
        simulate_error: u64,
    ) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            capabilities: HashSet::new(),
            caps_announced: false,
            mailbox,
            exists: 0,
            recent: 0,
            uidvalidity: 0,
            uids: SequenceSet::new(),
            flags: Vec::new(),
            last_uid: 0,
            full_body: false,
            sink: BodySink::Memory,
            maildir,
            headers: HeaderPrinter::new(),
            messages,
            simulate_error,
            tagged: None,
        }
    }

    pub fn has(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn take_tagged(&mut self) -> Option<TaggedResponse> {
        self.tagged.take()
    }

    /// Maildir info letters for the current message, sorted and deduped.
    fn maildir_flags(&self) -> String {
        let mut letters = self.flags.clone();
        letters.sort_unstable();
        letters.dedup();
        letters.into_iter().collect()
    }
}

impl ResponseHandler for Session {
    fn capabilities_begin(&mut self) {
        debug!("Clearing capabilities");
        self.capabilities.clear();
    }

    fn capability(&mut self, capability: Capability) {
        trace!("Got capability: {capability}");
        self.capabilities.insert(capability);
    }

    fn capabilities_end(&mut self) {
        debug!("finished retrieving capabilities");
        self.caps_announced = true;
    }

    fn exists(&mut self, count: u32) {
        debug!("Mailbox {} contains {} messages", self.mailbox, count);
        self.exists = count;
    }

    fn recent(&mut self, count: u32) {
        debug!("Mailbox {} has {} RECENT messages", self.mailbox, count);
        self.recent = count;
    }

    fn uidvalidity(&mut self, value: u32) {
        debug!("UIDVALIDITY: {value}");
        if self.uidvalidity != value {
            // Recorded UIDs are meaningless under a new validity token.
            debug!("Replacing UIDVALIDITY {} with {value}", self.uidvalidity);
            self.uids.clear();
        }
        self.uidvalidity = value;
    }

    fn fetch_begin(&mut self, seq: u32) -> Result<()> {
        self.flags.clear();
        if self.state == ConnectionState::Fetching {
            trace!("Fetching message: {seq}");
            self.last_uid = 0;
            self.full_body = false;
            let fetched = self.messages.load(Ordering::Relaxed);
            if self.simulate_error != 0 && fetched >= self.simulate_error {
                return Err(Error::Protocol(format!(
                    "simulated failure after {fetched} fetched messages"
                )));
            }
        }
        Ok(())
    }

    fn fetch_end(&mut self) -> Result<()> {
        if self.state == ConnectionState::Fetching {
            if self.last_uid == 0 {
                return Err(Error::Protocol(
                    "FETCH response did not carry a UID".into(),
                ));
            }
            debug!("Storing UID: {}", self.last_uid);
            self.uids.push(self.last_uid);
        }
        Ok(())
    }

    fn uid(&mut self, uid: u32) {
        if self.state == ConnectionState::Fetching {
            trace!("UID: {uid}");
            self.last_uid = uid;
        }
    }

    fn flag(&mut self, flag: Flag) {
        if let Some(letter) = flag.maildir_letter() {
            self.flags.push(letter);
        }
    }

    fn section_empty(&mut self) {
        self.full_body = true;
    }

    fn body_begin(&mut self) -> Result<()> {
        if self.state == ConnectionState::Fetching && self.full_body {
            let delivery = self.maildir.start_delivery()?;
            self.sink = BodySink::File(delivery);
        }
        Ok(())
    }

    fn body_bytes(&mut self, chunk: &[u8]) -> Result<()> {
        match &mut self.sink {
            BodySink::File(delivery) => delivery.write(chunk)?,
            BodySink::Memory => self.headers.feed(chunk),
        }
        Ok(())
    }

    fn body_end(&mut self) -> Result<()> {
        if self.state != ConnectionState::Fetching {
            return Ok(());
        }
        if self.full_body {
            if let BodySink::File(delivery) = mem::replace(&mut self.sink, BodySink::Memory) {
                let flags = self.maildir_flags();
                let dest = if flags.is_empty() {
                    delivery.deliver_new()?
                } else {
                    debug!("Using maildir flags: {flags}");
                    delivery.deliver_cur(&flags)?
                };
                trace!("Delivered {}", dest.display());
            }
            self.full_body = false;
            self.messages.fetch_add(1, Ordering::Relaxed);
        } else {
            self.headers.print();
        }
        Ok(())
    }

    fn bye(&mut self, text: &str) {
        debug!("Server closing the session: {text}");
    }

    fn tagged(&mut self, response: TaggedResponse) {
        self.tagged = Some(response);
    }
}
