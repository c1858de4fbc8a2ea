//! Push parser for IMAP server responses
//!
//! Feeds on whatever byte chunks the transport hands over and emits
//! callbacks on a [`ResponseHandler`]. Responses are line-structured;
//! FETCH responses embed counted literals (`{n}` followed by exactly n
//! raw bytes) whose payload is streamed to the handler in the chunks it
//! arrives in, never buffered whole. That is what lets a message body
//! flow straight into a Maildir temp file while the surrounding syntax
//! is still being parsed.

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::flag::Flag;
use std::fmt;
use std::str;
use tracing::trace;

/// Completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        })
    }
}

/// A tagged command-completion response.
#[derive(Debug, Clone)]
pub struct TaggedResponse {
    pub tag: String,
    pub status: Status,
    pub text: String,
}

/// Callback surface the parser drives.
///
/// Callbacks fire in protocol order; everything belonging to one command
/// arrives before that command's [`tagged`](Self::tagged) completion.
/// The fallible callbacks let the adapter abort the session from inside
/// the parse (simulated errors, Maildir failures, missing UIDs).
pub trait ResponseHandler {
    /// A capability listing begins (untagged data or status code); the
    /// previous set is stale.
    fn capabilities_begin(&mut self);
    fn capability(&mut self, capability: Capability);
    fn capabilities_end(&mut self);
    fn exists(&mut self, count: u32);
    fn recent(&mut self, count: u32);
    fn uidvalidity(&mut self, value: u32);
    fn expunged(&mut self, _seq: u32) {}
    fn bye(&mut self, _text: &str) {}
    fn fetch_begin(&mut self, seq: u32) -> Result<()>;
    fn fetch_end(&mut self) -> Result<()>;
    fn uid(&mut self, uid: u32);
    fn flag(&mut self, flag: Flag);
    /// An empty section spec (`BODY[]`): the coming payload is a full body.
    fn section_empty(&mut self);
    /// Section payload is about to stream.
    fn body_begin(&mut self) -> Result<()>;
    fn body_bytes(&mut self, chunk: &[u8]) -> Result<()>;
    fn body_end(&mut self) -> Result<()>;
    fn tagged(&mut self, response: TaggedResponse);
}

/// Incremental response parser. Owns only the bytes of the line currently
/// being assembled plus the remaining length of an open literal.
#[derive(Debug, Default)]
pub struct ResponseParser {
    buf: Vec<u8>,
    /// Literal payload bytes still expected.
    literal: Option<usize>,
    /// Parenthesis depth of an open FETCH response, 0 outside one.
    fetch_depth: usize,
}

impl ResponseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk from the transport.
    pub fn feed<H: ResponseHandler>(&mut self, chunk: &[u8], handler: &mut H) -> Result<()> {
        self.buf.extend_from_slice(chunk);
        loop {
            if let Some(remaining) = self.literal {
                if self.buf.is_empty() {
                    return Ok(());
                }
                let take = remaining.min(self.buf.len());
                handler.body_bytes(&self.buf[..take])?;
                self.buf.drain(..take);
                if take == remaining {
                    self.literal = None;
                    handler.body_end()?;
                } else {
                    self.literal = Some(remaining - take);
                    return Ok(());
                }
            } else {
                let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") else {
                    return Ok(());
                };
                let line: Vec<u8> = self.buf.drain(..pos + 2).collect();
                self.line(&line[..pos], handler)?;
            }
        }
    }

    fn line<H: ResponseHandler>(&mut self, line: &[u8], handler: &mut H) -> Result<()> {
        let text = str::from_utf8(line)
            .map_err(|_| Error::Parse("response line is not valid UTF-8".into()))?;
        trace!("S: {text}");
        if self.fetch_depth > 0 {
            return self.fetch_segment(text, handler);
        }
        if let Some(rest) = text.strip_prefix("* ") {
            self.untagged(rest, handler)
        } else if text.starts_with('+') {
            // Command continuation; this client never sends literals.
            Ok(())
        } else {
            Self::tagged_line(text, handler)
        }
    }

    fn untagged<H: ResponseHandler>(&mut self, rest: &str, handler: &mut H) -> Result<()> {
        let (word, tail) = split_word(rest);
        if let Ok(n) = word.parse::<u32>() {
            let (kind, tail) = split_word(tail);
            match kind.to_ascii_uppercase().as_str() {
                "EXISTS" => handler.exists(n),
                "RECENT" => handler.recent(n),
                "EXPUNGE" => handler.expunged(n),
                "FETCH" => {
                    handler.fetch_begin(n)?;
                    return self.fetch_segment(tail, handler);
                }
                other => trace!("ignoring untagged data: {n} {other}"),
            }
            return Ok(());
        }
        match word.to_ascii_uppercase().as_str() {
            "OK" | "NO" | "BAD" | "PREAUTH" => Self::condition(tail, handler),
            "BYE" => {
                handler.bye(tail);
                Ok(())
            }
            "CAPABILITY" => {
                handler.capabilities_begin();
                for token in tail.split_whitespace() {
                    handler.capability(Capability::parse(token));
                }
                handler.capabilities_end();
                Ok(())
            }
            other => {
                trace!("ignoring untagged response: {other}");
                Ok(())
            }
        }
    }

    /// Status-code bracket of an OK/NO/BAD/PREAUTH condition.
    fn condition<H: ResponseHandler>(tail: &str, handler: &mut H) -> Result<()> {
        let Some(code) = tail.strip_prefix('[') else {
            return Ok(());
        };
        let Some(end) = code.find(']') else {
            return Err(Error::Parse(format!("unterminated status code: {tail}")));
        };
        let (name, args) = split_word(&code[..end]);
        match name.to_ascii_uppercase().as_str() {
            "CAPABILITY" => {
                handler.capabilities_begin();
                for token in args.split_whitespace() {
                    handler.capability(Capability::parse(token));
                }
                handler.capabilities_end();
            }
            "UIDVALIDITY" => {
                let value = args
                    .trim()
                    .parse()
                    .map_err(|e| Error::Parse(format!("bad UIDVALIDITY: {e}")))?;
                handler.uidvalidity(value);
            }
            // UIDNEXT, PERMANENTFLAGS, UNSEEN, READ-WRITE, ...
            _ => {}
        }
        Ok(())
    }

    fn tagged_line<H: ResponseHandler>(text: &str, handler: &mut H) -> Result<()> {
        let (tag, rest) = split_word(text);
        let (status_word, mut remainder) = split_word(rest);
        if tag.is_empty() || status_word.is_empty() {
            return Err(Error::Parse(format!("malformed response line: {text}")));
        }
        let status = match status_word.to_ascii_uppercase().as_str() {
            "OK" => Status::Ok,
            "NO" => Status::No,
            "BAD" => Status::Bad,
            _ => return Err(Error::Parse(format!("unrecognized response: {text}"))),
        };
        // A response code may ride on the completion, e.g.
        // `a002 OK [CAPABILITY IMAP4rev1 UIDPLUS] LOGIN completed`.
        if remainder.starts_with('[') {
            Self::condition(remainder, handler)?;
            if let Some(end) = remainder.find(']') {
                remainder = remainder[end + 1..].trim_start();
            }
        }
        handler.tagged(TaggedResponse {
            tag: tag.to_string(),
            status,
            text: remainder.to_string(),
        });
        Ok(())
    }

    /// One CRLF-delimited slice of an open FETCH response. Segments end
    /// either at a `{n}` literal marker or at the closing parenthesis.
    fn fetch_segment<H: ResponseHandler>(&mut self, seg: &str, handler: &mut H) -> Result<()> {
        let bytes = seg.as_bytes();
        let mut i = 0usize;
        let mut expect_uid = false;
        let mut await_flag_list = false;
        let mut in_flags = false;
        let mut pending_body = false;
        while i < bytes.len() {
            match bytes[i] {
                b' ' => i += 1,
                b'(' => {
                    if await_flag_list {
                        in_flags = true;
                        await_flag_list = false;
                    }
                    self.fetch_depth += 1;
                    i += 1;
                }
                b')' => {
                    if self.fetch_depth == 0 {
                        return Err(Error::Parse(format!("unbalanced FETCH response: {seg}")));
                    }
                    self.fetch_depth -= 1;
                    if in_flags {
                        in_flags = false;
                    } else if self.fetch_depth == 0 {
                        handler.fetch_end()?;
                    }
                    i += 1;
                }
                b'{' => {
                    let close = seg[i..]
                        .find('}')
                        .ok_or_else(|| Error::Parse(format!("unterminated literal: {seg}")))?
                        + i;
                    let n: usize = seg[i + 1..close]
                        .parse()
                        .map_err(|e| Error::Parse(format!("bad literal length: {e}")))?;
                    handler.body_begin()?;
                    if n == 0 {
                        handler.body_end()?;
                    } else {
                        self.literal = Some(n);
                    }
                    // The literal marker terminates the line.
                    return Ok(());
                }
                b'"' => {
                    let (value, next) = parse_quoted(seg, i)?;
                    if pending_body {
                        handler.body_begin()?;
                        handler.body_bytes(value.as_bytes())?;
                        handler.body_end()?;
                        pending_body = false;
                    }
                    i = next;
                }
                b'[' => {
                    // Section spec attached to the preceding BODY atom.
                    let close = seg[i..]
                        .find(']')
                        .ok_or_else(|| Error::Parse(format!("unterminated section: {seg}")))?
                        + i;
                    if seg[i + 1..close].is_empty() {
                        handler.section_empty();
                    }
                    pending_body = true;
                    i = close + 1;
                }
                _ => {
                    let start = i;
                    while i < bytes.len()
                        && !matches!(bytes[i], b' ' | b'(' | b')' | b'[' | b'{' | b'"')
                    {
                        i += 1;
                    }
                    let atom = &seg[start..i];
                    if in_flags {
                        handler.flag(Flag::parse(atom));
                    } else if expect_uid {
                        let uid = atom
                            .parse()
                            .map_err(|e| Error::Parse(format!("bad UID: {e}")))?;
                        handler.uid(uid);
                        expect_uid = false;
                    } else {
                        match atom.to_ascii_uppercase().as_str() {
                            "UID" => expect_uid = true,
                            "FLAGS" => await_flag_list = true,
                            "NIL" => pending_body = false,
                            // BODY itself, RFC822.SIZE values, ...
                            _ => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn split_word(s: &str) -> (&str, &str) {
    s.split_once(' ').unwrap_or((s, ""))
}

/// Parse an IMAP quoted-string starting at `start`; returns the unescaped
/// value and the index just past the closing quote.
fn parse_quoted(seg: &str, start: usize) -> Result<(String, usize)> {
    let bytes = seg.as_bytes();
    let mut value = String::new();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Ok((value, i + 1)),
            b'\\' if i + 1 < bytes.len() => {
                value.push(bytes[i + 1] as char);
                i += 2;
            }
            c => {
                value.push(c as char);
                i += 1;
            }
        }
    }
    Err(Error::Parse(format!("unterminated quoted string: {seg}")))
}
