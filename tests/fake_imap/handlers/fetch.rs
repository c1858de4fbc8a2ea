//! FETCH command handler.
//!
//! Streams every live message the way a real server answers
//! `FETCH 1:* (UID FLAGS BODY.PEEK[HEADER.FIELDS (...)] BODY.PEEK[])`:
//!
//! ```text
//! * <seq> FETCH (UID <uid> FLAGS (...) BODY[HEADER.FIELDS (DATE FROM SUBJECT)] {n}
//! <n bytes of header fields>
//!  BODY[] {m}
//! <m bytes of raw message>
//! )
//! ```
//!
//! The `{n}` literal markers end their lines; the payload follows as
//! exactly that many raw bytes. An optional stall before a configured
//! message gives shutdown tests a window to interrupt mid-FETCH.

use crate::fake_imap::handlers::{write_bytes, write_line};
use crate::fake_imap::mailbox::Fixture;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    fixture: &Mutex<Fixture>,
    stream: &mut BufReader<S>,
) {
    let (messages, stall_before, stall_ms) = {
        let f = fixture.lock().unwrap();
        (f.live_messages(), f.stall_before, f.stall_ms)
    };

    for (idx, msg) in messages.iter().enumerate() {
        if stall_before == Some(idx) {
            tokio::time::sleep(Duration::from_millis(stall_ms)).await;
        }

        let seq = idx + 1;
        let header = header_fields(&msg.raw);
        let flags = msg.flags.join(" ");
        let intro = format!(
            "* {seq} FETCH (UID {} FLAGS ({flags}) \
             BODY[HEADER.FIELDS (DATE FROM SUBJECT)] {{{}}}\r\n",
            msg.uid,
            header.len()
        );
        if write_line(stream, &intro).await.is_err() {
            return;
        }
        if write_bytes(stream, &header).await.is_err() {
            return;
        }
        let body_intro = format!(" BODY[] {{{}}}\r\n", msg.raw.len());
        if write_line(stream, &body_intro).await.is_err() {
            return;
        }
        if write_bytes(stream, &msg.raw).await.is_err() {
            return;
        }
        if write_line(stream, ")\r\n").await.is_err() {
            return;
        }
    }

    let _ = write_line(stream, &format!("{tag} OK FETCH completed\r\n")).await;
}

/// Extract the Date/From/Subject header lines of a raw message, plus
/// the blank line a HEADER.FIELDS section ends with.
fn header_fields(raw: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::new();
    for line in text.split("\r\n") {
        if line.is_empty() {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("date:") || lower.starts_with("from:") || lower.starts_with("subject:")
        {
            out.push_str(line);
            out.push_str("\r\n");
        }
    }
    out.push_str("\r\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::FixtureBuilder;
    use tokio::io::BufReader;

    fn raw_email() -> Vec<u8> {
        b"From: a@b.example\r\nSubject: Test\r\nX-Other: skip\r\n\r\nBody".to_vec()
    }

    async fn run(fixture: Fixture) -> String {
        let (client, server) = tokio::io::duplex(16384);
        let mut stream = BufReader::new(server);
        handle_fetch("a1", &Mutex::new(fixture), &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn streams_uid_flags_and_both_sections() {
        let fixture = FixtureBuilder::new()
            .flagged_message(42, &["\\Seen"], &raw_email())
            .build();
        let output = run(fixture).await;

        assert!(output.contains("* 1 FETCH (UID 42 FLAGS (\\Seen)"));
        assert!(output.contains("BODY[HEADER.FIELDS (DATE FROM SUBJECT)]"));
        assert!(output.contains("From: a@b.example"));
        // The header section carries only the requested fields.
        let header_part = output.split(" BODY[] ").next().unwrap();
        assert!(!header_part.contains("X-Other"));
        assert!(output.contains("a1 OK FETCH completed"));
    }

    #[tokio::test]
    async fn literal_length_matches_body() {
        let raw = raw_email();
        let fixture = FixtureBuilder::new().message(1, &raw).build();
        let output = run(fixture).await;
        assert!(output.contains(&format!(" BODY[] {{{}}}", raw.len())));
    }

    #[tokio::test]
    async fn empty_mailbox_sends_only_the_completion() {
        let fixture = FixtureBuilder::new().build();
        let output = run(fixture).await;
        assert_eq!(output, "a1 OK FETCH completed\r\n");
    }
}
