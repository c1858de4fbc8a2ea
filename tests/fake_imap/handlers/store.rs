//! UID STORE command handler.
//!
//! Supports the single form the downloader sends:
//! `UID STORE <set> +FLAGS.SILENT (\Deleted)`. Matching messages are
//! marked deleted; `.SILENT` means no untagged FETCH responses.

use crate::fake_imap::handlers::{in_set, parse_sequence_set, write_line};
use crate::fake_imap::mailbox::Fixture;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_uid_store<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    args: &str,
    fixture: &Mutex<Fixture>,
    stream: &mut BufReader<S>,
) {
    let set = args.split_whitespace().next().unwrap_or("");
    let ranges = parse_sequence_set(set);
    {
        let mut f = fixture.lock().unwrap();
        for msg in &mut f.messages {
            if in_set(&ranges, msg.uid) {
                msg.deleted = true;
            }
        }
    }
    let _ = write_line(stream, &format!("{tag} OK STORE completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::FixtureBuilder;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn marks_only_the_set_deleted() {
        let fixture = Mutex::new(
            FixtureBuilder::new()
                .message(10, b"a")
                .message(11, b"b")
                .message(12, b"c")
                .build(),
        );

        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);
        handle_uid_store("a1", "10:11 +FLAGS.SILENT (\\Deleted)", &fixture, &mut stream).await;
        drop(stream);
        drop(client);

        let f = fixture.lock().unwrap();
        assert!(f.messages[0].deleted);
        assert!(f.messages[1].deleted);
        assert!(!f.messages[2].deleted);
    }
}
