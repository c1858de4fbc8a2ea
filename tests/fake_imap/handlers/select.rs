//! SELECT command handler.
//!
//! Responds with the metadata the downloader acts on: `* N EXISTS`
//! drives the fetch-or-logout decision and `[UIDVALIDITY]` drives UID
//! set invalidation. Any mailbox name is accepted; the fixture models a
//! single mailbox.

use crate::fake_imap::handlers::write_line;
use crate::fake_imap::mailbox::Fixture;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    fixture: &Mutex<Fixture>,
    stream: &mut BufReader<S>,
) {
    let (exists, uidvalidity, uidnext) = {
        let f = fixture.lock().unwrap();
        let live = f.live_messages();
        let uidnext = live.iter().map(|m| m.uid).max().map_or(1, |max| max + 1);
        (live.len(), f.uidvalidity, uidnext)
    };

    let _ = write_line(
        stream,
        "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n",
    )
    .await;
    let _ = write_line(stream, &format!("* {exists} EXISTS\r\n")).await;
    let _ = write_line(stream, "* 0 RECENT\r\n").await;
    let _ = write_line(stream, &format!("* OK [UIDVALIDITY {uidvalidity}]\r\n")).await;
    let _ = write_line(stream, &format!("* OK [UIDNEXT {uidnext}]\r\n")).await;
    let _ = write_line(
        stream,
        "* OK [PERMANENTFLAGS (\\Deleted \\Seen)] Limited\r\n",
    )
    .await;
    let _ = write_line(stream, &format!("{tag} OK [READ-WRITE] SELECT completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::FixtureBuilder;
    use tokio::io::BufReader;

    async fn run(fixture: Fixture) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);
        handle_select("a1", &Mutex::new(fixture), &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn reports_exists_and_uidvalidity() {
        let fixture = FixtureBuilder::new()
            .uidvalidity(42)
            .message(10, b"x")
            .message(11, b"y")
            .build();
        let output = run(fixture).await;
        assert!(output.contains("* 2 EXISTS"));
        assert!(output.contains("* OK [UIDVALIDITY 42]"));
        assert!(output.contains("* OK [UIDNEXT 12]"));
        assert!(output.contains("a1 OK"));
    }

    #[tokio::test]
    async fn deleted_messages_are_not_counted() {
        let mut fixture = FixtureBuilder::new().message(10, b"x").message(11, b"y").build();
        fixture.messages[0].deleted = true;
        let output = run(fixture).await;
        assert!(output.contains("* 1 EXISTS"));
    }
}
