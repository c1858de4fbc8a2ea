//! LOGIN command handler. Accepts any credentials; authentication
//! failures are not what these tests exercise.
//!
//! With `login_capabilities` set on the fixture, the completion carries
//! a `[CAPABILITY ...]` response code (RFC 3501 servers do this to save
//! the client a post-login CAPABILITY round trip).

use crate::fake_imap::handlers::write_line;
use crate::fake_imap::mailbox::Fixture;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    fixture: &Mutex<Fixture>,
    stream: &mut BufReader<S>,
) {
    let inline_caps = {
        let f = fixture.lock().unwrap();
        f.login_capabilities.then(|| f.capability_list())
    };
    let resp = match inline_caps {
        Some(caps) => format!("{tag} OK [CAPABILITY {caps}] LOGIN completed\r\n"),
        None => format!("{tag} OK LOGIN completed\r\n"),
    };
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::FixtureBuilder;
    use tokio::io::BufReader;

    async fn run(fixture: Fixture) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);
        handle_login("a1", &Mutex::new(fixture), &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn plain_completion_by_default() {
        let output = run(FixtureBuilder::new().build()).await;
        assert_eq!(output, "a1 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn inlines_capabilities_when_configured() {
        let output = run(FixtureBuilder::new().with_login_capabilities().build()).await;
        assert_eq!(
            output,
            "a1 OK [CAPABILITY IMAP4rev1 UIDPLUS] LOGIN completed\r\n"
        );
    }
}
