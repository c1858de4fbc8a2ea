//! CAPABILITY command handler.

use crate::fake_imap::handlers::write_line;
use crate::fake_imap::mailbox::Fixture;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_capability<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    fixture: &Mutex<Fixture>,
    stream: &mut BufReader<S>,
) {
    let caps = fixture.lock().unwrap().capability_list();
    let _ = write_line(stream, &format!("* CAPABILITY {caps}\r\n")).await;
    let _ = write_line(stream, &format!("{tag} OK CAPABILITY completed\r\n")).await;
}
