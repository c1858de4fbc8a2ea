//! EXPUNGE and UID EXPUNGE command handlers.
//!
//! Plain EXPUNGE removes every message flagged `\Deleted`; the UIDPLUS
//! variant removes only flagged messages whose UID falls in the given
//! set. Each removal is announced with `* <seq> EXPUNGE`, where the
//! sequence number reflects the shrinking mailbox, as on a real server.

use crate::fake_imap::handlers::{in_set, parse_sequence_set, write_line};
use crate::fake_imap::mailbox::Fixture;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_uid_expunge<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    args: &str,
    fixture: &Mutex<Fixture>,
    stream: &mut BufReader<S>,
) {
    let set = args.split_whitespace().next().unwrap_or("");
    let ranges = parse_sequence_set(set);
    let removed = remove_matching(fixture, |uid| in_set(&ranges, uid));
    for seq in removed {
        let _ = write_line(stream, &format!("* {seq} EXPUNGE\r\n")).await;
    }
    let _ = write_line(stream, &format!("{tag} OK EXPUNGE completed\r\n")).await;
}

pub async fn handle_expunge<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    fixture: &Mutex<Fixture>,
    stream: &mut BufReader<S>,
) {
    let removed = remove_matching(fixture, |_| true);
    for seq in removed {
        let _ = write_line(stream, &format!("* {seq} EXPUNGE\r\n")).await;
    }
    let _ = write_line(stream, &format!("{tag} OK EXPUNGE completed\r\n")).await;
}

/// Remove deleted messages matching `include`, returning the 1-based
/// sequence numbers as observed at each removal.
fn remove_matching(fixture: &Mutex<Fixture>, include: impl Fn(u32) -> bool) -> Vec<u32> {
    let mut f = fixture.lock().unwrap();
    let mut seqs = Vec::new();
    loop {
        let Some(pos) = f
            .messages
            .iter()
            .position(|m| m.deleted && include(m.uid))
        else {
            break;
        };
        f.messages.remove(pos);
        seqs.push(u32::try_from(pos + 1).unwrap());
    }
    seqs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::FixtureBuilder;

    fn deleted_fixture() -> Mutex<Fixture> {
        let mut fixture = FixtureBuilder::new()
            .message(10, b"a")
            .message(11, b"b")
            .message(12, b"c")
            .build();
        fixture.messages[0].deleted = true;
        fixture.messages[1].deleted = true;
        Mutex::new(fixture)
    }

    #[test]
    fn plain_expunge_removes_all_deleted() {
        let fixture = deleted_fixture();
        let seqs = remove_matching(&fixture, |_| true);
        assert_eq!(seqs, vec![1, 1]);
        let f = fixture.lock().unwrap();
        assert_eq!(f.messages.len(), 1);
        assert_eq!(f.messages[0].uid, 12);
    }

    #[test]
    fn uid_expunge_respects_the_set() {
        let fixture = deleted_fixture();
        let ranges = parse_sequence_set("11");
        let seqs = remove_matching(&fixture, |uid| in_set(&ranges, uid));
        assert_eq!(seqs, vec![2]);
        let f = fixture.lock().unwrap();
        // UID 10 is still flagged but outside the set, so it survives.
        assert_eq!(f.messages.len(), 2);
        assert!(f.messages[0].deleted);
    }
}
