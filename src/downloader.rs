//! Command driver and read loop
//!
//! `Downloader` sequences one IMAP session from greeting to LOGOUT as a
//! chain of linear async steps: wait for (or request) capabilities, log
//! in, reconcile a recovered journal if one existed, then select, fetch,
//! and optionally store-and-expunge. At most one command is outstanding;
//! a command completes when its tagged response has been parsed, and all
//! untagged data for it has already passed through the parser adapter by
//! then.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::capability::Capability;
use crate::command::{self, TagGenerator};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::maildir::Maildir;
use crate::parser::{ResponseParser, Status};
use crate::sequence::SequenceSet;
use crate::session::Session;
use crate::signals::ShutdownSignal;
use crate::state::ConnectionState;
use crate::timer::FetchTimer;
use crate::transport::{self, Transport};

/// Which high-level flow this run performs. Cleanup is chosen when a
/// journal from a prior run was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Download,
    Cleanup,
}

/// State recovered from the journal before any network activity.
#[derive(Debug)]
struct Recovery {
    task: Task,
    mailbox: Option<String>,
    uidvalidity: u32,
    uids: SequenceSet,
}

impl Recovery {
    /// Consume the journal: read it, then unlink it. Whatever debt it
    /// carried now lives only in this process until it is either
    /// expunged server-side or journaled again.
    fn consume(path: &Path) -> Result<Self> {
        match Journal::load(path)? {
            Some(journal) => {
                info!("Reading journal {} ...", path.display());
                fs::remove_file(path)?;
                Ok(Self {
                    task: Task::Cleanup,
                    mailbox: Some(journal.mailbox),
                    uidvalidity: journal.uidvalidity,
                    uids: SequenceSet::from_ranges(journal.uids),
                })
            }
            None => Ok(Self {
                task: Task::Download,
                mailbox: None,
                uidvalidity: 0,
                uids: SequenceSet::new(),
            }),
        }
    }
}

pub struct Downloader<S> {
    transport: Transport<S>,
    parser: ResponseParser,
    session: Session,
    timer: FetchTimer,
    tags: TagGenerator,
    config: Config,
    task: Task,
    shutdown: ShutdownSignal,
    read_buf: Vec<u8>,
}

impl Downloader<tokio_rustls::client::TlsStream<TcpStream>> {
    /// Recover the journal, then open the TLS connection.
    pub async fn connect(config: Config, shutdown: ShutdownSignal) -> Result<Self> {
        let recovery = Recovery::consume(&config.journal_file)?;
        let transport = transport::connect(&config).await?;
        Self::assemble(config, transport, shutdown, recovery)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Downloader<S> {
    fn assemble(
        config: Config,
        transport: Transport<S>,
        shutdown: ShutdownSignal,
        recovery: Recovery,
    ) -> Result<Self> {
        let maildir = Maildir::open(&config.maildir)?;
        let timer = FetchTimer::new(transport.byte_counter());
        let mailbox = recovery
            .mailbox
            .unwrap_or_else(|| config.mailbox.clone());
        let mut session = Session::new(
            maildir,
            mailbox,
            timer.messages_counter(),
            config.simulate_error,
        );
        session.uidvalidity = recovery.uidvalidity;
        session.uids = recovery.uids;
        Ok(Self {
            transport,
            parser: ResponseParser::new(),
            session,
            timer,
            tags: TagGenerator::new(),
            config,
            task: recovery.task,
            shutdown,
            read_buf: vec![0u8; 8192],
        })
    }

    /// Run the complete lifecycle. On every exit path the journal is
    /// rewritten (best-effort) when deletion debt remains.
    pub async fn run(mut self) -> Result<()> {
        let result = self.drive().await;
        self.write_journal();
        self.session.state = ConnectionState::End;
        result
    }

    async fn drive(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Established)?;
        self.pre_login().await?;
        if self.quitting() {
            return Ok(());
        }
        match self.task {
            Task::Cleanup => {
                self.cleanup().await?;
                if self.quitting() {
                    return Ok(());
                }
                if self.config.cleanup_only {
                    self.logout().await?;
                    self.quit_if_needed().await;
                } else {
                    self.download().await?;
                }
            }
            Task::Download => self.download().await?,
        }
        Ok(())
    }

    // ── Journal ────────────────────────────────────────────────────

    fn write_journal(&self) {
        if !self.config.delete || self.session.uids.is_empty() {
            return;
        }
        let path = &self.config.journal_file;
        info!("Writing journal {} ...", path.display());
        let journal = Journal {
            mailbox: self.session.mailbox.clone(),
            uidvalidity: self.session.uidvalidity,
            uids: self.session.uids.ranges().to_vec(),
        };
        // Teardown must not double-fault; a failed write loses only the
        // cleanup shortcut, not any mail.
        if let Err(e) = journal.store(path) {
            warn!("journal write failed: {e}");
        }
    }

    // ── State machine ──────────────────────────────────────────────

    /// Advance the connection state. A no-op once the session is
    /// quitting: the only remaining legal move is made by `quit` itself.
    fn set_state(&mut self, next: ConnectionState) -> Result<()> {
        if self.quitting() {
            return Ok(());
        }
        if !self.session.state.can_advance(next) {
            return Err(Error::Protocol(format!(
                "illegal state transition {} -> {next}",
                self.session.state
            )));
        }
        trace!("state {} -> {next}", self.session.state);
        self.session.state = next;
        Ok(())
    }

    fn quitting(&self) -> bool {
        self.session.state >= ConnectionState::LoggedOut
    }

    // ── High-level flows ───────────────────────────────────────────

    /// Give the greeting `greeting_wait` to announce capabilities, then
    /// ask explicitly if it did not, and log in. The elapsed timeout is
    /// a normal outcome, not an error.
    async fn pre_login(&mut self) -> Result<()> {
        let wait = Duration::from_millis(self.config.greeting_wait_ms);
        match tokio::time::timeout(wait, self.read_until_capabilities()).await {
            Ok(result) => result?,
            Err(_) => debug!(
                "no capabilities in the greeting after {}ms",
                self.config.greeting_wait_ms
            ),
        }
        if self.quitting() {
            return Ok(());
        }
        self.cond_capabilities().await?;
        self.set_state(ConnectionState::GotInitialCapabilities)?;
        if self.quitting() {
            return Ok(());
        }
        self.login().await?;
        self.set_state(ConnectionState::LoggedIn)?;
        if self.quitting() {
            return Ok(());
        }
        // The post-login capability set may differ from the greeting's.
        self.cond_capabilities().await?;
        self.set_state(ConnectionState::GotCapabilities)
    }

    async fn read_until_capabilities(&mut self) -> Result<()> {
        while !self.session.caps_announced && !self.quitting() {
            if !self.read_and_parse().await? {
                break;
            }
        }
        Ok(())
    }

    /// Issue CAPABILITY only when no listing has been received yet.
    async fn cond_capabilities(&mut self) -> Result<()> {
        if self.session.capabilities.is_empty() {
            self.simple_command("CAPABILITY", command::capability).await
        } else {
            debug!("not fetching capabilities (already received)");
            Ok(())
        }
    }

    async fn login(&mut self) -> Result<()> {
        if self.quitting() {
            return Ok(());
        }
        if !self.session.has(&Capability::Imap4rev1) {
            return Err(Error::Protocol(
                "server has no IMAP4rev1 capability".into(),
            ));
        }
        if self.session.has(&Capability::LoginDisabled) {
            return Err(Error::Protocol(
                "cannot login because server has LOGINDISABLED".into(),
            ));
        }
        debug!("Clearing capabilities");
        self.session.capabilities.clear();
        self.session.exists = 0;
        self.session.recent = 0;
        // uidvalidity and the UID set survive: they may have been seeded
        // from the journal.
        let tag = self.tags.next_tag();
        let line = command::login(&tag, &self.config.username, &self.config.password);
        let cmd_display = format!("{tag} LOGIN {} <redacted>", self.config.username);
        self.run_command("LOGIN", &tag, &line, &cmd_display).await
    }

    /// Reconcile deletion debt recovered from a prior run's journal:
    /// select the journal's mailbox, flag its UIDs deleted, expunge.
    ///
    /// Runs entirely within `SELECTED_MAILBOX`; the `STORED`/`EXPUNGED`
    /// gateway states belong to the download phase, which keeps the
    /// lifecycle monotone when cleanup chains into a download on the
    /// same connection.
    async fn cleanup(&mut self) -> Result<()> {
        self.select().await?;
        if self.quitting() {
            return Ok(());
        }
        if self.session.uids.is_empty() {
            // UIDVALIDITY changed during SELECT; the recorded UIDs were
            // meaningless and there is nothing left to delete.
            debug!("no cleanup debt left after SELECT");
        } else {
            self.store().await?;
            if self.quitting() {
                return Ok(());
            }
            self.uid_or_simple_expunge().await?;
            if self.quitting() {
                return Ok(());
            }
        }
        self.session.uids.clear();
        self.session.mailbox = self.config.mailbox.clone();
        info!("Deleting messages from last time ... finished");
        Ok(())
    }

    async fn download(&mut self) -> Result<()> {
        self.select().await?;
        if self.quitting() {
            return Ok(());
        }
        if self.session.exists == 0 {
            info!("Mailbox {} is empty.", self.session.mailbox);
            self.logout().await?;
            self.quit_if_needed().await;
            return Ok(());
        }
        info!("Fetching into {} ...", self.config.maildir.display());
        self.set_state(ConnectionState::Fetching)?;
        self.timer.start();
        let fetched = self.fetch().await;
        self.timer.stop();
        fetched?;
        if self.quitting() {
            return Ok(());
        }
        self.set_state(ConnectionState::Fetched)?;
        if self.config.delete && !self.session.uids.is_empty() {
            self.store().await?;
            self.set_state(ConnectionState::Stored)?;
            if self.quitting() {
                return Ok(());
            }
            self.uid_or_simple_expunge().await?;
            self.set_state(ConnectionState::Expunged)?;
            if self.quitting() {
                return Ok(());
            }
            self.session.uids.clear();
        }
        self.logout().await?;
        self.quit_if_needed().await;
        Ok(())
    }

    // ── Individual commands ────────────────────────────────────────

    async fn select(&mut self) -> Result<()> {
        let mailbox = self.session.mailbox.clone();
        self.simple_command("SELECT", |tag| command::select(tag, &mailbox))
            .await?;
        self.set_state(ConnectionState::SelectedMailbox)
    }

    async fn fetch(&mut self) -> Result<()> {
        self.simple_command("FETCH", command::fetch_all).await
    }

    async fn store(&mut self) -> Result<()> {
        let set = self.session.uids.clone();
        self.simple_command("STORE", |tag| command::uid_store_deleted(tag, &set))
            .await
    }

    /// `UID EXPUNGE` removes exactly our UIDs; without UIDPLUS the plain
    /// EXPUNGE fallback removes everything flagged `\Deleted`.
    async fn uid_or_simple_expunge(&mut self) -> Result<()> {
        let has_uidplus = self.session.has(&Capability::UidPlus);
        debug!("Has UIDPLUS capability: {has_uidplus}");
        if has_uidplus {
            let set = self.session.uids.clone();
            self.simple_command("UID EXPUNGE", |tag| command::uid_expunge(tag, &set))
                .await
        } else {
            self.simple_command("EXPUNGE", command::expunge).await
        }
    }

    async fn logout(&mut self) -> Result<()> {
        if self.quitting() {
            return Ok(());
        }
        self.set_state(ConnectionState::LoggingOut)?;
        self.simple_command("LOGOUT", command::logout).await
    }

    /// Jump to `LOGGED_OUT` and close the transport gracefully. Errors
    /// during the close are expected noise at this point.
    async fn quit(&mut self) {
        debug!("quitting");
        self.session.state = ConnectionState::LoggedOut;
        if let Err(e) = self.transport.finish().await {
            debug!("transport shutdown: {e}");
        }
    }

    async fn quit_if_needed(&mut self) {
        if !self.quitting() {
            self.quit().await;
        }
    }

    // ── Read loop ──────────────────────────────────────────────────

    async fn simple_command(
        &mut self,
        name: &str,
        build: impl FnOnce(&str) -> String,
    ) -> Result<()> {
        let tag = self.tags.next_tag();
        let line = build(&tag);
        let cmd_display = line.trim_end().to_string();
        self.run_command(name, &tag, &line, &cmd_display).await
    }

    /// Issue one command and pump the read loop until its tagged
    /// response has been parsed.
    async fn run_command(&mut self, name: &str, tag: &str, line: &str, cmd_display: &str) -> Result<()> {
        if self.quitting() {
            return Ok(());
        }
        trace!("C: {cmd_display}");
        self.transport.push_write(line.as_bytes()).await?;
        loop {
            if !self.read_and_parse().await? {
                // Quit or benign close abandoned the command.
                return Ok(());
            }
            if let Some(response) = self.session.take_tagged() {
                if response.tag != tag {
                    return Err(Error::Parse(format!(
                        "tagged response {} does not match command {tag}",
                        response.tag
                    )));
                }
                return match response.status {
                    Status::Ok => Ok(()),
                    status => Err(Error::Imap(format!(
                        "{name} failed: {status} {}",
                        response.text
                    ))),
                };
            }
        }
    }

    /// One read→parse step, racing the transport against the shutdown
    /// channel. Returns `false` when reading should stop: quit was
    /// requested, or the connection closed benignly after logout.
    async fn read_and_parse(&mut self) -> Result<bool> {
        enum Event {
            Signal(bool),
            Read(std::io::Result<usize>),
        }
        let event = tokio::select! {
            changed = self.shutdown.changed() => Event::Signal(changed.is_ok()),
            read = self.transport.read_some(&mut self.read_buf) => Event::Read(read),
        };
        match event {
            Event::Signal(sender_alive) => {
                let count = if sender_alive {
                    *self.shutdown.borrow_and_update()
                } else {
                    // A vanished controller counts as one polite request.
                    1
                };
                if count >= 2 {
                    return Err(Error::Interrupted);
                }
                info!("shutdown requested");
                self.quit().await;
                Ok(false)
            }
            Event::Read(Ok(0)) => {
                if self.quitting() {
                    Ok(false)
                } else {
                    Err(Error::Imap("server closed the connection".into()))
                }
            }
            Event::Read(Ok(n)) => {
                self.parser.feed(&self.read_buf[..n], &mut self.session)?;
                Ok(true)
            }
            Event::Read(Err(e)) => {
                if self.quitting() && transport::is_benign_close(&e) {
                    debug!("clean close after logout: {e}");
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }
}
