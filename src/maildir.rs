//! Minimal Maildir delivery primitive
//!
//! Messages are streamed into a uniquely named file under `tmp/` and
//! atomically renamed into `new/` (unflagged) or `cur/` (with a
//! `:2,<flags>` info suffix) once complete. The rename is the durability
//! contract: a reader never observes a partial message.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static DELIVERY_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct Maildir {
    root: PathBuf,
}

impl Maildir {
    /// Open a Maildir root, creating `tmp/`, `new/` and `cur/` as needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        for sub in ["tmp", "new", "cur"] {
            fs::create_dir_all(root.join(sub))?;
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Produce a unique delivery name: `<secs>.M<micros>P<pid>Q<seq>.<host>`.
    #[must_use]
    pub fn create_tmp_name(&self) -> String {
        let now = chrono::Utc::now();
        let seq = DELIVERY_SEQ.fetch_add(1, Ordering::Relaxed);
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        format!(
            "{}.M{}P{}Q{}.{}",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            process::id(),
            seq,
            host
        )
    }

    /// Create and open a fresh temp file for one incoming message.
    pub fn start_delivery(&self) -> io::Result<Delivery> {
        let name = self.create_tmp_name();
        let tmp_path = self.root.join("tmp").join(&name);
        let file = File::create(&tmp_path)?;
        trace!("delivering into {}", tmp_path.display());
        Ok(Delivery {
            root: self.root.clone(),
            name,
            tmp_path,
            file,
            delivered: false,
        })
    }
}

/// One in-flight message delivery. Owns the open temp file until it is
/// renamed into place; an undelivered temp file is unlinked on drop so a
/// failed fetch leaves no debris in `tmp/`.
#[derive(Debug)]
pub struct Delivery {
    root: PathBuf,
    name: String,
    tmp_path: PathBuf,
    file: File,
    delivered: bool,
}

impl Delivery {
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk)
    }

    /// Finish an unflagged delivery: `tmp/<name>` -> `new/<name>`.
    pub fn deliver_new(mut self) -> io::Result<PathBuf> {
        let dest = self.root.join("new").join(&self.name);
        self.finish(&dest)?;
        Ok(dest)
    }

    /// Finish a flagged delivery: `tmp/<name>` -> `cur/<name>:2,<flags>`.
    /// `flags` must already be sorted.
    pub fn deliver_cur(mut self, flags: &str) -> io::Result<PathBuf> {
        let dest = self.root.join("cur").join(format!("{}:2,{flags}", self.name));
        self.finish(&dest)?;
        Ok(dest)
    }

    fn finish(&mut self, dest: &Path) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        fs::rename(&self.tmp_path, dest)?;
        self.delivered = true;
        Ok(())
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.delivered {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
