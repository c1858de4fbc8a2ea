//! Crash-recovery journal
//!
//! When a run with deletion enabled cannot finish its STORE/EXPUNGE, the
//! UIDs already delivered locally are server-side debt. The journal
//! persists `{mailbox, uidvalidity, uid ranges}` as JSON so the next run
//! can reconcile before downloading again.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub mailbox: String,
    pub uidvalidity: u32,
    /// Inclusive UID ranges, as exported by [`crate::SequenceSet::ranges`].
    pub uids: Vec<(u32, u32)>,
}

impl Journal {
    /// Read a journal. A missing file is the normal "no prior state"
    /// signal; anything else that prevents reading is fatal, since a
    /// half-understood journal would lose cleanup debt.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Journal(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        let journal = serde_json::from_str(&data)
            .map_err(|e| Error::Journal(format!("cannot parse {}: {e}", path.display())))?;
        Ok(Some(journal))
    }

    /// Write the journal: serialize to a sibling temp file, then rename
    /// into place.
    pub fn store(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Journal(format!("cannot serialize journal: {e}")))?;
        let tmp = tmp_path(path);
        fs::write(&tmp, data)
            .map_err(|e| Error::Journal(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|e| Error::Journal(format!("cannot rename {}: {e}", tmp.display())))?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
