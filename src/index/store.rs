//! The per-account metadata index: load, upsert, atomic persistence.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::error::{GrabError, Result};
use crate::index::format::{IndexDocument, INDEX_FILE_NAME, TEMP_SUFFIX};
use crate::model::mail::{Mail, MetadataRecord};

/// Disk-backed ledger of every successfully parsed message of one account.
///
/// All mutation goes through [`MetadataIndex::upsert`], which holds the lock
/// for the whole update-and-persist cycle, so at most one write is ever in
/// flight.
#[derive(Debug)]
pub struct MetadataIndex {
    path: PathBuf,
    document: Mutex<IndexDocument>,
}

impl MetadataIndex {
    /// Open (or start) the index at `<root>/<account>/data.json`.
    ///
    /// A missing file is a fresh account. An unreadable or malformed file is
    /// an error: merging with or discarding bad data must be an operator call.
    pub fn open(root: &Path, account: &str, vendor: &str, server: &str) -> Result<Self> {
        let dir = root.join(account);
        std::fs::create_dir_all(&dir).map_err(|e| GrabError::io(&dir, e))?;
        let path = dir.join(INDEX_FILE_NAME);

        let document = match std::fs::read(&path) {
            Ok(data) => {
                let document: IndexDocument =
                    serde_json::from_slice(&data).map_err(|e| GrabError::InvalidIndex {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                debug!(
                    path = %path.display(),
                    count = document.list.len(),
                    "Loaded existing index"
                );
                document
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Starting new index");
                IndexDocument::new(account, vendor, server)
            }
            Err(e) => return Err(GrabError::io(&path, e)),
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Path of the committed document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the record for `mail` and persist the whole document.
    ///
    /// The in-memory document keeps the change even if persisting fails; the
    /// next successful write carries it to disk.
    pub fn upsert(&self, mail: &Mail) -> Result<()> {
        if let Some(error) = &mail.error {
            return Err(GrabError::Unparsed {
                uid: mail.uid,
                error: error.clone(),
            });
        }

        let mut document = self.lock();
        let replaced = document.upsert(MetadataRecord::from(mail));
        debug!(uid = mail.uid, replaced, "Index entry updated");

        let temp = self.write_temp(mail.uid, &document)?;
        self.commit(mail.uid, &temp)
    }

    /// Snapshot of all records in stored order.
    pub fn records(&self) -> Vec<MetadataRecord> {
        self.lock().list.clone()
    }

    /// Record for `uid`, if indexed.
    pub fn get(&self, uid: u32) -> Option<MetadataRecord> {
        self.lock().list.iter().find(|r| r.uid == uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, IndexDocument> {
        // A panic mid-update leaves a structurally valid document behind.
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    /// Serialize the document into the temporary file.
    fn write_temp(&self, uid: u32, document: &IndexDocument) -> Result<PathBuf> {
        let data = serde_json::to_vec_pretty(document)
            .map_err(|source| GrabError::IndexEncode { uid, source })?;
        let temp = self.temp_path();
        std::fs::write(&temp, data).map_err(|source| GrabError::IndexWrite {
            uid,
            path: temp.clone(),
            source,
        })?;
        Ok(temp)
    }

    /// Atomically replace the committed document with the temporary file.
    fn commit(&self, uid: u32, temp: &Path) -> Result<()> {
        std::fs::rename(temp, &self.path).map_err(|source| {
            let _ = std::fs::remove_file(temp);
            GrabError::IndexWrite {
                uid,
                path: self.path.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::Address;

    fn mail(uid: u32, subject: &str) -> Mail {
        let mut mail = Mail::new(uid);
        mail.subject = subject.to_string();
        mail.from = vec![Address::new("", "a@b.com")];
        mail
    }

    #[test]
    fn test_interrupted_write_keeps_committed_document() {
        let dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::open(dir.path(), "user@x", "mbox", "inbox").unwrap();
        index.upsert(&mail(1, "first")).unwrap();
        let committed = std::fs::read(index.path()).unwrap();

        // Crash after the temp write, before the rename.
        let mut document = index.lock().clone();
        document.upsert(MetadataRecord::from(&mail(2, "second")));
        let temp = index.write_temp(2, &document).unwrap();
        assert!(temp.exists());

        assert_eq!(std::fs::read(index.path()).unwrap(), committed);
        let reopened = MetadataIndex::open(dir.path(), "user@x", "mbox", "inbox").unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_temp_path_sits_next_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::open(dir.path(), "acct", "mbox", "inbox").unwrap();
        assert_eq!(
            index.temp_path(),
            dir.path().join("acct").join("data.json.tmp")
        );
    }
}
