use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::http::date::{format_http_date, parse_http_date};
use crate::ipc::semaphore::NamedSemaphore;
use crate::ipc::semaphore::DB_WRITE_SEM_NAME;

use super::UpsertOutcome;

/// The keyed byte-record store backend. The on-disk format is treated as
/// opaque — any ordered or hash-indexed keyed store satisfies the
/// contract — so this implementation uses `sled`, a pure-Rust embedded
/// ordered store, rather than hand-rolling an ndbm-alike file format.
/// `sled::open` takes an exclusive file lock on the DB path for as long as
/// the returned `Db` is alive, so — unlike a thread-safe in-process
/// handle — it cannot be cached for a worker's lifetime: with several
/// preforked workers sharing one store path, only the first to open it
/// would ever succeed. Every operation instead opens the store fresh,
/// does its work, and drops the handle before returning, the whole
/// sequence bracketed by the store's named semaphore — the open/use/close
/// envelope the spec describes for an ndbm-style handle that doesn't
/// support concurrent opens.
pub struct RecordStoreBackend {
    path: PathBuf,
    sem: NamedSemaphore,
}

/// `timestamp_string '\0' entity_bytes '\0'` — the offset to the entity
/// is `strlen(timestamp) + 1`, a single NUL separator.
fn encode_value(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut value = Vec::with_capacity(timestamp.len() + 1 + body.len() + 1);
    value.extend_from_slice(timestamp.as_bytes());
    value.push(0);
    value.extend_from_slice(body);
    value.push(0);
    value
}

/// Splits a stored value back into its HTTP-date timestamp and entity
/// bytes. Returns `None` if the value is malformed (missing NUL
/// separator) — which should not happen for values this backend wrote
/// itself, but a store shared with the external debug viewer is not this
/// crate's to fully trust.
fn decode_value(value: &[u8]) -> Option<(&str, &[u8])> {
    let nul = value.iter().position(|&b| b == 0)?;
    let timestamp = std::str::from_utf8(&value[..nul]).ok()?;
    let body = &value[nul + 1..value.len().saturating_sub(1)];
    Some((timestamp, body))
}

impl RecordStoreBackend {
    /// Records the store path and acquires the named semaphore; does not
    /// itself open the store — each operation below opens its own handle
    /// and closes it before returning.
    pub fn open(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let sem = NamedSemaphore::open_or_create(DB_WRITE_SEM_NAME, 1)?;
        Ok(RecordStoreBackend {
            path: path.as_ref().to_path_buf(),
            sem,
        })
    }

    /// Two-phase insert-then-replace upsert: try an insert-only
    /// `DBM_INSERT`-style write, and on key-exists fall back to an
    /// unconditional `DBM_REPLACE`-style overwrite.
    /// `sled::Tree::compare_and_swap` with an expected `None` is the
    /// insert-only primitive; a `CompareAndSwapError` means the key
    /// already existed, so the second phase replaces unconditionally. The
    /// whole sequence — open, upsert, close — runs under the store
    /// semaphore, since only one process at a time may hold the store
    /// open.
    pub fn upsert(&self, uri: &str, body: &[u8]) -> crate::error::Result<UpsertOutcome> {
        let _guard = self.sem.guard()?;
        let db = sled::open(&self.path)?;
        let timestamp = format_http_date(SystemTime::now());
        let value = encode_value(&timestamp, body);
        let key = record_key(uri);

        let outcome = match db.compare_and_swap(&key, None::<&[u8]>, Some(value.clone()))? {
            Ok(()) => {
                db.flush()?;
                UpsertOutcome::Inserted
            }
            Err(_) => {
                db.insert(&key, value)?;
                db.flush()?;
                UpsertOutcome::Overwritten
            }
        };
        drop(db);
        Ok(outcome)
    }

    /// Looks up the stored entity bytes for `uri`. `None` means the key is
    /// absent — the method engine maps this to 404, not an error.
    pub fn fetch_body(&self, uri: &str) -> crate::error::Result<Option<Vec<u8>>> {
        let _guard = self.sem.guard()?;
        let db = sled::open(&self.path)?;
        let key = record_key(uri);
        let result = match db.get(&key)? {
            Some(value) => decode_value(&value).map(|(_, body)| body.to_vec()),
            None => None,
        };
        drop(db);
        Ok(result)
    }

    /// Looks up the stored timestamp for `uri`, parsed back into a
    /// comparable `DateTime`. `None` means the key is absent.
    pub fn last_modified(&self, uri: &str) -> crate::error::Result<Option<chrono::DateTime<chrono::Utc>>> {
        let _guard = self.sem.guard()?;
        let db = sled::open(&self.path)?;
        let key = record_key(uri);
        let result = match db.get(&key)? {
            Some(value) => decode_value(&value).and_then(|(ts, _)| parse_http_date(ts)),
            None => None,
        };
        drop(db);
        Ok(result)
    }
}

/// The key is the raw request URI byte string including the terminating
/// NUL.
fn record_key(uri: &str) -> Vec<u8> {
    let mut key = uri.as_bytes().to_vec();
    key.push(0);
    key
}
