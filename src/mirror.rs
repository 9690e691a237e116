//! Local mirror of every accepted registration.
//!
//! The mirror is append-only and independent of remote delivery. Records are
//! persisted through a [`MirrorBackend`], which models a single durable
//! key-value slot holding the whole list.
use crate::record::RegistrationRecord;
use crate::util::write_atomic;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage slot for the serialized record list.
pub trait MirrorBackend {
    /// Read the stored list; an empty slot reads as no records.
    fn load(&self) -> Result<Vec<RegistrationRecord>>;
    /// Replace the stored list.
    fn store(&mut self, records: &[RegistrationRecord]) -> Result<()>;
}

/// Process-local slot, used in tests and ephemeral runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    slot: Option<String>,
}

impl MirrorBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<RegistrationRecord>> {
        match &self.slot {
            Some(text) => serde_json::from_str(text).context("parse mirror slot"),
            None => Ok(Vec::new()),
        }
    }

    fn store(&mut self, records: &[RegistrationRecord]) -> Result<()> {
        self.slot = Some(serde_json::to_string(records).context("serialize mirror slot")?);
        Ok(())
    }
}

/// JSON file slot that survives restarts.
///
/// There is no cross-process lock. Each append re-reads the slot before
/// rewriting it, so sessions that take turns see each other's records, but
/// two appends racing inside the same read-write window can still drop one.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MirrorBackend for FileBackend {
    fn load(&self) -> Result<Vec<RegistrationRecord>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let bytes =
            fs::read(&self.path).with_context(|| format!("read mirror {}", self.path.display()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parse mirror {}", self.path.display()))
    }

    fn store(&mut self, records: &[RegistrationRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records).context("serialize mirror")?;
        write_atomic(&self.path, &bytes)
    }
}

/// Append-only registration repository.
pub struct LocalMirror<B: MirrorBackend> {
    backend: B,
    records: Vec<RegistrationRecord>,
}

impl<B: MirrorBackend> LocalMirror<B> {
    /// Open the mirror, loading whatever the backend already holds.
    pub fn open(backend: B) -> Result<Self> {
        let records = backend.load()?;
        Ok(Self { backend, records })
    }

    /// Append one record and persist the full list.
    ///
    /// The slot is re-read first so records written by another session since
    /// `open` are kept. The in-memory list only changes once the backend
    /// accepted the write.
    pub fn append(&mut self, record: RegistrationRecord) -> Result<()> {
        let mut records = self.backend.load()?;
        records.push(record);
        self.backend.store(&records)?;
        self.records = records;
        tracing::debug!(records = self.records.len(), "mirror append");
        Ok(())
    }

    /// All records in insertion order.
    pub fn list(&self) -> &[RegistrationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&RegistrationRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Records grouped by preferred date (ascending), insertion order within a date.
    pub fn group_by_date(&self) -> BTreeMap<&str, Vec<&RegistrationRecord>> {
        let mut grouped: BTreeMap<&str, Vec<&RegistrationRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.preferred_date.as_str())
                .or_default()
                .push(record);
        }
        grouped
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
