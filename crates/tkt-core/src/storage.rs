//! Record storage beneath the ticket store
//!
//! The store keeps the whole table in memory and hands a complete
//! [`Snapshot`] to a [`Backend`] after every mutation. Backends do not
//! validate or repair what they load.
//!
//! Every persisted snapshot carries a revision number. A store compares it
//! with the backend's under the backend lock and reloads when another
//! process has written since.

use crate::lock::{LOCK_TIMEOUT, LockMode, StoreLock};
use crate::{Error, Result, Ticket, TicketId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const TKT_DIR: &str = ".tkt";
const TICKETS_FILE: &str = "tickets.jsonl";
const META_FILE: &str = "meta.json";
const CONFIG_FILE: &str = "config.toml";
const LOCK_FILE: &str = "lock";

/// The flat ticket table plus the id high-water mark
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    next_id: u64,
    revision: u64,
    tickets: BTreeMap<TicketId, Ticket>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            next_id: 1,
            revision: 0,
            tickets: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Build a snapshot from raw records. `next_id` is raised past the
    /// largest id present.
    pub fn from_tickets(next_id: u64, tickets: impl IntoIterator<Item = Ticket>) -> Self {
        let tickets: BTreeMap<_, _> = tickets.into_iter().map(|t| (t.id, t)).collect();
        let floor = tickets.keys().next_back().map_or(1, |id| id.0 + 1);
        Self {
            next_id: next_id.max(floor),
            revision: 0,
            tickets,
        }
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Number of committed writes behind this table
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    pub fn get(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TicketId) -> Option<&mut Ticket> {
        self.tickets.get_mut(&id)
    }

    pub fn contains(&self, id: TicketId) -> bool {
        self.tickets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// All tickets in id order
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    pub(crate) fn allocate_id(&mut self) -> TicketId {
        let id = TicketId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, ticket: Ticket) {
        self.tickets.insert(ticket.id, ticket);
    }

    pub(crate) fn remove(&mut self, id: TicketId) -> Option<Ticket> {
        self.tickets.remove(&id)
    }
}

/// Durable home of the ticket table
pub trait Backend: Send + Sync {
    /// Read the full table
    fn load(&self) -> Result<Snapshot>;

    /// Replace the stored table with `snapshot`
    fn persist(&self, snapshot: &Snapshot) -> Result<()>;

    /// Revision of the stored table, or `None` when nothing outside this
    /// process can change it
    fn revision(&self) -> Result<Option<u64>> {
        Ok(None)
    }

    /// Keep other processes out while the caller reads or writes
    fn lock(&self, _mode: LockMode) -> Result<StoreLock> {
        Ok(StoreLock::none())
    }

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Backend that keeps nothing outside the process
#[derive(Debug, Default)]
pub struct MemoryBackend {
    seed: Mutex<Option<Snapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing records instead of an empty table
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            seed: Mutex::new(Some(snapshot)),
        }
    }
}

impl Backend for MemoryBackend {
    fn load(&self) -> Result<Snapshot> {
        let mut seed = self.seed.lock().map_err(|_| Error::Poisoned)?;
        Ok(seed.take().unwrap_or_default())
    }

    fn persist(&self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    next_id: u64,
    #[serde(default)]
    revision: u64,
}

/// JSONL-backed table in a `.tkt` directory
///
/// No SQLite, no daemon - just files.
#[derive(Debug, Clone)]
pub struct JsonlBackend {
    dir: PathBuf,
}

impl JsonlBackend {
    /// Open an existing `.tkt` directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::NotInitialized);
        }
        Ok(Self { dir })
    }

    /// Find the store for the current directory
    ///
    /// `TKT_DIR` wins when set; otherwise walks up looking for `.tkt`.
    pub fn discover() -> Result<Self> {
        if let Ok(dir) = std::env::var("TKT_DIR")
            && !dir.trim().is_empty()
        {
            return Self::open(dir);
        }
        Self::discover_from(&std::env::current_dir()?)
    }

    /// Walk up from `start` to the nearest directory containing `.tkt`
    pub fn discover_from(start: &Path) -> Result<Self> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(TKT_DIR);
            if candidate.is_dir() {
                return Self::open(candidate);
            }
            if !current.pop() {
                return Err(Error::NotInitialized);
            }
        }
    }

    /// Initialize a new store under `root`
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(TKT_DIR);
        if dir.exists() {
            return Err(Error::AlreadyInitialized(dir.display().to_string()));
        }

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(CONFIG_FILE), crate::Config::default_with_comments())?;
        fs::write(dir.join(TICKETS_FILE), "")?;

        let backend = Self { dir };
        backend.write_meta(&Meta {
            next_id: 1,
            revision: 0,
        })?;
        Ok(backend)
    }

    /// Path to the .tkt directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tickets_path(&self) -> PathBuf {
        self.dir.join(TICKETS_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn read_meta(&self) -> Result<Option<Meta>> {
        let path = self.meta_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_meta(&self, meta: &Meta) -> Result<()> {
        let content = serde_json::to_string(meta)?;
        write_atomic(&self.meta_path(), |w| {
            w.write_all(content.as_bytes())?;
            writeln!(w)?;
            Ok(())
        })
    }
}

impl Backend for JsonlBackend {
    fn load(&self) -> Result<Snapshot> {
        let (next_id, revision) = self
            .read_meta()?
            .map_or((1, 0), |m| (m.next_id, m.revision));

        let path = self.tickets_path();
        if !path.exists() {
            return Ok(Snapshot::from_tickets(next_id, Vec::new()).with_revision(revision));
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut tickets = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            tickets.push(serde_json::from_str::<Ticket>(&line)?);
        }

        Ok(Snapshot::from_tickets(next_id, tickets).with_revision(revision))
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        // Meta first: a crash in between can only waste ids, never reuse them.
        self.write_meta(&Meta {
            next_id: snapshot.next_id(),
            revision: snapshot.revision(),
        })?;
        write_atomic(&self.tickets_path(), |w| {
            for ticket in snapshot.tickets() {
                serde_json::to_writer(&mut *w, ticket)?;
                writeln!(w)?;
            }
            Ok(())
        })
    }

    fn revision(&self) -> Result<Option<u64>> {
        Ok(Some(self.read_meta()?.map_or(0, |m| m.revision)))
    }

    fn lock(&self, mode: LockMode) -> Result<StoreLock> {
        StoreLock::acquire(&self.lock_path(), mode, LOCK_TIMEOUT)
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.dir.display())
    }
}

/// Write through a temp file and rename over `path`
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
