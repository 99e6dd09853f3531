//! The ticket store
//!
//! One [`TicketStore`] owns the table for the life of the process and is
//! shared by reference. Reads take a shared lock and see a whole snapshot.
//! Writes take the exclusive lock, apply their change to a staged copy,
//! persist it, and only then publish it, so a failed validation or a failed
//! write leaves the visible table untouched.
//!
//! Other processes may share the backend. Writes hold the backend's
//! exclusive lock from reload to publish, and both reads and writes reload
//! first when the backend's revision has moved past the in-memory copy.
//!
//! Parent references are checked when they are written. Deleting a ticket
//! does not touch its children: they keep pointing at the removed id until
//! a caller reparents or detaches them, and `children_of` on the removed id
//! reports `NotFound`.

use crate::invariant::{validate_title, would_cycle};
use crate::{
    Backend, Config, Error, IntegrityReport, JsonlBackend, LockMode, MemoryBackend, Navigator,
    Result, Snapshot, Ticket, TicketGraph, TicketId, TicketNode,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard};

/// Outcome of a delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deletion {
    /// The removed record
    pub ticket: Ticket,
    /// Children left pointing at the removed id
    pub orphaned: Vec<TicketId>,
}

/// Shared, synchronized ticket table
pub struct TicketStore {
    state: RwLock<Snapshot>,
    backend: Box<dyn Backend>,
    config: Config,
}

impl TicketStore {
    /// Load the table from `backend`
    pub fn open(backend: impl Backend + 'static, config: Config) -> Result<Self> {
        let snapshot = {
            let _lock = backend.lock(LockMode::Shared)?;
            backend.load()?
        };
        Ok(Self {
            state: RwLock::new(snapshot),
            backend: Box::new(backend),
            config,
        })
    }

    /// Empty store that persists nothing
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(Snapshot::default()),
            backend: Box::new(MemoryBackend::new()),
            config: Config::default(),
        }
    }

    /// Open the on-disk store for the current directory, honoring its config
    pub fn discover() -> Result<Self> {
        let backend = JsonlBackend::discover()?;
        let config = Config::load(&backend.config_path())?;
        Self::open(backend, config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend_description(&self) -> String {
        self.backend.describe()
    }

    /// Shared view of the table, reloaded first if another process wrote
    fn read(&self) -> Result<RwLockReadGuard<'_, Snapshot>> {
        {
            let guard = self.state.read().map_err(|_| Error::Poisoned)?;
            let _lock = self.backend.lock(LockMode::Shared)?;
            if !self.is_stale(&guard)? {
                return Ok(guard);
            }
        }
        {
            let mut guard = self.state.write().map_err(|_| Error::Poisoned)?;
            let _lock = self.backend.lock(LockMode::Shared)?;
            self.refresh(&mut guard)?;
        }
        self.state.read().map_err(|_| Error::Poisoned)
    }

    fn is_stale(&self, current: &Snapshot) -> Result<bool> {
        Ok(self
            .backend
            .revision()?
            .is_some_and(|rev| rev != current.revision()))
    }

    /// Replace `current` with the stored table if it has moved on.
    /// Callers hold a backend lock.
    fn refresh(&self, current: &mut Snapshot) -> Result<()> {
        if self.is_stale(current)? {
            *current = self.backend.load()?;
        }
        Ok(())
    }

    /// Run `f` against a staged copy and commit it if it succeeds
    fn mutate<T>(&self, f: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write().map_err(|_| Error::Poisoned)?;
        let _lock = self.backend.lock(LockMode::Exclusive)?;
        self.refresh(&mut guard)?;

        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        if staged != *guard {
            staged.bump_revision();
            self.backend.persist(&staged)?;
            *guard = staged;
        }
        Ok(out)
    }

    /// Copy of the current table
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.read()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    // --- mutations ---------------------------------------------------------

    /// Create a new root ticket
    pub fn create_ticket(&self, title: &str, is_completed: Option<bool>) -> Result<Ticket> {
        let title = validate_title(title, self.config.max_title_length)?;
        self.mutate(|snap| {
            let id = snap.allocate_id();
            let ticket = Ticket::new(id, title, is_completed.unwrap_or(false));
            snap.insert(ticket.clone());
            Ok(ticket)
        })
    }

    /// Replace a ticket's title
    pub fn update_title(&self, id: TicketId, title: &str) -> Result<Ticket> {
        self.mutate(|snap| {
            let ticket = snap.get_mut(id).ok_or(Error::NotFound(id))?;
            let title = validate_title(title, self.config.max_title_length)?;
            if ticket.title != title {
                ticket.title = title;
                ticket.touch();
            }
            Ok(ticket.clone())
        })
    }

    /// Set the completion flag; setting the current value is a no-op
    pub fn set_completion(&self, id: TicketId, is_completed: bool) -> Result<Ticket> {
        self.mutate(|snap| {
            let ticket = snap.get_mut(id).ok_or(Error::NotFound(id))?;
            if ticket.is_completed != is_completed {
                ticket.is_completed = is_completed;
                ticket.touch();
            }
            Ok(ticket.clone())
        })
    }

    /// Remove exactly one ticket
    ///
    /// Children are neither removed nor reparented; their ids come back in
    /// [`Deletion::orphaned`].
    pub fn delete_ticket(&self, id: TicketId) -> Result<Deletion> {
        self.mutate(|snap| {
            let ticket = snap.remove(id).ok_or(Error::NotFound(id))?;
            let orphaned = snap
                .tickets()
                .filter(|t| t.parent_id == Some(id))
                .map(|t| t.id)
                .collect();
            Ok(Deletion { ticket, orphaned })
        })
    }

    /// Make `child_id` a child of `new_parent_id`
    pub fn reparent(&self, child_id: TicketId, new_parent_id: TicketId) -> Result<Ticket> {
        self.mutate(|snap| set_parent(snap, child_id, new_parent_id))
    }

    /// Make every ticket in `child_ids` a child of `new_parent_id`
    ///
    /// All or nothing: one missing id or one cycle leaves the table as it
    /// was. Returns the parent.
    pub fn reparent_many(
        &self,
        new_parent_id: TicketId,
        child_ids: impl IntoIterator<Item = TicketId>,
    ) -> Result<Ticket> {
        self.reparent_many_with_children(new_parent_id, child_ids)
            .map(|(parent, _)| parent)
    }

    /// [`reparent_many`](Self::reparent_many), also returning the parent's
    /// children as the committed batch left them
    pub fn reparent_many_with_children(
        &self,
        new_parent_id: TicketId,
        child_ids: impl IntoIterator<Item = TicketId>,
    ) -> Result<(Ticket, Vec<Ticket>)> {
        let child_ids: BTreeSet<TicketId> = child_ids.into_iter().collect();
        self.mutate(|snap| {
            if !snap.contains(new_parent_id) {
                return Err(Error::NotFound(new_parent_id));
            }
            for &child_id in &child_ids {
                set_parent(snap, child_id, new_parent_id)?;
            }
            with_children(snap, new_parent_id)
        })
    }

    /// Make a ticket a root
    pub fn clear_parent(&self, id: TicketId) -> Result<Ticket> {
        self.mutate(|snap| {
            let ticket = snap.get_mut(id).ok_or(Error::NotFound(id))?;
            if ticket.parent_id.take().is_some() {
                ticket.touch();
            }
            Ok(ticket.clone())
        })
    }

    // --- queries -----------------------------------------------------------

    pub fn get_ticket(&self, id: TicketId) -> Result<Ticket> {
        self.read()?.get(id).cloned().ok_or(Error::NotFound(id))
    }

    /// A ticket and its direct children, read from one snapshot
    pub fn get_with_children(&self, id: TicketId) -> Result<(Ticket, Vec<Ticket>)> {
        with_children(&*self.read()?, id)
    }

    /// Root tickets in id order
    pub fn list_root_tickets(&self) -> Result<Vec<Ticket>> {
        let snap = self.read()?;
        Ok(Navigator::new(&snap).roots().into_iter().cloned().collect())
    }

    /// Every ticket in id order
    pub fn list_all(&self) -> Result<Vec<Ticket>> {
        Ok(self.read()?.tickets().cloned().collect())
    }

    pub fn children_of(&self, id: TicketId) -> Result<Vec<Ticket>> {
        let snap = self.read()?;
        let children = Navigator::new(&snap).children_of(id)?;
        Ok(children.into_iter().cloned().collect())
    }

    pub fn ancestors(&self, id: TicketId) -> Result<Vec<Ticket>> {
        let snap = self.read()?;
        let chain = Navigator::new(&snap).ancestors(id)?;
        Ok(chain.into_iter().cloned().collect())
    }

    pub fn descendants(&self, id: TicketId) -> Result<Vec<Ticket>> {
        let snap = self.read()?;
        let below = Navigator::new(&snap).descendants(id)?;
        Ok(below.into_iter().cloned().collect())
    }

    pub fn subtree(&self, id: TicketId) -> Result<TicketNode> {
        Navigator::new(&*self.read()?).subtree(id)
    }

    /// Tickets whose parent has been deleted
    pub fn orphans(&self) -> Result<Vec<Ticket>> {
        let snap = self.read()?;
        Ok(Navigator::new(&snap).orphans().into_iter().cloned().collect())
    }

    /// Consistency report over the current table
    pub fn check(&self) -> Result<IntegrityReport> {
        Ok(TicketGraph::from_snapshot(&*self.read()?).report())
    }
}

fn with_children(snap: &Snapshot, id: TicketId) -> Result<(Ticket, Vec<Ticket>)> {
    let children = Navigator::new(snap)
        .children_of(id)?
        .into_iter()
        .cloned()
        .collect();
    let ticket = snap.get(id).cloned().ok_or(Error::NotFound(id))?;
    Ok((ticket, children))
}

/// Point `child_id` at `new_parent_id` within a staged snapshot
fn set_parent(snap: &mut Snapshot, child_id: TicketId, new_parent_id: TicketId) -> Result<Ticket> {
    if !snap.contains(child_id) {
        return Err(Error::NotFound(child_id));
    }
    if !snap.contains(new_parent_id) {
        return Err(Error::NotFound(new_parent_id));
    }
    if would_cycle(snap, child_id, new_parent_id) {
        return Err(Error::Cycle {
            child: child_id,
            parent: new_parent_id,
        });
    }

    let child = snap.get_mut(child_id).ok_or(Error::NotFound(child_id))?;
    if child.parent_id != Some(new_parent_id) {
        child.parent_id = Some(new_parent_id);
        child.touch();
    }
    Ok(child.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(tickets: &[Ticket]) -> Vec<TicketId> {
        tickets.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_create_defaults() {
        let store = TicketStore::in_memory();
        let t = store.create_ticket("root", None).unwrap();
        assert_eq!(t.id, TicketId(1));
        assert!(!t.is_completed);
        assert!(t.is_root());

        let done = store.create_ticket("done", Some(true)).unwrap();
        assert_eq!(done.id, TicketId(2));
        assert!(done.is_completed);
        assert_eq!(store.get_ticket(done.id).unwrap(), done);
    }

    #[test]
    fn test_create_rejects_empty_title() {
        let store = TicketStore::in_memory();
        assert!(matches!(
            store.create_ticket("   ", None),
            Err(Error::Validation(_))
        ));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_get_missing() {
        let store = TicketStore::in_memory();
        assert!(matches!(
            store.get_ticket(TicketId(9)),
            Err(Error::NotFound(TicketId(9)))
        ));
    }

    #[test]
    fn test_update_title() {
        let store = TicketStore::in_memory();
        let t = store.create_ticket("old", Some(true)).unwrap();

        let updated = store.update_title(t.id, "new").unwrap();
        assert_eq!(updated.title, "new");
        assert!(updated.is_completed);
        assert_eq!(updated.parent_id, None);

        assert!(matches!(
            store.update_title(t.id, ""),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            store.update_title(TicketId(40), "x"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(store.get_ticket(t.id).unwrap().title, "new");
    }

    #[test]
    fn test_set_completion_idempotent() {
        let store = TicketStore::in_memory();
        let t = store.create_ticket("task", None).unwrap();

        let first = store.set_completion(t.id, true).unwrap();
        let second = store.set_completion(t.id, true).unwrap();
        assert!(second.is_completed);
        assert_eq!(first, second);

        assert!(matches!(
            store.set_completion(TicketId(99), true),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_reparent_and_clear() {
        let store = TicketStore::in_memory();
        let t1 = store.create_ticket("root", None).unwrap();
        let t2 = store.create_ticket("child", None).unwrap();

        let moved = store.reparent(t2.id, t1.id).unwrap();
        assert_eq!(moved.id, t2.id);
        assert_eq!(moved.parent_id, Some(t1.id));
        assert_eq!(ids(&store.children_of(t1.id).unwrap()), vec![t2.id]);
        assert_eq!(ids(&store.list_root_tickets().unwrap()), vec![t1.id]);

        store.clear_parent(t2.id).unwrap();
        assert_eq!(
            ids(&store.list_root_tickets().unwrap()),
            vec![t1.id, t2.id]
        );
        assert!(store.children_of(t1.id).unwrap().is_empty());
    }

    #[test]
    fn test_self_parent_rejected() {
        let store = TicketStore::in_memory();
        let t1 = store.create_ticket("solo", None).unwrap();
        assert!(matches!(
            store.reparent(t1.id, t1.id),
            Err(Error::Cycle { .. })
        ));
    }

    #[test]
    fn test_two_cycle_rejected() {
        let store = TicketStore::in_memory();
        let a = store.create_ticket("a", None).unwrap();
        let b = store.create_ticket("b", None).unwrap();

        store.reparent(a.id, b.id).unwrap();
        let err = store.reparent(b.id, a.id).unwrap_err();
        assert!(matches!(err, Error::Cycle { child, parent } if child == b.id && parent == a.id));
        assert_eq!(store.get_ticket(b.id).unwrap().parent_id, None);
    }

    #[test]
    fn test_deep_cycle_rejected() {
        let store = TicketStore::in_memory();
        let a = store.create_ticket("a", None).unwrap();
        let b = store.create_ticket("b", None).unwrap();
        let c = store.create_ticket("c", None).unwrap();
        store.reparent(b.id, a.id).unwrap();
        store.reparent(c.id, b.id).unwrap();

        assert!(matches!(
            store.reparent(a.id, c.id),
            Err(Error::Cycle { .. })
        ));
    }

    #[test]
    fn test_reparent_missing_ids() {
        let store = TicketStore::in_memory();
        let a = store.create_ticket("a", None).unwrap();
        assert!(matches!(
            store.reparent(TicketId(50), a.id),
            Err(Error::NotFound(TicketId(50)))
        ));
        assert!(matches!(
            store.reparent(a.id, TicketId(51)),
            Err(Error::NotFound(TicketId(51)))
        ));
    }

    #[test]
    fn test_reparent_many() {
        let store = TicketStore::in_memory();
        let p = store.create_ticket("parent", None).unwrap();
        let c1 = store.create_ticket("c1", None).unwrap();
        let c2 = store.create_ticket("c2", None).unwrap();

        let parent = store.reparent_many(p.id, [c2.id, c1.id, c1.id]).unwrap();
        assert_eq!(parent.id, p.id);
        assert_eq!(ids(&store.children_of(p.id).unwrap()), vec![c1.id, c2.id]);
    }

    #[test]
    fn test_reparent_many_is_atomic() {
        let store = TicketStore::in_memory();
        let p = store.create_ticket("p", None).unwrap();
        let c1 = store.create_ticket("c1", None).unwrap();
        let c3 = store.create_ticket("c3", None).unwrap();
        let missing = TicketId(77);

        assert!(matches!(
            store.reparent_many(p.id, [c1.id, missing, c3.id]),
            Err(Error::NotFound(id)) if id == missing
        ));
        assert_eq!(store.get_ticket(c1.id).unwrap().parent_id, None);
        assert_eq!(store.get_ticket(c3.id).unwrap().parent_id, None);
    }

    #[test]
    fn test_reparent_many_cycle_is_atomic() {
        let store = TicketStore::in_memory();
        let a = store.create_ticket("a", None).unwrap();
        let b = store.create_ticket("b", None).unwrap();
        let c = store.create_ticket("c", None).unwrap();
        store.reparent(b.id, a.id).unwrap();

        // c is fine, a would loop through b
        assert!(matches!(
            store.reparent_many(b.id, [c.id, a.id]),
            Err(Error::Cycle { .. })
        ));
        assert_eq!(store.get_ticket(c.id).unwrap().parent_id, None);
    }

    #[test]
    fn test_reparent_many_missing_parent() {
        let store = TicketStore::in_memory();
        let c = store.create_ticket("c", None).unwrap();
        assert!(matches!(
            store.reparent_many(TicketId(8), [c.id]),
            Err(Error::NotFound(TicketId(8)))
        ));
        assert!(matches!(
            store.reparent_many(TicketId(8), []),
            Err(Error::NotFound(TicketId(8)))
        ));
    }

    #[test]
    fn test_delete_leaves_children_dangling() {
        let store = TicketStore::in_memory();
        let p = store.create_ticket("p", None).unwrap();
        let c = store.create_ticket("c", None).unwrap();
        store.reparent(c.id, p.id).unwrap();

        let deletion = store.delete_ticket(p.id).unwrap();
        assert_eq!(deletion.ticket.id, p.id);
        assert_eq!(deletion.orphaned, vec![c.id]);

        assert!(matches!(store.get_ticket(p.id), Err(Error::NotFound(_))));
        assert!(matches!(store.children_of(p.id), Err(Error::NotFound(_))));
        assert_eq!(store.get_ticket(c.id).unwrap().parent_id, Some(p.id));
        assert!(store.list_root_tickets().unwrap().is_empty());
        assert_eq!(ids(&store.orphans().unwrap()), vec![c.id]);
        assert!(!store.check().unwrap().is_consistent());

        // Orphan can be resolved explicitly
        store.clear_parent(c.id).unwrap();
        assert!(store.check().unwrap().is_consistent());
    }

    #[test]
    fn test_delete_missing() {
        let store = TicketStore::in_memory();
        assert!(matches!(
            store.delete_ticket(TicketId(1)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_ids_never_reused() {
        let store = TicketStore::in_memory();
        let a = store.create_ticket("a", None).unwrap();
        store.delete_ticket(a.id).unwrap();
        let b = store.create_ticket("b", None).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_cannot_reparent_under_deleted() {
        let store = TicketStore::in_memory();
        let a = store.create_ticket("a", None).unwrap();
        let b = store.create_ticket("b", None).unwrap();
        store.delete_ticket(a.id).unwrap();
        assert!(matches!(
            store.reparent(b.id, a.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_title_limit_from_config() {
        let config = Config {
            max_title_length: 3,
            ..Config::default()
        };
        let store = TicketStore::open(MemoryBackend::new(), config).unwrap();
        assert!(store.create_ticket("abc", None).is_ok());
        assert!(matches!(
            store.create_ticket("abcd", None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_jsonl_store_survives_reopen() {
        let root = tempfile::tempdir().unwrap();
        JsonlBackend::init(root.path()).unwrap();
        let dir = root.path().join(".tkt");

        {
            let store = TicketStore::open(JsonlBackend::open(&dir).unwrap(), Config::default())
                .unwrap();
            let p = store.create_ticket("p", None).unwrap();
            let c = store.create_ticket("c", None).unwrap();
            store.reparent(c.id, p.id).unwrap();
            let gone = store.create_ticket("gone", None).unwrap();
            store.delete_ticket(gone.id).unwrap();
        }

        let store =
            TicketStore::open(JsonlBackend::open(&dir).unwrap(), Config::default()).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(
            store.get_ticket(TicketId(2)).unwrap().parent_id,
            Some(TicketId(1))
        );
        // id 3 was used and deleted; the next one skips it
        assert_eq!(store.create_ticket("new", None).unwrap().id, TicketId(4));
    }

    fn open_dir(dir: &std::path::Path) -> TicketStore {
        TicketStore::open(JsonlBackend::open(dir).unwrap(), Config::default()).unwrap()
    }

    #[test]
    fn test_two_stores_share_one_directory() {
        let root = tempfile::tempdir().unwrap();
        JsonlBackend::init(root.path()).unwrap();
        let dir = root.path().join(".tkt");
        let cli = open_dir(&dir);
        let server = open_dir(&dir);

        let a = cli.create_ticket("from cli", None).unwrap();
        let b = server.create_ticket("from server", None).unwrap();
        assert_ne!(a.id, b.id);

        // Each side sees the other's writes without reopening
        assert_eq!(server.get_ticket(a.id).unwrap().title, "from cli");
        server.reparent(a.id, b.id).unwrap();
        assert_eq!(cli.get_ticket(a.id).unwrap().parent_id, Some(b.id));
        assert!(matches!(
            cli.reparent(b.id, a.id),
            Err(Error::Cycle { .. })
        ));

        let titles: Vec<String> = open_dir(&dir)
            .list_all()
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["from cli", "from server"]);
    }

    #[test]
    fn test_parallel_stores_never_share_an_id() {
        let root = tempfile::tempdir().unwrap();
        JsonlBackend::init(root.path()).unwrap();
        let dir = root.path().join(".tkt");
        let stores = [open_dir(&dir), open_dir(&dir)];

        std::thread::scope(|scope| {
            for (n, store) in stores.iter().enumerate() {
                scope.spawn(move || {
                    for i in 0..20 {
                        store.create_ticket(&format!("{n}-{i}"), None).unwrap();
                    }
                });
            }
        });

        let reopened = open_dir(&dir);
        let all = reopened.list_all().unwrap();
        assert_eq!(all.len(), 40);
        assert_eq!(ids(&all), (1..=40).map(TicketId).collect::<Vec<_>>());
        assert_eq!(reopened.snapshot().unwrap().next_id(), 41);
    }

    #[test]
    fn test_reparent_many_with_children_reads_committed_batch() {
        let store = TicketStore::in_memory();
        let p = store.create_ticket("p", None).unwrap();
        let old = store.create_ticket("old", None).unwrap();
        let c1 = store.create_ticket("c1", None).unwrap();
        let c2 = store.create_ticket("c2", None).unwrap();
        store.reparent(old.id, p.id).unwrap();

        let (parent, children) = store
            .reparent_many_with_children(p.id, [c2.id, c1.id])
            .unwrap();
        assert_eq!(parent.id, p.id);
        assert_eq!(ids(&children), vec![old.id, c1.id, c2.id]);
        assert!(children.iter().all(|c| c.parent_id == Some(p.id)));
    }

    #[test]
    fn test_adopt_races_delete_without_losing_the_reply() {
        for _ in 0..25 {
            let store = TicketStore::in_memory();
            let p = store.create_ticket("p", None).unwrap();
            let c = store.create_ticket("c", None).unwrap();

            let adopted = std::thread::scope(|scope| {
                let deleter = scope.spawn(|| store.delete_ticket(p.id));
                let adopted = store.reparent_many_with_children(p.id, [c.id]);
                deleter.join().unwrap().unwrap();
                adopted
            });

            // Either the batch committed first and its reply is complete,
            // or the parent was already gone
            match adopted {
                Ok((parent, children)) => {
                    assert_eq!(parent.id, p.id);
                    assert_eq!(ids(&children), vec![c.id]);
                }
                Err(err) => assert!(matches!(err, Error::NotFound(id) if id == p.id)),
            }
        }
    }

    struct FailingBackend {
        fail: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl Backend for FailingBackend {
        fn load(&self) -> Result<Snapshot> {
            Ok(Snapshot::default())
        }

        fn persist(&self, _snapshot: &Snapshot) -> Result<()> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[test]
    fn test_failed_persist_leaves_table_unchanged() {
        let fail = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let store = TicketStore::open(
            FailingBackend { fail: fail.clone() },
            Config::default(),
        )
        .unwrap();
        let p = store.create_ticket("p", None).unwrap();
        let c = store.create_ticket("c", None).unwrap();
        let loose = store.create_ticket("loose", None).unwrap();
        store.reparent(c.id, p.id).unwrap();

        fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let before = store.snapshot().unwrap();

        assert!(matches!(store.create_ticket("lost", None), Err(Error::Io(_))));
        assert!(matches!(store.reparent(loose.id, c.id), Err(Error::Io(_))));
        assert!(matches!(
            store.reparent_many(p.id, [loose.id]),
            Err(Error::Io(_))
        ));
        assert!(matches!(store.delete_ticket(p.id), Err(Error::Io(_))));
        assert!(matches!(store.clear_parent(c.id), Err(Error::Io(_))));
        assert!(matches!(store.update_title(c.id, "renamed"), Err(Error::Io(_))));

        let after = store.snapshot().unwrap();
        assert_eq!(after, before);
        assert_eq!(after.next_id(), before.next_id());
        assert_eq!(after.revision(), before.revision());

        // No-op writes never reach the backend
        assert_eq!(store.set_completion(c.id, false).unwrap().id, c.id);

        fail.store(false, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(store.create_ticket("next", None).unwrap().id, TicketId(4));
    }

    #[test]
    fn test_subtree_and_ancestors() {
        let store = TicketStore::in_memory();
        let a = store.create_ticket("a", None).unwrap();
        let b = store.create_ticket("b", None).unwrap();
        let c = store.create_ticket("c", None).unwrap();
        store.reparent_many(a.id, [b.id]).unwrap();
        store.reparent(c.id, b.id).unwrap();

        assert_eq!(store.subtree(a.id).unwrap().size(), 3);
        assert_eq!(ids(&store.ancestors(c.id).unwrap()), vec![b.id, a.id]);
        assert_eq!(ids(&store.descendants(a.id).unwrap()), vec![b.id, c.id]);

        let (ticket, children) = store.get_with_children(a.id).unwrap();
        assert_eq!(ticket.id, a.id);
        assert_eq!(ids(&children), vec![b.id]);
    }
}
