//! Optimistic cache synchronizer
//!
//! Every write to the local cache goes through one of three entry points:
//! `mutate` (and its variants `mutate_with` and `remove`), `hydrate` and
//! `invalidate`.
//!
//! A mutation snapshots the cached entity, applies the change optimistically,
//! awaits the store call and then settles: success replaces the entity with
//! the reconciled server response, failure restores the snapshot exactly.
//! `mutate_scoped` narrows the restore to the part of the value the mutation
//! wrote.
//! Each mutation moves through `MutationState::Pending` to `Committed` or
//! `RolledBack`, and settled mutations are kept in a bounded log.
//!
//! Mutations on the same entity may overlap. The last one to settle decides
//! the cached value: a late commit writes its server response, a late
//! rollback restores the snapshot it took.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use seqtrack_common::{Error, MutationError, Result, StoreResult};

use crate::cache::EntityCache;

/// Number of settled mutations retained by `settlements()`
pub const SETTLEMENT_LOG_CAPACITY: usize = 256;

/// Identifier of one optimistic mutation, unique per synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(u64);

impl MutationId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Lifecycle of one optimistic mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<V> {
    /// In flight; holds the pre-write value, `None` when the entity was not cached
    Pending(Option<V>),
    Committed,
    RolledBack,
}

impl<V> MutationState<V> {
    pub fn is_settled(&self) -> bool {
        !matches!(self, MutationState::Pending(_))
    }
}

/// Outcome of a settled mutation, in settlement order
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement<V> {
    pub mutation_id: MutationId,
    pub entity_id: Uuid,
    pub state: MutationState<V>,
}

struct InFlight<V> {
    entity_id: Uuid,
    state: MutationState<V>,
    /// The optimistic step changed the cache
    wrote: bool,
    /// Entity was invalidated while the mutation was in flight
    evicted: bool,
}

enum Write<V> {
    Keep,
    Put(V),
    Remove,
}

struct Inner<V> {
    cache: EntityCache<V>,
    in_flight: HashMap<MutationId, InFlight<V>>,
    settled: VecDeque<Settlement<V>>,
}

impl<V: Clone> Inner<V> {
    fn apply(&mut self, id: Uuid, write: Write<V>) {
        match write {
            Write::Keep => {}
            Write::Put(value) => {
                self.cache.insert(id, value);
            }
            Write::Remove => {
                self.cache.remove(&id);
            }
        }
    }

    fn record(&mut self, mutation_id: MutationId, entity_id: Uuid, state: MutationState<V>) {
        if self.settled.len() == SETTLEMENT_LOG_CAPACITY {
            self.settled.pop_front();
        }
        self.settled.push_back(Settlement {
            mutation_id,
            entity_id,
            state,
        });
    }
}

/// Owns an `EntityCache` and serializes every write to it
pub struct CacheSynchronizer<V> {
    inner: RwLock<Inner<V>>,
    next_id: AtomicU64,
}

impl<V> Default for CacheSynchronizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(EntityCache::new())
    }
}

impl<V> CacheSynchronizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(cache: EntityCache<V>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                cache,
                in_flight: HashMap::new(),
                settled: VecDeque::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current cached value, including any optimistic change in flight
    pub async fn get(&self, id: Uuid) -> Option<V> {
        self.inner.read().await.cache.get(&id).cloned()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner.read().await.cache.contains(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.cache.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.cache.is_empty()
    }

    /// Mutations on `id` that have not settled yet
    pub async fn pending_count(&self, id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .in_flight
            .values()
            .filter(|f| f.entity_id == id)
            .count()
    }

    /// Settled mutations, oldest first
    pub async fn settlements(&self) -> Vec<Settlement<V>> {
        self.inner.read().await.settled.iter().cloned().collect()
    }

    /// Overwrite cached entries with server data
    pub async fn hydrate(&self, entries: impl IntoIterator<Item = (Uuid, V)>) -> usize {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for (id, value) in entries {
            inner.cache.insert(id, value);
            count += 1;
        }
        debug!(count, "Cache hydrated");
        count
    }

    /// Evict an entry
    ///
    /// Mutations still in flight for the entity will not write it back: a
    /// later rollback becomes a no-op and a later commit is dropped unless the
    /// entity has been hydrated again in the meantime.
    pub async fn invalidate(&self, id: Uuid) -> Option<V> {
        let mut inner = self.inner.write().await;
        for flight in inner.in_flight.values_mut() {
            if flight.entity_id == id {
                flight.evicted = true;
            }
        }
        inner.cache.remove(&id)
    }

    /// Optimistically apply `apply` to the cached entity, then replace it with
    /// the entity returned by `send`, or restore the snapshot if `send` fails
    ///
    /// An entity that is not cached is not written optimistically; on success
    /// the server response is cached.
    pub async fn mutate<A, Fut>(&self, id: Uuid, apply: A, send: Fut) -> Result<V>
    where
        A: FnOnce(&mut V),
        Fut: Future<Output = StoreResult<V>>,
    {
        self.mutate_with(id, apply, send, |_, response: &V| Some(response.clone()))
            .await
    }

    /// Like `mutate`, for stores that answer with something other than the
    /// cached entity. `reconcile` folds the response into the current cached
    /// value; returning `None` removes the entry.
    pub async fn mutate_with<R, A, Fut, C>(
        &self,
        id: Uuid,
        apply: A,
        send: Fut,
        reconcile: C,
    ) -> Result<R>
    where
        A: FnOnce(&mut V),
        Fut: Future<Output = StoreResult<R>>,
        C: FnOnce(Option<V>, &R) -> Option<V>,
    {
        self.mutate_scoped(id, apply, send, reconcile, |_, snapshot| snapshot)
            .await
    }

    /// Like `mutate_with`, for cached values that aggregate several server
    /// entities where a mutation only touches part of the value
    ///
    /// On failure `restore` receives the current cached value and the
    /// snapshot, and returns what to cache; it should put back only the part
    /// the mutation wrote so that sibling commits settled in the meantime
    /// survive. Returning `None` removes the entry.
    pub async fn mutate_scoped<R, A, Fut, C, F>(
        &self,
        id: Uuid,
        apply: A,
        send: Fut,
        reconcile: C,
        restore: F,
    ) -> Result<R>
    where
        A: FnOnce(&mut V),
        Fut: Future<Output = StoreResult<R>>,
        C: FnOnce(Option<V>, &R) -> Option<V>,
        F: FnOnce(Option<V>, Option<V>) -> Option<V>,
    {
        let mutation_id = self
            .begin(id, |current| match current {
                Some(value) => {
                    let mut next = value.clone();
                    apply(&mut next);
                    Write::Put(next)
                }
                None => Write::Keep,
            })
            .await;

        match send.await {
            Ok(response) => {
                self.commit(mutation_id, |current| match reconcile(current, &response) {
                    Some(value) => Write::Put(value),
                    None => Write::Remove,
                })
                .await;
                Ok(response)
            }
            Err(e) => {
                self.roll_back(mutation_id, &e, restore).await;
                Err(Error::Mutation(e))
            }
        }
    }

    /// Optimistically drop the entity; restored if `send` fails
    pub async fn remove<Fut>(&self, id: Uuid, send: Fut) -> Result<()>
    where
        Fut: Future<Output = StoreResult<()>>,
    {
        let mutation_id = self
            .begin(id, |current| match current {
                Some(_) => Write::Remove,
                None => Write::Keep,
            })
            .await;

        match send.await {
            Ok(()) => {
                self.commit(mutation_id, |_| Write::Remove).await;
                Ok(())
            }
            Err(e) => {
                self.roll_back(mutation_id, &e, |_, snapshot| snapshot).await;
                Err(Error::Mutation(e))
            }
        }
    }

    async fn begin(
        &self,
        id: Uuid,
        optimistic: impl FnOnce(Option<&V>) -> Write<V>,
    ) -> MutationId {
        let mutation_id = MutationId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut inner = self.inner.write().await;
        let snapshot = inner.cache.get(&id).cloned();
        let write = optimistic(snapshot.as_ref());
        let wrote = !matches!(write, Write::Keep);
        inner.apply(id, write);
        inner.in_flight.insert(
            mutation_id,
            InFlight {
                entity_id: id,
                state: MutationState::Pending(snapshot),
                wrote,
                evicted: false,
            },
        );

        debug!(entity_id = %id, mutation = mutation_id.0, wrote, "Mutation pending");
        mutation_id
    }

    async fn commit(&self, mutation_id: MutationId, reconcile: impl FnOnce(Option<V>) -> Write<V>) {
        let mut inner = self.inner.write().await;
        let Some(flight) = inner.in_flight.remove(&mutation_id) else {
            return;
        };
        let id = flight.entity_id;

        if flight.evicted && !inner.cache.contains(&id) {
            debug!(entity_id = %id, mutation = mutation_id.0, "Commit for evicted entity not cached");
        } else {
            let current = inner.cache.remove(&id);
            let write = reconcile(current);
            inner.apply(id, write);
        }

        inner.record(mutation_id, id, MutationState::Committed);
        debug!(entity_id = %id, mutation = mutation_id.0, "Mutation committed");
    }

    async fn roll_back(
        &self,
        mutation_id: MutationId,
        cause: &MutationError,
        restore: impl FnOnce(Option<V>, Option<V>) -> Option<V>,
    ) {
        let mut inner = self.inner.write().await;
        let Some(flight) = inner.in_flight.remove(&mutation_id) else {
            return;
        };
        let id = flight.entity_id;

        if let MutationState::Pending(snapshot) = flight.state {
            if flight.wrote && flight.evicted {
                let err = Error::Sync(format!(
                    "entity {} was evicted before mutation {} rolled back",
                    id, mutation_id.0
                ));
                warn!(entity_id = %id, error = %err, "Rollback skipped");
            } else if flight.wrote {
                let current = inner.cache.remove(&id);
                let write = match restore(current, snapshot) {
                    Some(value) => Write::Put(value),
                    None => Write::Remove,
                };
                inner.apply(id, write);
            }
        }

        inner.record(mutation_id, id, MutationState::RolledBack);
        debug!(entity_id = %id, mutation = mutation_id.0, cause = %cause, "Mutation rolled back");
    }
}
