//! Row-level mutual exclusion keyed by entity id.
//!
//! A `RowTable` maps each key to its own `Mutex`. The outer map lock is held
//! only long enough to clone the row handle; callers then lock the single row
//! with a timeout. Unrelated keys never contend.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    #[error("row does not exist")]
    Missing,

    #[error("timed out after {0:?} waiting for row lock")]
    Timeout(Duration),
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    /// Cleared on removal so holders of a stale handle see the row as gone.
    live: bool,
}

type Row<V> = Arc<Mutex<Slot<V>>>;

/// Map of independently lockable rows.
#[derive(Debug)]
pub struct RowTable<K, V> {
    rows: RwLock<HashMap<K, Row<V>>>,
    timeout: Duration,
}

impl<K, V> RowTable<K, V>
where
    K: Copy + Eq + Hash,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn handle(&self, key: &K) -> Option<Row<V>> {
        self.rows.read().get(key).cloned()
    }

    fn slot(value: V) -> Row<V> {
        Arc::new(Mutex::new(Slot { value, live: true }))
    }

    /// Insert a new row. Returns `false` (and leaves the table unchanged) if
    /// the key already exists.
    pub fn insert(&self, key: K, value: V) -> bool {
        let mut rows = self.rows.write();
        if rows.contains_key(&key) {
            return false;
        }
        rows.insert(key, Self::slot(value));
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows.read().contains_key(key)
    }

    /// Run `f` with exclusive access to one row.
    pub fn with_row<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Result<R, LockError> {
        let row = self.handle(key).ok_or(LockError::Missing)?;
        let mut guard = lock_row(&row, self.timeout)?;
        Ok(f(&mut guard.value))
    }

    /// Like `with_row`, creating the row from `init` first if it is absent.
    pub fn with_row_or_insert<R>(
        &self,
        key: K,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> Result<R, LockError> {
        let row = match self.handle(&key) {
            Some(row) => row,
            None => self
                .rows
                .write()
                .entry(key)
                .or_insert_with(|| Self::slot(init()))
                .clone(),
        };
        let mut guard = lock_row(&row, self.timeout)?;
        Ok(f(&mut guard.value))
    }

    /// Remove a row while holding its lock, if `allow` agrees.
    ///
    /// No path holds the map lock while waiting on a row, so taking it under
    /// the row lock cannot deadlock.
    pub fn remove_if<E>(
        &self,
        key: &K,
        allow: impl FnOnce(&V) -> Result<(), E>,
    ) -> Result<Result<(), E>, LockError> {
        let row = self.handle(key).ok_or(LockError::Missing)?;
        let mut guard = lock_row(&row, self.timeout)?;
        if let Err(e) = allow(&guard.value) {
            return Ok(Err(e));
        }
        guard.live = false;
        self.rows.write().remove(key);
        Ok(Ok(()))
    }

    /// Visit every row, one lock at a time, in no particular order.
    ///
    /// Rows inserted after the snapshot of handles is taken are not visited.
    /// A timeout reports the key that could not be locked.
    pub fn for_each(&self, mut f: impl FnMut(&K, &mut V)) -> Result<(), (K, LockError)> {
        let handles: Vec<(K, Row<V>)> = self
            .rows
            .read()
            .iter()
            .map(|(k, v)| (*k, Arc::clone(v)))
            .collect();
        for (key, row) in handles {
            let mut guard = row
                .try_lock_for(self.timeout)
                .ok_or((key, LockError::Timeout(self.timeout)))?;
            if guard.live {
                f(&key, &mut guard.value);
            }
        }
        Ok(())
    }
}

fn lock_row<V>(row: &Row<V>, timeout: Duration) -> Result<MutexGuard<'_, Slot<V>>, LockError> {
    let guard = row.try_lock_for(timeout).ok_or(LockError::Timeout(timeout))?;
    if guard.live {
        Ok(guard)
    } else {
        Err(LockError::Missing)
    }
}
