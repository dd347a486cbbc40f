//! Per-unit mutual exclusion.
//!
//! Every compilation unit owns a [`LockableCache`]: a reentrant lock that
//! guards all mutation of the unit's declarations, plus the syntax index
//! used to map syntax nodes back to declarations.
//!
//! ## Lock order
//!
//! Units are ordered by [`UnitId`]. A thread that already holds unit locks
//! may only *block* on a unit with a greater id than all of them; anything
//! else must use a non-blocking attempt. [`UnitLock::lock_ordered`] encodes
//! that rule, which rules out lock cycles between threads.
//!
//! ```text
//! thread 1: holds unit_2 ── blocks on unit_5   (allowed, 5 > 2)
//! thread 2: holds unit_5 ── try_lock unit_2    (never blocks)
//! ```

use std::cell::RefCell;
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::{CancellationToken, DeclId, Phase, ResolveError, SyntaxNodeId, UnitId};

thread_local! {
    static HELD_UNITS: RefCell<Vec<UnitId>> = const { RefCell::new(Vec::new()) };
}

/// Highest unit id whose lock the calling thread holds.
pub fn highest_held_unit() -> Option<UnitId> {
    HELD_UNITS.with(|held| held.borrow().iter().copied().max())
}

/// Whether the calling thread may block on `unit` without breaking the
/// lock order.
pub fn may_block_on(unit: UnitId) -> bool {
    highest_held_unit().is_none_or(|highest| unit > highest)
}

/// A reentrant mutex owned by one compilation unit.
#[derive(Debug)]
pub struct UnitLock {
    unit: UnitId,
    mutex: ReentrantMutex<()>,
}

impl UnitLock {
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            mutex: ReentrantMutex::new(()),
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.mutex.is_owned_by_current_thread()
    }

    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }

    /// Block until the lock is held. Reentrant.
    pub fn lock(&self) -> UnitLockGuard<'_> {
        let reentrant = self.is_held_by_current_thread();
        let inner = self.mutex.lock();
        self.acquired(inner, reentrant)
    }

    /// Take the lock only if nobody holds it (or this thread already does).
    pub fn try_lock(&self) -> Option<UnitLockGuard<'_>> {
        let reentrant = self.is_held_by_current_thread();
        self.mutex
            .try_lock()
            .map(|inner| self.acquired(inner, reentrant))
    }

    /// Block if the lock order allows it, otherwise attempt once.
    ///
    /// `None` means the lock is busy and blocking could deadlock; the caller
    /// must defer whatever it wanted to do under this lock.
    pub fn lock_ordered(&self) -> Option<UnitLockGuard<'_>> {
        if self.is_held_by_current_thread() || may_block_on(self.unit) {
            Some(self.lock())
        } else {
            self.try_lock()
        }
    }

    /// Wait for the lock, polling `token` every `poll` interval.
    ///
    /// `phase` is reported in the [`ResolveError::Cancelled`] error.
    pub fn lock_cancellable(
        &self,
        token: &CancellationToken,
        poll: Duration,
        phase: Phase,
    ) -> Result<UnitLockGuard<'_>, ResolveError> {
        let reentrant = self.is_held_by_current_thread();
        loop {
            token.check(phase)?;
            if let Some(inner) = self.mutex.try_lock_for(poll) {
                return Ok(self.acquired(inner, reentrant));
            }
            trace!(unit = %self.unit, "waiting for unit lock");
        }
    }

    /// Run `f` while holding the lock.
    pub fn run_under_lock<R>(&self, f: impl FnOnce(&UnitLockGuard<'_>) -> R) -> R {
        let guard = self.lock();
        f(&guard)
    }

    /// Run `f` in a context that must already hold the lock.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the lock.
    pub fn run_already_locked<R>(&self, f: impl FnOnce(&UnitLockGuard<'_>) -> R) -> R {
        assert!(
            self.is_held_by_current_thread(),
            "lock of {} must already be held by the current thread",
            self.unit
        );
        let guard = self.lock();
        f(&guard)
    }

    fn acquired<'a>(
        &'a self,
        inner: ReentrantMutexGuard<'a, ()>,
        reentrant: bool,
    ) -> UnitLockGuard<'a> {
        if !reentrant {
            trace!(unit = %self.unit, "unit lock acquired");
            HELD_UNITS.with(|held| held.borrow_mut().push(self.unit));
        }
        UnitLockGuard {
            lock: self,
            reentrant,
            _inner: inner,
        }
    }
}

/// Proof that the current thread holds a unit lock.
///
/// Only the outermost guard releases the mutex.
#[derive(Debug)]
pub struct UnitLockGuard<'a> {
    lock: &'a UnitLock,
    reentrant: bool,
    _inner: ReentrantMutexGuard<'a, ()>,
}

impl UnitLockGuard<'_> {
    pub fn unit(&self) -> UnitId {
        self.lock.unit
    }

    /// Whether this guard was produced by `lock`.
    pub fn is_for(&self, lock: &UnitLock) -> bool {
        std::ptr::eq(self.lock, lock)
    }

    pub fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}

impl Drop for UnitLockGuard<'_> {
    fn drop(&mut self) {
        if self.reentrant {
            return;
        }
        // The held-unit entry goes before the mutex guard (a field) is dropped.
        let unit = self.lock.unit;
        HELD_UNITS.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|u| *u == unit) {
                held.swap_remove(pos);
            }
        });
    }
}

/// Lock plus syntax index of one compilation unit.
#[derive(Debug)]
pub struct LockableCache {
    lock: UnitLock,
    syntax_index: FxHashMap<SyntaxNodeId, DeclId>,
}

impl LockableCache {
    pub fn new(unit: UnitId, syntax_index: FxHashMap<SyntaxNodeId, DeclId>) -> Self {
        Self {
            lock: UnitLock::new(unit),
            syntax_index,
        }
    }

    pub fn lock(&self) -> &UnitLock {
        &self.lock
    }

    /// The declaration built from `node`, if the node declares one.
    pub fn declaration_for(&self, node: SyntaxNodeId) -> Option<DeclId> {
        self.syntax_index.get(&node).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_is_reentrant() {
        let lock = UnitLock::new(UnitId::new(1));
        let outer = lock.lock();
        assert!(!outer.is_reentrant());
        {
            let inner = lock.lock();
            assert!(inner.is_reentrant());
            assert!(lock.is_held_by_current_thread());
        }
        assert!(lock.is_held_by_current_thread());
        drop(outer);
        assert!(!lock.is_held_by_current_thread());
        assert!(!lock.is_locked());
    }

    #[test]
    fn run_already_locked_requires_ownership() {
        let lock = UnitLock::new(UnitId::new(1));
        let value = lock.run_under_lock(|guard| {
            assert_eq!(guard.unit(), UnitId::new(1));
            lock.run_already_locked(|inner| inner.is_for(&lock))
        });
        assert!(value);
    }

    #[test]
    #[should_panic(expected = "must already be held")]
    fn run_already_locked_panics_without_lock() {
        let lock = UnitLock::new(UnitId::new(1));
        lock.run_already_locked(|_| ());
    }

    #[test]
    fn ordered_locking_refuses_to_block_downwards() {
        let low = Arc::new(UnitLock::new(UnitId::new(1)));
        let high = UnitLock::new(UnitId::new(2));

        let other = Arc::clone(&low);
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let _guard = other.lock();
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        held_rx.recv().unwrap();

        let _high = high.lock();
        assert_eq!(highest_held_unit(), Some(UnitId::new(2)));
        assert!(!may_block_on(UnitId::new(1)));
        // Blocking would invert the order, so the attempt fails immediately.
        assert!(low.lock_ordered().is_none());

        release_tx.send(()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn cancellable_lock_observes_cancellation() {
        let lock = Arc::new(UnitLock::new(UnitId::new(3)));
        let other = Arc::clone(&lock);
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let _guard = other.lock();
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        held_rx.recv().unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let result = lock.lock_cancellable(&token, Duration::from_millis(1), Phase::Types);
        assert_eq!(
            result.err(),
            Some(ResolveError::Cancelled { phase: Phase::Types })
        );

        release_tx.send(()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn reentrant_guards_keep_the_outer_hold() {
        let lock = UnitLock::new(UnitId::new(4));
        let outer = lock.lock();
        let inner = lock.try_lock().unwrap();
        assert!(inner.is_reentrant());
        drop(inner);
        assert_eq!(highest_held_unit(), Some(UnitId::new(4)));
        assert!(lock.is_locked());
        drop(outer);
        assert_eq!(highest_held_unit(), None);
        assert!(!lock.is_locked());
    }

    #[test]
    fn held_units_are_released() {
        let lock = UnitLock::new(UnitId::new(9));
        {
            let _guard = lock.lock();
            assert_eq!(highest_held_unit(), Some(UnitId::new(9)));
        }
        assert_eq!(highest_held_unit(), None);
    }
}
