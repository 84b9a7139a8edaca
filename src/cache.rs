use alloc::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};
use core::cell::RefCell;
use parking_lot::{Mutex, ReentrantMutex};

use crate::context::{Context, ContextId, ContextInner};

enum SlotState<T> {
    Empty,
    Initializing,
    Ready(T),
}

/// Write-once memo cell.
///
/// The lock is held for the whole initialization, so a concurrent first access waits for the winner
/// and the initializer runs at most once. Re-entering the slot from its own initializer on the same
/// thread doesn't deadlock: it's reported through `on_reentry` instead.
/// A failed initialization leaves the slot empty.
pub(crate) struct OnceSlot<T> {
    state: ReentrantMutex<RefCell<SlotState<T>>>,
}

impl<T: Clone> OnceSlot<T> {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(SlotState::Empty)),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn ready(value: T) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(SlotState::Ready(value))),
        }
    }

    #[must_use]
    pub(crate) fn get(&self) -> Option<T> {
        let guard = self.state.lock();
        let state = guard.borrow();
        match &*state {
            SlotState::Ready(value) => Some(value.clone()),
            SlotState::Empty | SlotState::Initializing => None,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_ready(&self) -> bool {
        matches!(&*self.state.lock().borrow(), SlotState::Ready(_))
    }

    pub(crate) fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>, on_reentry: impl FnOnce() -> E) -> Result<T, E> {
        let guard = self.state.lock();
        {
            let state = guard.borrow();
            match &*state {
                SlotState::Ready(value) => return Ok(value.clone()),
                SlotState::Initializing => return Err(on_reentry()),
                SlotState::Empty => {}
            }
        }

        guard.replace(SlotState::Initializing);
        match init() {
            Ok(value) => {
                guard.replace(SlotState::Ready(value.clone()));
                Ok(value)
            }
            Err(err) => {
                guard.replace(SlotState::Empty);
                Err(err)
            }
        }
    }
}

/// Per-context memo of a scoped registration.
///
/// Entries hold their context weakly, entries of dropped contexts are purged on the next lookup.
pub(crate) struct ScopedCache<T> {
    slots: Mutex<BTreeMap<ContextId, (Weak<ContextInner>, Arc<OnceSlot<T>>)>>,
}

impl<T: Clone> ScopedCache<T> {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub(crate) fn slot(&self, context: &Context) -> Arc<OnceSlot<T>> {
        let mut slots = self.slots.lock();
        slots.retain(|_, (owner, _)| owner.strong_count() > 0);

        let (_, slot) = slots
            .entry(context.id())
            .or_insert_with(|| (context.downgrade(), Arc::new(OnceSlot::new())));
        slot.clone()
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{OnceSlot, ScopedCache};
    use crate::context::Context;

    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicU8, Ordering};

    #[test]
    fn test_init_once() {
        let calls = AtomicU8::new(0);
        let slot = OnceSlot::new();

        for _ in 0..3 {
            let value = slot
                .get_or_try_init(
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, ()>(42)
                    },
                    || (),
                )
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(slot.is_ready());
    }

    #[test]
    fn test_failed_init_leaves_slot_empty() {
        let slot = OnceSlot::new();

        assert_eq!(slot.get_or_try_init(|| Err::<u8, _>("first"), || "reentry"), Err("first"));
        assert!(!slot.is_ready());
        assert_eq!(slot.get_or_try_init(|| Ok::<_, &str>(1), || "reentry"), Ok(1));
        assert_eq!(slot.get(), Some(1));
    }

    #[test]
    fn test_reentry() {
        let slot = OnceSlot::new();

        let result = slot.get_or_try_init(
            || slot.get_or_try_init(|| Ok::<u8, &str>(1), || "reentry").map(|value| value + 1),
            || "reentry",
        );

        assert_eq!(result, Err("reentry"));
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_concurrent_init_once() {
        let calls = Arc::new(AtomicU8::new(0));
        let slot = Arc::new(OnceSlot::new());

        let handles: std::vec::Vec<_> = (0..8)
            .map(|_| {
                let calls = calls.clone();
                let slot = slot.clone();
                std::thread::spawn(move || {
                    slot.get_or_try_init(
                        || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok::<_, ()>(7u8)
                        },
                        || (),
                    )
                    .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scoped_slots() {
        let cache = ScopedCache::<u8>::new();
        let context_1 = Context::new();
        let context_2 = Context::new();

        assert!(Arc::ptr_eq(&cache.slot(&context_1), &cache.slot(&context_1.clone())));
        assert!(!Arc::ptr_eq(&cache.slot(&context_1), &cache.slot(&context_2)));
        assert_eq!(cache.len(), 2);

        drop(context_2);
        let _ = cache.slot(&context_1);

        assert_eq!(cache.len(), 1);
    }
}
