use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

/// A map whose values are materialized at most once per key.
///
/// The outer lock is only held long enough to fetch a key's slot. The value
/// is then initialized on the slot, so concurrent callers asking for the same
/// missing key wait for a single initializer while other keys proceed. A
/// failed initialization leaves the slot empty.
pub(crate) struct OnceMap<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for OnceMap<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> OnceMap<K, V> {
    pub fn get_or_try_init<E>(&self, key: K, init: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        let slot = Arc::clone(self.lock().entry(key).or_default());
        slot.get_or_try_init(init).cloned()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of materialized values.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.get().is_some()).count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn initializes_once_per_key() {
        let map: OnceMap<&str, usize> = OnceMap::default();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = map
                .get_or_try_init("a", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn failed_init_is_not_cached() {
        let map: OnceMap<&str, usize> = OnceMap::default();
        assert_eq!(map.get_or_try_init("a", || Err("boom")), Err("boom"));
        assert_eq!(map.get(&"a"), None);
        assert_eq!(map.len(), 0);
        assert_eq!(map.get_or_try_init("a", || Ok::<_, &str>(1)), Ok(1));
    }

    #[test]
    fn concurrent_callers_share_one_initializer() {
        let map: OnceMap<String, usize> = OnceMap::default();
        let calls = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    map.get_or_try_init("slow".to_string(), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok::<_, ()>(42)
                    })
                    .unwrap()
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(map.get(&"slow".to_string()), Some(42));
    }
}
