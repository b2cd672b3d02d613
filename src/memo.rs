//! Memoization keyed by the first argument.
//!
//! [`memoize`] wraps a function `f(key, rest)` so that the result for each
//! distinct `key` is computed once and then served from a [`Cache`]. The
//! remaining argument does not take part in the lookup: a second call with
//! a known key returns the stored result whatever `rest` is.
//!
//! The cache never evicts.

use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

/// Key/value store behind a [`Memoized`] function.
#[derive(Debug, Clone)]
pub struct Cache<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Cache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Returns the stored result for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Stores `value` under `key`, replacing any previous entry, and
    /// returns a reference to it.
    pub fn set(&mut self, key: K, value: V) -> &V {
        use std::collections::hash_map::Entry;
        match self.entries.entry(key) {
            Entry::Occupied(mut e) => {
                e.insert(value);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(value),
        }
    }

    /// All stored entries.
    pub fn list(&self) -> &HashMap<K, V> {
        &self.entries
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

type Body<K, A, V> = Rc<dyn Fn(&mut Memoized<K, A, V>, &K, A) -> V>;

/// A function whose results are cached by first argument.
///
/// Built by [`memoize`] or [`memoize_recursive`].
pub struct Memoized<K, A, V> {
    cache: Cache<K, V>,
    body: Body<K, A, V>,
}

impl<K, A, V> Memoized<K, A, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Returns the cached result for `key`, or computes, stores and
    /// returns `f(key, rest)`.
    pub fn call(&mut self, key: K, rest: A) -> V {
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!("memo cache hit");
            return hit.clone();
        }
        tracing::trace!(entries = self.cache.len(), "memo cache miss");
        let body = Rc::clone(&self.body);
        let value = body(self, &key, rest);
        self.cache.set(key, value).clone()
    }

    /// The underlying cache.
    pub fn cache(&self) -> &Cache<K, V> {
        &self.cache
    }

    /// Mutable access to the underlying cache, e.g. to seed entries.
    pub fn cache_mut(&mut self) -> &mut Cache<K, V> {
        &mut self.cache
    }
}

impl<K, A, V> std::fmt::Debug for Memoized<K, A, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Wraps `f` so that its results are cached by first argument.
///
/// # Examples
/// ```
/// use u_numchain::memo::memoize;
/// let mut square = memoize(|x: &u64, _: ()| x * x);
/// assert_eq!(square.call(12, ()), 144);
/// assert_eq!(square.cache().get(&12), Some(&144));
/// ```
pub fn memoize<K, A, V, F>(f: F) -> Memoized<K, A, V>
where
    K: Eq + Hash + Clone + 'static,
    A: 'static,
    V: Clone + 'static,
    F: Fn(&K, A) -> V + 'static,
{
    Memoized {
        cache: Cache::new(),
        body: Rc::new(move |_: &mut Memoized<K, A, V>, key: &K, rest: A| f(key, rest)),
    }
}

/// Like [`memoize`], but `f` receives the memoized function itself so it
/// can recurse through the cache.
///
/// # Examples
/// ```
/// use u_numchain::memo::memoize_recursive;
/// let mut factorial = memoize_recursive(|me, n: &u64, _: ()| {
///     if *n == 0 { 1 } else { n * me.call(n - 1, ()) }
/// });
/// assert_eq!(factorial.call(5, ()), 120);
/// assert_eq!(factorial.cache().len(), 6);
/// ```
pub fn memoize_recursive<K, A, V, F>(f: F) -> Memoized<K, A, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: Fn(&mut Memoized<K, A, V>, &K, A) -> V + 'static,
{
    Memoized {
        cache: Cache::new(),
        body: Rc::new(f),
    }
}
