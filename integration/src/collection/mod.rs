//! Collection type aliases shared across the workspace.

/// Fast `IndexMap` using the FNV hasher, appropriate for the small string/enum keys
/// (symbols, exchange ids) this system maps over.
pub type FnvIndexMap<K, V> = indexmap::IndexMap<K, V, fnv::FnvBuildHasher>;

/// Fast `IndexSet` using the FNV hasher.
pub type FnvIndexSet<T> = indexmap::IndexSet<T, fnv::FnvBuildHasher>;
