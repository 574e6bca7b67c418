/// A faster hash map, used wherever the hashed keys are not attacker-controlled.
pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

/// A faster hash set, used wherever the hashed values are not attacker-controlled.
pub type HashSet<T> = std::collections::HashSet<T, ahash::RandomState>;
