/*!

Hash containers and string hashing used throughout the crate.

All modules import `crate::HashMap`/`crate::HashSet` rather than the `std` versions so that the
hasher can be swapped in one place. Unit indices and production type ids are small dense
integers, for which `FxHasher` is much faster than SipHash.

*/

use std::hash::Hasher;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

/// A stable hash of a string, used to derive per-stream seeds from a base seed.
pub fn hash_str(data: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_str_is_stable() {
        assert_eq!(hash_str("DiseaseRng"), hash_str("DiseaseRng"));
        assert_ne!(hash_str("DiseaseRng"), hash_str("DetectionRng"));
    }

    #[test]
    fn fx_containers_behave_like_std() {
        let mut map: HashMap<usize, &str> = HashMap::default();
        map.insert(3, "three");
        let mut set: HashSet<usize> = HashSet::default();
        set.insert(3);
        assert_eq!(map.get(&3), Some(&"three"));
        assert!(set.contains(&3));
    }
}
