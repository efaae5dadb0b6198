use std::collections::HashMap;
use std::rc::Rc;

/// Loaded textures by path, ignoring case.
///
/// Failed loads are cached too so a missing texture is only looked for
/// once.
pub struct TextureCache<T> {
    table: HashMap<String, Option<Rc<T>>>,
}

impl<T> TextureCache<T> {
    pub fn new() -> TextureCache<T> {
        TextureCache { table: HashMap::with_capacity(32) }
    }

    /// Returns the texture for `path`, calling `load` on the first
    /// request for it. An empty path is never loaded or cached.
    pub fn get_or_load<F>(&mut self, path: &str, load: F) -> Option<Rc<T>>
    where
        F: FnOnce(&str) -> Option<T>,
    {
        if path.is_empty() {
            return None;
        }
        self.table
            .entry(path.to_lowercase())
            .or_insert_with(|| load(path).map(Rc::new))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Number of paths that resolved to a texture.
    pub fn num_loaded(&self) -> usize {
        self.table.values().filter(|t| t.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn case_insensitive_and_loads_once() {
        let mut cache = TextureCache::new();
        let loads = Cell::new(0);
        let load = |p: &str| {
            loads.set(loads.get() + 1);
            Some(p.to_string())
        };
        let a = cache.get_or_load("Textures/Iron.dds", load).unwrap();
        let b = cache.get_or_load("textures/iron.DDS", load).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(loads.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn misses_are_cached() {
        let mut cache: TextureCache<u32> = TextureCache::new();
        let loads = Cell::new(0);
        for _ in 0..3 {
            let t = cache.get_or_load("missing.dds", |_| {
                loads.set(loads.get() + 1);
                None
            });
            assert!(t.is_none());
        }
        assert_eq!(loads.get(), 1);
        assert_eq!(cache.num_loaded(), 0);
    }

    #[test]
    fn empty_path_is_not_inserted() {
        let mut cache: TextureCache<u32> = TextureCache::new();
        assert!(cache.get_or_load("", |_| Some(1)).is_none());
        assert_eq!(cache.len(), 0);
    }
}
