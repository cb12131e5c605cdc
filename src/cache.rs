use std::collections::VecDeque;

use serde_json::Value;
use tracing::debug;

use crate::bookmark::BookmarkRecord;
use crate::error::StoreError;
use crate::store::KvStore;

pub const CACHE_KEY: &str = "bookmarks";
pub const CACHE_CAPACITY: usize = 100;

/// Newest-first recency buffer of captured records, persisted as one value.
pub struct LocalCache<S> {
    store: S,
    entries: Option<VecDeque<BookmarkRecord>>,
}

impl<S: KvStore> LocalCache<S> {
    pub fn new(store: S) -> Self {
        LocalCache {
            store,
            entries: None,
        }
    }

    /// Insert at the front, drop whatever falls past capacity, write the whole list back.
    pub fn prepend(&mut self, record: BookmarkRecord) -> Result<(), StoreError> {
        self.load()?;
        let entries = self.entries.get_or_insert_with(VecDeque::new);
        entries.push_front(record);
        let evicted = if entries.len() > CACHE_CAPACITY {
            entries.pop_back()
        } else {
            None
        };

        let written = serde_json::to_value(&*entries)
            .map_err(StoreError::from)
            .and_then(|value| self.store.set_one(CACHE_KEY, value));
        if let Err(e) = written {
            // keep memory in step with what is on disk
            entries.pop_front();
            entries.extend(evicted);
            return Err(e);
        }
        debug!("Local cache now holds {} records", entries.len());
        Ok(())
    }

    pub fn entries(&mut self) -> Result<&VecDeque<BookmarkRecord>, StoreError> {
        self.load()
    }

    pub fn len(&mut self) -> Result<usize, StoreError> {
        Ok(self.load()?.len())
    }

    /// Read from the store on first access only.
    fn load(&mut self) -> Result<&VecDeque<BookmarkRecord>, StoreError> {
        if self.entries.is_none() {
            let entries = match self.store.get_one(CACHE_KEY)? {
                Some(Value::Null) | None => VecDeque::new(),
                Some(value) => {
                    let mut list: VecDeque<BookmarkRecord> = serde_json::from_value(value)?;
                    list.truncate(CACHE_CAPACITY);
                    list
                }
            };
            self.entries = Some(entries);
        }
        Ok(self.entries.get_or_insert_with(VecDeque::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark::BookmarkType;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn record(n: usize) -> BookmarkRecord {
        BookmarkRecord {
            url: format!("https://example.com/{}", n),
            title: format!("Page {}", n),
            tags: vec![],
            note: String::new(),
            favicon: None,
            domain: "example.com".into(),
            content: String::new(),
            summary: String::new(),
            keywords: vec![],
            extracted_at: Utc::now(),
            kind: BookmarkType::Page,
        }
    }

    #[test]
    fn newest_record_is_first() {
        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        cache.prepend(record(1)).unwrap();
        cache.prepend(record(2)).unwrap();
        let entries = cache.entries().unwrap();
        assert_eq!(entries[0].url, "https://example.com/2");
        assert_eq!(entries[1].url, "https://example.com/1");
    }

    #[test]
    fn bounded_and_evicts_oldest() {
        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        for n in 0..CACHE_CAPACITY + 25 {
            cache.prepend(record(n)).unwrap();
            assert!(cache.len().unwrap() <= CACHE_CAPACITY);
        }
        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), CACHE_CAPACITY);
        assert_eq!(entries[0].url, format!("https://example.com/{}", CACHE_CAPACITY + 24));
        assert_eq!(entries[CACHE_CAPACITY - 1].url, "https://example.com/25");
    }

    #[test]
    fn duplicates_are_kept() {
        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        cache.prepend(record(1)).unwrap();
        cache.prepend(record(1)).unwrap();
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn persisted_list_is_reloaded() {
        let store = MemoryStore::new();
        {
            let mut cache = LocalCache::new(&store);
            cache.prepend(record(1)).unwrap();
            cache.prepend(record(2)).unwrap();
        }
        let mut reopened = LocalCache::new(&store);
        let entries = reopened.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Page 2");
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let store = MemoryStore::failing();
        let mut cache = LocalCache::new(&store);
        assert!(cache.prepend(record(1)).is_err());
        assert_eq!(cache.len().unwrap(), 0);
    }
}
