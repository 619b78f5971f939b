//! Per-connection prepared statement cache, keyed by SQL text.
//!
//! Bounded by `statement_cache_capacity` on [`crate::options::MySqlConnectOptions`];
//! when full, the least-recently-used entry is evicted and the caller is
//! responsible for closing its server-side statement with `COM_STMT_CLOSE`.

use hashlink::LruCache;

use crate::protocol::StmtPrepareOk;

#[derive(Debug, Clone)]
pub(crate) struct CachedStatement {
    pub statement_id: u32,
    pub params: u16,
    pub columns: u16,
}

impl From<StmtPrepareOk> for CachedStatement {
    fn from(ok: StmtPrepareOk) -> Self {
        CachedStatement {
            statement_id: ok.statement_id,
            params: ok.params,
            columns: ok.columns,
        }
    }
}

/// `None` when `statement_cache_capacity` is 0: caching is disabled
/// entirely rather than silently coerced to a capacity of one.
pub(crate) struct StatementCache {
    cache: Option<LruCache<String, CachedStatement>>,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        StatementCache {
            cache: (capacity > 0).then(|| LruCache::new(capacity)),
        }
    }

    pub fn get(&mut self, sql: &str) -> Option<CachedStatement> {
        self.cache.as_mut()?.get(sql).cloned()
    }

    /// Inserts `statement`, returning the evicted entry's id if the cache
    /// was already at capacity. A no-op (and never an eviction) when
    /// caching is disabled.
    pub fn insert(&mut self, sql: String, statement: CachedStatement) -> Option<u32> {
        let cache = self.cache.as_mut()?;

        let evicted = if cache.len() >= cache.capacity() && !cache.contains_key(&sql) {
            cache.remove_lru().map(|(_, v)| v.statement_id)
        } else {
            None
        };

        cache.insert(sql, statement);
        evicted
    }

    pub fn clear(&mut self) -> Vec<u32> {
        let Some(cache) = self.cache.as_mut() else {
            return Vec::new();
        };

        let ids = cache.iter().map(|(_, v)| v.statement_id).collect();
        cache.clear();
        ids
    }
}
