//! Content-addressed resource cache / 内容寻址资源缓存
//!
//! 键是内容+MIME类型的摘要：同样的字节永远得到同样的键，
//! 键因此可以在 HTTP 边界当作永不过期的缓存令牌用。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

/// Cached immutable payload / 缓存的不可变负载
#[derive(Debug, Clone)]
pub struct CachedResource {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
}

/// Compute the content key for a payload / 计算内容键
///
/// bytes 和 mime 之间放一个 0 字节做定界，避免拼接歧义
pub fn content_key(bytes: &[u8], mime_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update([0u8]);
    hasher.update(mime_type.as_bytes());
    hex::encode(hasher.finalize())
}

/// In-memory content-addressed cache / 内存内容寻址缓存
#[derive(Default)]
pub struct ResourceCache {
    entries: RwLock<HashMap<String, CachedResource>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload and return its content key / 存入负载，返回内容键
    pub fn put(&self, bytes: Vec<u8>, mime_type: &str) -> String {
        let key = content_key(&bytes, mime_type);
        let mut entries = self.entries.write();
        // 同键即同内容，重复 put 只是覆盖等价条目
        entries.insert(
            key.clone(),
            CachedResource {
                bytes: Arc::from(bytes.into_boxed_slice()),
                mime_type: mime_type.to_string(),
            },
        );
        key
    }

    pub fn get(&self, key: &str) -> Option<CachedResource> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cache = ResourceCache::new();
        let payload = b"body { color: red; }".to_vec();

        let key = cache.put(payload.clone(), "text/css");
        let cached = cache.get(&key).unwrap();

        assert_eq!(&*cached.bytes, payload.as_slice());
        assert_eq!(cached.mime_type, "text/css");
    }

    #[test]
    fn test_key_is_deterministic() {
        let cache = ResourceCache::new();
        let key1 = cache.put(b"same bytes".to_vec(), "text/plain");
        let key2 = cache.put(b"same bytes".to_vec(), "text/plain");
        assert_eq!(key1, key2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_mime_type_is_part_of_identity() {
        let key_css = content_key(b"same bytes", "text/css");
        let key_plain = content_key(b"same bytes", "text/plain");
        assert_ne!(key_css, key_plain);
    }

    #[test]
    fn test_missing_key() {
        let cache = ResourceCache::new();
        assert!(cache.get("deadbeef").is_none());
        assert!(cache.is_empty());
    }
}
