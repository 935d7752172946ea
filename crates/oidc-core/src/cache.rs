//! Request correlation cache.
//!
//! Authorization requests can round-trip through an interactive consent step.
//! To survive that detour the engine persists the original request parameters
//! in a cache under a random identifier, hands the identifier to the client
//! as `request_id`, and restores the parameters when the flow resumes.
//!
//! The storage backend is abstracted behind [`RequestCache`]; entries are
//! opaque byte payloads with an absolute expiry. [`CorrelationStore`] layers
//! the wire format and identifier generation on top.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use indexmap::IndexMap;
use rand::RngCore;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::message::Message;

/// Wire format version written at the head of every cache entry.
const ENTRY_FORMAT_VERSION: i32 = 1;

/// Byte-oriented cache backend for serialized requests.
///
/// Implementations must honor the absolute expiry passed to [`set`]: a
/// lookup after that instant must behave as a miss.
///
/// [`set`]: RequestCache::set
#[async_trait]
pub trait RequestCache: Send + Sync {
    /// Returns the payload stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// Stores `payload` under `key` until `expires_at`.
    async fn set(
        &self,
        key: &str,
        payload: Vec<u8>,
        expires_at: OffsetDateTime,
    ) -> Result<(), EngineError>;

    /// Removes the entry stored under `key`. Removing a missing entry is
    /// not an error.
    async fn remove(&self, key: &str) -> Result<(), EngineError>;
}

/// Persists and restores authorization request parameters across the
/// interactive consent detour.
pub struct CorrelationStore {
    cache: std::sync::Arc<dyn RequestCache>,
    lifetime: Duration,
}

impl CorrelationStore {
    /// Creates a store over the given backend. Entries expire `lifetime`
    /// after they are saved.
    #[must_use]
    pub fn new(cache: std::sync::Arc<dyn RequestCache>, lifetime: Duration) -> Self {
        Self { cache, lifetime }
    }

    /// Serializes the request parameters and stores them under a fresh
    /// random identifier. Returns the identifier.
    pub async fn save(&self, request: &Message) -> Result<String, EngineError> {
        let id = new_request_id();
        let payload = encode_entry(request);
        let expires_at = OffsetDateTime::now_utc() + self.lifetime;

        self.cache.set(&id, payload, expires_at).await?;
        debug!(request_id = %id, "stored authorization request");

        Ok(id)
    }

    /// Restores the parameters stored under `id`, or `None` when the entry
    /// is missing or expired. An entry that fails to decode (corruption, an
    /// unknown format version) is removed and reported as a miss, so the
    /// caller rejects the request as if it had never been cached.
    pub async fn restore(
        &self,
        id: &str,
    ) -> Result<Option<IndexMap<String, String>>, EngineError> {
        let Some(payload) = self.cache.get(id).await? else {
            return Ok(None);
        };

        match decode_entry(&payload) {
            Ok(parameters) => Ok(Some(parameters)),
            Err(error) => {
                warn!(request_id = %id, %error, "removing undecodable cached request");
                self.discard(id).await;
                Ok(None)
            }
        }
    }

    /// Removes the entry stored under `id`. Failures are logged and
    /// swallowed: a stale entry expires on its own and must never fail
    /// the response that completed the flow.
    pub async fn discard(&self, id: &str) {
        if let Err(error) = self.cache.remove(id).await {
            warn!(request_id = %id, %error, "failed to remove cached request");
        }
    }
}

/// Generates a 256-bit random identifier, base64url-encoded without padding.
#[must_use]
pub fn new_request_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Encodes the request parameters into the versioned binary entry format:
/// format version (i32 LE), pair count (i32 LE), then for each pair a
/// u32-LE-length-prefixed UTF-8 key followed by the value in the same shape.
fn encode_entry(request: &Message) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(64);
    buffer.extend_from_slice(&ENTRY_FORMAT_VERSION.to_le_bytes());
    buffer.extend_from_slice(&(request.len() as i32).to_le_bytes());

    for (key, value) in request.iter() {
        write_string(&mut buffer, key);
        write_string(&mut buffer, value);
    }

    buffer
}

fn write_string(buffer: &mut Vec<u8>, value: &str) {
    buffer.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
}

/// Decodes an entry produced by [`encode_entry`], preserving pair order.
fn decode_entry(payload: &[u8]) -> Result<IndexMap<String, String>, EngineError> {
    let mut reader = EntryReader::new(payload);

    let version = reader.read_i32()?;
    if version != ENTRY_FORMAT_VERSION {
        return Err(EngineError::serialization(format!(
            "unsupported cache entry version: {version}"
        )));
    }

    let count = reader.read_i32()?;
    if count < 0 {
        return Err(EngineError::serialization(
            "negative parameter count in cache entry",
        ));
    }

    let mut parameters = IndexMap::with_capacity(count as usize);
    for _ in 0..count {
        let key = reader.read_string()?;
        let value = reader.read_string()?;
        parameters.insert(key, value);
    }

    Ok(parameters)
}

struct EntryReader<'a> {
    payload: &'a [u8],
    position: usize,
}

impl<'a> EntryReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            position: 0,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], EngineError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| EngineError::serialization("truncated cache entry"))?;

        let slice = &self.payload[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32, EngineError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u32(&mut self) -> Result<u32, EngineError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_string(&mut self) -> Result<String, EngineError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| EngineError::serialization("invalid UTF-8 in cache entry"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RequestKind;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Minimal in-memory backend for exercising the store.
    #[derive(Default)]
    struct TestCache {
        entries: Mutex<HashMap<String, (Vec<u8>, OffsetDateTime)>>,
    }

    #[async_trait]
    impl RequestCache for TestCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
            let entries = self.entries.lock().await;
            Ok(entries.get(key).and_then(|(payload, expires_at)| {
                (*expires_at > OffsetDateTime::now_utc()).then(|| payload.clone())
            }))
        }

        async fn set(
            &self,
            key: &str,
            payload: Vec<u8>,
            expires_at: OffsetDateTime,
        ) -> Result<(), EngineError> {
            self.entries
                .lock()
                .await
                .insert(key.to_owned(), (payload, expires_at));
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), EngineError> {
            self.entries.lock().await.remove(key);
            Ok(())
        }
    }

    /// Backend whose remove always fails, for the best-effort discard path.
    struct FailingCache;

    #[async_trait]
    impl RequestCache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, EngineError> {
            Ok(None)
        }

        async fn set(
            &self,
            _key: &str,
            _payload: Vec<u8>,
            _expires_at: OffsetDateTime,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        async fn remove(&self, _key: &str) -> Result<(), EngineError> {
            Err(EngineError::cache("backend unavailable"))
        }
    }

    fn store() -> CorrelationStore {
        CorrelationStore::new(Arc::new(TestCache::default()), Duration::hours(1))
    }

    fn request() -> Message {
        let mut message = Message::new(RequestKind::Authorization);
        message.set_parameter("client_id", "client-1");
        message.set_parameter("response_type", "code");
        message.set_parameter("state", "xyz");
        message
    }

    #[test]
    fn test_request_id_shape() {
        let id = new_request_id();
        // 32 bytes base64url without padding.
        assert_eq!(id.len(), 43);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(id, new_request_id());
    }

    #[test]
    fn test_entry_format_layout() {
        let payload = encode_entry(&request());

        assert_eq!(&payload[0..4], &1i32.to_le_bytes());
        assert_eq!(&payload[4..8], &3i32.to_le_bytes());
        // First pair starts with the length-prefixed key "client_id".
        assert_eq!(&payload[8..12], &9u32.to_le_bytes());
        assert_eq!(&payload[12..21], b"client_id");
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut payload = encode_entry(&request());
        payload[0] = 7;

        let error = decode_entry(&payload).unwrap_err();
        assert!(matches!(error, EngineError::Serialization { .. }));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let payload = encode_entry(&request());
        let error = decode_entry(&payload[..payload.len() - 2]).unwrap_err();
        assert!(matches!(error, EngineError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_save_restore_round_trip() {
        let store = store();
        let request = request();

        let id = store.save(&request).await.unwrap();
        let restored = store.restore(&id).await.unwrap().unwrap();

        let expected: Vec<(&str, &str)> = request.iter().collect();
        let actual: Vec<(&str, &str)> = restored
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_restore_unknown_id_is_a_miss() {
        let store = store();
        let restored = store.restore("b3JkZXJfNjYK-not-a-real-id").await.unwrap();
        assert!(restored.is_none());
    }

    #[tokio::test]
    async fn test_restore_corrupt_entry_is_a_miss_and_removed() {
        let cache = Arc::new(TestCache::default());
        let store = CorrelationStore::new(cache.clone(), Duration::hours(1));

        let mut payload = encode_entry(&request());
        payload[0] = 7;
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);
        cache.set("bad-id", payload, expires_at).await.unwrap();

        assert!(store.restore("bad-id").await.unwrap().is_none());
        // The entry is gone, not just skipped.
        assert!(cache.entries.lock().await.get("bad-id").is_none());
    }

    #[tokio::test]
    async fn test_restore_expired_entry_is_a_miss() {
        let cache = Arc::new(TestCache::default());
        let store = CorrelationStore::new(cache.clone(), Duration::seconds(-1));

        let id = store.save(&request()).await.unwrap();
        assert!(store.restore(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discard_is_idempotent() {
        let store = store();
        let id = store.save(&request()).await.unwrap();

        store.discard(&id).await;
        store.discard(&id).await;

        assert!(store.restore(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discard_swallows_backend_errors() {
        let store = CorrelationStore::new(Arc::new(FailingCache), Duration::hours(1));
        // Must not panic or propagate.
        store.discard("some-id").await;
    }
}
