//! Shared content-fetch cache.
//!
//! Save-draft and send can be triggered close together; both need the
//! rendered editor content. The cache makes concurrent requesters share
//! one asynchronous fetch, and tears the cached content down when the
//! last user releases its lease.

use crate::editor::{ContentEditor, EditorContent};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CacheState {
    users: AtomicUsize,
    slot: Mutex<Option<Arc<EditorContent>>>,
}

/// Reference-counted cache of one fetched [`EditorContent`].
#[derive(Default)]
pub struct ContentCache {
    state: Arc<CacheState>,
    /// Serializes fetches: only one content request is in flight at a
    /// time; later requesters find the slot filled.
    fetch_gate: tokio::sync::Mutex<()>,
}

impl ContentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a lease on the editor content, fetching it if no other
    /// user has already done so.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the token fires first, or
    /// [`Error::ContentFetch`] when the editor reports a failure.
    pub async fn acquire(
        &self,
        editor: &dyn ContentEditor,
        cancel: &CancellationToken,
    ) -> Result<ContentLease> {
        self.state.users.fetch_add(1, Ordering::SeqCst);

        let result = self.acquire_inner(editor, cancel).await;
        if result.is_err() {
            Self::release(&self.state);
        }
        result
    }

    async fn acquire_inner(
        &self,
        editor: &dyn ContentEditor,
        cancel: &CancellationToken,
    ) -> Result<ContentLease> {
        let _gate = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            gate = self.fetch_gate.lock() => gate,
        };

        if let Some(content) = self.cached() {
            return Ok(ContentLease {
                state: Arc::clone(&self.state),
                content,
            });
        }

        let fetched = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            fetched = editor.content(cancel) => fetched.map_err(Error::ContentFetch)?,
        };

        let content = Arc::new(fetched);
        if let Ok(mut slot) = self.state.slot.lock() {
            *slot = Some(Arc::clone(&content));
        }

        Ok(ContentLease {
            state: Arc::clone(&self.state),
            content,
        })
    }

    fn cached(&self) -> Option<Arc<EditorContent>> {
        self.state.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn release(state: &Arc<CacheState>) {
        if state.users.fetch_sub(1, Ordering::SeqCst) == 1 {
            if let Ok(mut slot) = state.slot.lock() {
                *slot = None;
            }
        }
    }
}

/// A lease on fetched editor content. Dropping the last lease clears
/// the cache so the next build fetches fresh content.
pub struct ContentLease {
    state: Arc<CacheState>,
    content: Arc<EditorContent>,
}

impl ContentLease {
    /// The fetched content.
    #[must_use]
    pub fn content(&self) -> &EditorContent {
        &self.content
    }
}

impl std::fmt::Debug for ContentLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentLease")
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl Drop for ContentLease {
    fn drop(&mut self) {
        ContentCache::release(&self.state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingEditor {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ContentEditor for CountingEditor {
        async fn content(&self, _cancel: &CancellationToken) -> std::result::Result<EditorContent, String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent acquirers pile up on the gate.
            tokio::task::yield_now().await;
            Ok(EditorContent {
                to_send_plain: Some("body".to_string()),
                ..EditorContent::default()
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_acquire_shares_one_fetch() {
        let cache = Arc::new(ContentCache::new());
        let editor = Arc::new(CountingEditor {
            fetches: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();

        let lease_a = {
            let cache = Arc::clone(&cache);
            let editor = Arc::clone(&editor);
            let cancel = cancel.clone();
            tokio::spawn(async move { cache.acquire(editor.as_ref(), &cancel).await })
        };
        let lease_b = {
            let cache = Arc::clone(&cache);
            let editor = Arc::clone(&editor);
            let cancel = cancel.clone();
            tokio::spawn(async move { cache.acquire(editor.as_ref(), &cancel).await })
        };

        let lease_a = lease_a.await.unwrap().unwrap();
        let lease_b = lease_b.await.unwrap().unwrap();

        assert_eq!(editor.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(lease_a.content(), lease_b.content());
    }

    #[tokio::test]
    async fn test_cache_tears_down_after_last_lease() {
        let cache = ContentCache::new();
        let editor = CountingEditor {
            fetches: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();

        let lease = cache.acquire(&editor, &cancel).await.unwrap();
        drop(lease);
        assert_eq!(editor.fetches.load(Ordering::SeqCst), 1);

        // A fresh build after teardown fetches again.
        let _lease = cache.acquire(&editor, &cancel).await.unwrap();
        assert_eq!(editor.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lease_debug_shows_content_only() {
        let cache = ContentCache::new();
        let editor = CountingEditor {
            fetches: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();

        let lease = cache.acquire(&editor, &cancel).await.unwrap();
        let rendered = format!("{lease:?}");
        assert!(rendered.starts_with("ContentLease"));
        assert!(rendered.contains("body"));
    }

    #[tokio::test]
    async fn test_cancelled_acquire() {
        let cache = ContentCache::new();
        let editor = CountingEditor {
            fetches: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache.acquire(&editor, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(editor.fetches.load(Ordering::SeqCst), 0);
    }
}
