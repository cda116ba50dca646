use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use lru::LruCache;
use uuid::Uuid;

use super::CommentSection;

/// One [`CommentSection`] per browser session, least recently used evicted
/// first.
pub struct CommentViews {
    inner: Mutex<LruCache<Uuid, Arc<CommentSection>>>,
}

impl CommentViews {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_or_insert(&self, view_id: Uuid) -> Arc<CommentSection> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(view_id, || Arc::new(CommentSection::new()))
            .clone()
    }

    pub fn forget(&self, view_id: &Uuid) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(view_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
