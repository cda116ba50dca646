use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::remote::{CommentId, NewComment, PostId, RemoteError, RemoteStore};

use super::display::{DisplayComment, assemble, distinct_authors, merge_own};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("You must be logged in to comment.")]
    Unauthenticated,

    #[error("Please enter a comment.")]
    Validation,

    #[error("A comment is already being added.")]
    SubmissionInFlight,

    #[error("Failed to load comments: {0}")]
    RemoteRead(#[source] RemoteError),

    #[error("Failed to save comment: {0}")]
    RemoteWrite(#[source] RemoteError),
}

/// Whether the visitor confirmed an irreversible action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Reads a post's comments and their authors' profiles and merges them for
/// display, oldest first.
pub async fn fetch_comments(
    store: &dyn RemoteStore,
    post_id: PostId,
) -> Result<Vec<DisplayComment>, CommentError> {
    let comments = store
        .comments_for_post(post_id)
        .await
        .map_err(CommentError::RemoteRead)?;

    if comments.is_empty() {
        return Ok(Vec::new());
    }

    let authors = distinct_authors(&comments);
    let profiles = store
        .profiles_by_ids(&authors)
        .await
        .map_err(CommentError::RemoteRead)?;

    debug!(
        post_id,
        comments = comments.len(),
        profiles = profiles.len(),
        "merging comments with profiles"
    );
    Ok(assemble(comments, profiles))
}

#[derive(Default)]
struct View {
    post_id: Option<PostId>,
    comments: Vec<DisplayComment>,
    draft: String,
}

/// The comment thread one visitor is looking at: the displayed list, the
/// text in the box, and the single-flight flag for submissions.
///
/// The section holds no credentials. Every operation takes the store for the
/// current request, so a refreshed session token is used as soon as it exists.
pub struct CommentSection {
    view: Mutex<View>,
    submitting: AtomicBool,
}

struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CommentSection {
    pub fn new() -> Self {
        Self {
            view: Mutex::new(View::default()),
            submitting: AtomicBool::new(false),
        }
    }

    fn view(&self) -> MutexGuard<'_, View> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn post_id(&self) -> Option<PostId> {
        self.view().post_id
    }

    pub fn comments(&self) -> Vec<DisplayComment> {
        self.view().comments.clone()
    }

    pub fn draft(&self) -> String {
        self.view().draft.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Points the section at `post_id` and loads its thread. Switching posts
    /// empties the list and the draft first.
    pub async fn open(
        &self,
        store: &dyn RemoteStore,
        post_id: PostId,
    ) -> Result<(), CommentError> {
        {
            let mut view = self.view();
            if view.post_id != Some(post_id) {
                *view = View {
                    post_id: Some(post_id),
                    ..View::default()
                };
            }
        }
        self.refresh(store).await
    }

    /// Replaces the displayed list with a fresh read of the open post.
    ///
    /// A failed read leaves the list as it was. A read that completes after
    /// the section moved to another post is dropped.
    pub async fn refresh(&self, store: &dyn RemoteStore) -> Result<(), CommentError> {
        let Some(post_id) = self.post_id() else {
            return Ok(());
        };

        let fresh = match fetch_comments(store, post_id).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(post_id, error = %e, "comment fetch failed");
                return Err(e);
            }
        };

        let mut view = self.view();
        if view.post_id != Some(post_id) {
            debug!(post_id, current = ?view.post_id, "discarding stale comment fetch");
            return Ok(());
        }
        view.comments = fresh;
        Ok(())
    }

    /// Adds a comment as the signed-in user and appends it to the list.
    ///
    /// Only one submission runs at a time; a call made while another is in
    /// flight fails with [`CommentError::SubmissionInFlight`] without touching
    /// the store. When `post_id` is the open post, the draft keeps `text`
    /// unless the insert succeeds; other posts leave the draft alone.
    pub async fn submit(
        &self,
        store: &dyn RemoteStore,
        post_id: PostId,
        text: &str,
    ) -> Result<DisplayComment, CommentError> {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            debug!(post_id, "ignoring submit while another is in flight");
            return Err(CommentError::SubmissionInFlight);
        };

        {
            let mut view = self.view();
            if view.post_id == Some(post_id) {
                view.draft = text.to_owned();
            }
        }

        let user = store
            .session_user()
            .await
            .map_err(CommentError::RemoteRead)?
            .ok_or(CommentError::Unauthenticated)?;

        let content = text.trim();
        if content.is_empty() {
            return Err(CommentError::Validation);
        }

        let new = NewComment {
            content: content.to_owned(),
            user_id: user.id,
            post_id,
        };
        let row = match store.insert_comment(&new).await {
            Ok(rows) => rows.into_iter().next().ok_or_else(|| {
                CommentError::RemoteWrite(RemoteError::Decode(
                    "insert returned no rows".to_owned(),
                ))
            })?,
            Err(e) => {
                warn!(post_id, error = %e, "comment insert failed");
                return Err(CommentError::RemoteWrite(e));
            }
        };

        let profile = store.profile(user.id).await.unwrap_or_else(|e| {
            warn!(user_id = %user.id, error = %e, "own profile unavailable, using default");
            None
        });

        let added = merge_own(row, profile, &user);
        let comment_id = added.comment.id;
        info!(post_id, comment_id, "comment added");

        let mut view = self.view();
        if view.post_id == Some(post_id) {
            view.comments.push(added.clone());
            view.draft.clear();
        }

        Ok(added)
    }

    /// Deletes a comment once the visitor has confirmed, then drops exactly
    /// that entry from the list. On failure the list is untouched.
    pub async fn delete(
        &self,
        store: &dyn RemoteStore,
        comment_id: CommentId,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome, CommentError> {
        if confirmation == Confirmation::Declined {
            return Ok(DeleteOutcome::Cancelled);
        }

        if let Err(e) = store.delete_comment(comment_id).await {
            warn!(comment_id, error = %e, "comment delete failed");
            return Err(CommentError::RemoteWrite(e));
        }

        self.view().comments.retain(|c| c.comment.id != comment_id);
        info!(comment_id, "comment deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

impl Default for CommentSection {
    fn default() -> Self {
        Self::new()
    }
}
