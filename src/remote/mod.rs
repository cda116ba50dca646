//! The backend-as-a-service boundary: tables, the storage bucket and the
//! session user. Everything the app persists goes through [`RemoteStore`].

mod memory;
mod model;
mod rest;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{Fault, MemoryStore};
pub use model::{
    AuthSession, Comment, CommentId, NewComment, NewPost, Post, PostId, PostPatch, Profile,
    ProfileUpsert, SessionUser, Upload, UserId,
};
pub use rest::RestStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The signed-in user, or `None` for an anonymous visitor.
    async fn session_user(&self) -> RemoteResult<Option<SessionUser>>;

    /// Comments on a post, oldest first.
    async fn comments_for_post(&self, post_id: PostId) -> RemoteResult<Vec<Comment>>;
    /// Inserts a comment and returns the stored row(s).
    async fn insert_comment(&self, comment: &NewComment) -> RemoteResult<Vec<Comment>>;
    async fn delete_comment(&self, id: CommentId) -> RemoteResult<()>;

    async fn profiles_by_ids(&self, ids: &[UserId]) -> RemoteResult<Vec<Profile>>;
    async fn profile(&self, id: UserId) -> RemoteResult<Option<Profile>>;
    async fn upsert_profile(&self, profile: &ProfileUpsert) -> RemoteResult<()>;

    /// All posts, newest first.
    async fn posts(&self) -> RemoteResult<Vec<Post>>;
    /// Posts by one author, newest first.
    async fn posts_by_user(&self, user_id: UserId) -> RemoteResult<Vec<Post>>;
    async fn post(&self, id: PostId) -> RemoteResult<Option<Post>>;
    async fn insert_post(&self, post: &NewPost) -> RemoteResult<()>;
    async fn update_post(&self, id: PostId, patch: &PostPatch) -> RemoteResult<()>;
    async fn set_upvotes(&self, id: PostId, upvotes: i64) -> RemoteResult<()>;
    async fn delete_post(&self, id: PostId) -> RemoteResult<()>;

    /// Stores an object in the images bucket and returns its public URL.
    async fn upload(&self, upload: Upload) -> RemoteResult<String>;
}
