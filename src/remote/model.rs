use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub type PostId = i64;
pub type CommentId = i64;
pub type UserId = Uuid;

/// A row of the `comments` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub content: String,
    pub user_id: UserId,
    pub post_id: PostId,
}

/// A row of the `profiles` table. The row may not exist until the user first
/// edits their account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpsert {
    pub id: UserId,
    pub bio: String,
    pub avatar_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Post {
    pub fn is_authored_by(&self, user: Option<&SessionUser>) -> bool {
        matches!((self.user_id, user), (Some(author), Some(user)) if author == user.id)
    }

    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn video(&self) -> Option<&str> {
        self.video_url.as_deref().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub video_url: String,
    pub image_url: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPatch {
    pub title: String,
    pub content: String,
    pub video_url: String,
    pub image_url: String,
}

/// The identity of the signed-in visitor as known to the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
}

impl SessionUser {
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

/// Credentials handed out by the auth service on sign-in or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix time at which `access_token` stops being accepted.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl AuthSession {
    /// Tokens this close to expiry are renewed before use.
    pub const REFRESH_MARGIN_SECS: i64 = 60;

    pub fn needs_refresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_some_and(|at| at - Self::REFRESH_MARGIN_SECS <= now.unix_timestamp())
    }
}

/// An object headed for the storage bucket.
#[derive(Debug, Clone)]
pub struct Upload {
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
