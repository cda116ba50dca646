use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{
    AuthSession, Comment, CommentId, NewComment, NewPost, Post, PostId, PostPatch, Profile,
    ProfileUpsert, RemoteError, RemoteResult, RemoteStore, SessionUser, Upload, UserId,
};

/// Client for the hosted service's REST surface: PostgREST tables under
/// `/rest/v1`, the object store under `/storage/v1` and auth under `/auth/v1`.
///
/// Requests carry the project's anon key, plus the visitor's bearer token
/// once [`RestStore::scoped`] has attached a session, so row-level policies
/// see the real caller.
#[derive(Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    bucket: String,
    session: Option<AuthSession>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// The token endpoint's answer. Older deployments only report `expires_in`.
#[derive(Deserialize)]
struct TokenGrant {
    #[serde(flatten)]
    session: AuthSession,
    expires_in: Option<i64>,
}

impl TokenGrant {
    fn into_session(self, now: OffsetDateTime) -> AuthSession {
        let TokenGrant {
            mut session,
            expires_in,
        } = self;
        if session.expires_at.is_none() {
            session.expires_at = expires_in.map(|secs| now.unix_timestamp() + secs);
        }
        session
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, anon_key: &str, bucket: &str) -> RemoteResult<Self> {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            anon_key: anon_key.to_owned(),
            bucket: bucket.to_owned(),
            session: None,
        })
    }

    /// A copy of this client acting on behalf of `session`.
    pub fn scoped(&self, session: Option<AuthSession>) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    fn token(&self, grant_type: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", grant_type)])
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<AuthSession> {
        let req = self
            .token("password")
            .json(&Credentials { email, password });

        let grant: TokenGrant = self.fetch(req).await?;
        let session = grant.into_session(OffsetDateTime::now_utc());
        debug!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// Trades a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> RemoteResult<AuthSession> {
        let req = self
            .token("refresh_token")
            .json(&RefreshGrant { refresh_token });

        let grant: TokenGrant = self.fetch(req).await?;
        let session = grant.into_session(OffsetDateTime::now_utc());
        debug!(user_id = %session.user.id, expires_at = ?session.expires_at, "session refreshed");
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<()> {
        let req = self
            .http
            .post(format!("{}/auth/v1/signup", self.base_url))
            .json(&Credentials { email, password });

        self.send(req).await?;
        Ok(())
    }

    fn table(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{path}", self.base_url, self.bucket)
    }

    async fn send(&self, req: RequestBuilder) -> RemoteResult<Response> {
        let bearer = self
            .session
            .as_ref()
            .map_or(self.anon_key.as_str(), |s| s.access_token.as_str());

        let res = req
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .send()
            .await?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let text = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.msg).or(body.error_description))
            .unwrap_or(text);

        warn!(status = status.as_u16(), %message, "remote request rejected");
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> RemoteResult<T> {
        let res = self.send(req).await?;
        res.json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn first<T: DeserializeOwned>(&self, req: RequestBuilder) -> RemoteResult<Option<T>> {
        Ok(self.fetch::<Vec<T>>(req).await?.into_iter().next())
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn session_user(&self) -> RemoteResult<Option<SessionUser>> {
        if self.session.is_none() {
            return Ok(None);
        }

        let req = self.http.get(format!("{}/auth/v1/user", self.base_url));
        match self.fetch(req).await {
            Ok(user) => Ok(Some(user)),
            Err(RemoteError::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16() =>
            {
                debug!("session token rejected, treating visitor as anonymous");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn comments_for_post(&self, post_id: PostId) -> RemoteResult<Vec<Comment>> {
        let req = self.http.get(self.table("comments")).query(&[
            ("select", "*".to_owned()),
            ("post_id", format!("eq.{post_id}")),
            ("order", "created_at.asc".to_owned()),
        ]);
        self.fetch(req).await
    }

    async fn insert_comment(&self, comment: &NewComment) -> RemoteResult<Vec<Comment>> {
        let req = self
            .http
            .post(self.table("comments"))
            .header("Prefer", "return=representation")
            .json(comment);
        self.fetch(req).await
    }

    async fn delete_comment(&self, id: CommentId) -> RemoteResult<()> {
        let req = self
            .http
            .delete(self.table("comments"))
            .query(&[("id", format!("eq.{id}"))]);
        self.send(req).await?;
        Ok(())
    }

    async fn profiles_by_ids(&self, ids: &[UserId]) -> RemoteResult<Vec<Profile>> {
        let ids = ids
            .iter()
            .map(UserId::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let req = self.http.get(self.table("profiles")).query(&[
            ("select", "id,bio,avatar_url".to_owned()),
            ("id", format!("in.({ids})")),
        ]);
        self.fetch(req).await
    }

    async fn profile(&self, id: UserId) -> RemoteResult<Option<Profile>> {
        let req = self.http.get(self.table("profiles")).query(&[
            ("select", "id,bio,avatar_url".to_owned()),
            ("id", format!("eq.{id}")),
        ]);
        self.first(req).await
    }

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> RemoteResult<()> {
        let req = self
            .http
            .post(self.table("profiles"))
            .header("Prefer", "resolution=merge-duplicates")
            .json(profile);
        self.send(req).await?;
        Ok(())
    }

    async fn posts(&self) -> RemoteResult<Vec<Post>> {
        let req = self
            .http
            .get(self.table("posts"))
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.fetch(req).await
    }

    async fn posts_by_user(&self, user_id: UserId) -> RemoteResult<Vec<Post>> {
        let req = self.http.get(self.table("posts")).query(&[
            ("select", "*".to_owned()),
            ("user_id", format!("eq.{user_id}")),
            ("order", "created_at.desc".to_owned()),
        ]);
        self.fetch(req).await
    }

    async fn post(&self, id: PostId) -> RemoteResult<Option<Post>> {
        let req = self
            .http
            .get(self.table("posts"))
            .query(&[("select", "*".to_owned()), ("id", format!("eq.{id}"))]);
        self.first(req).await
    }

    async fn insert_post(&self, post: &NewPost) -> RemoteResult<()> {
        let req = self.http.post(self.table("posts")).json(post);
        self.send(req).await?;
        Ok(())
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> RemoteResult<()> {
        let req = self
            .http
            .patch(self.table("posts"))
            .query(&[("id", format!("eq.{id}"))])
            .json(patch);
        self.send(req).await?;
        Ok(())
    }

    async fn set_upvotes(&self, id: PostId, upvotes: i64) -> RemoteResult<()> {
        let req = self
            .http
            .patch(self.table("posts"))
            .query(&[("id", format!("eq.{id}"))])
            .json(&serde_json::json!({ "upvotes": upvotes }));
        self.send(req).await?;
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> RemoteResult<()> {
        let req = self
            .http
            .delete(self.table("posts"))
            .query(&[("id", format!("eq.{id}"))]);
        self.send(req).await?;
        Ok(())
    }

    async fn upload(&self, upload: Upload) -> RemoteResult<String> {
        let Upload {
            path,
            content_type,
            bytes,
        } = upload;

        debug!(%path, size = bytes.len(), %content_type, "uploading object");
        let req = self
            .http
            .post(format!(
                "{}/storage/v1/object/{}/{path}",
                self.base_url, self.bucket
            ))
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes);
        self.send(req).await?;

        Ok(self.public_url(&path))
    }
}
