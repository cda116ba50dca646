use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Semaphore;

use super::{
    Comment, CommentId, NewComment, NewPost, Post, PostId, PostPatch, Profile, ProfileUpsert,
    RemoteError, RemoteResult, RemoteStore, SessionUser, Upload, UserId,
};

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    CommentRead,
    CommentWrite,
    ProfileRead,
    PostRead,
    PostWrite,
    Upload,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    comments: Vec<Comment>,
    profiles: HashMap<UserId, Profile>,
    posts: Vec<Post>,
    objects: HashMap<String, (String, Vec<u8>)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    faults: Mutex<HashSet<Fault>>,
    insert_gate: Mutex<Option<Arc<Semaphore>>>,
    read_gates: Mutex<HashMap<PostId, Arc<Semaphore>>>,
    comment_inserts: AtomicUsize,
    comment_reads: AtomicUsize,
}

/// In-process stand-in for the hosted service with the same ordering and
/// identity rules. Clones share their tables; [`MemoryStore::signed_in`]
/// hands out a view acting as a particular user.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    session: Option<SessionUser>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(&self, user: SessionUser) -> Self {
        Self {
            shared: self.shared.clone(),
            session: Some(user),
        }
    }

    pub fn signed_out(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            session: None,
        }
    }

    pub fn fail(&self, fault: Fault) {
        lock(&self.shared.faults).insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        lock(&self.shared.faults).remove(&fault);
    }

    /// Parks every comment insert until a permit is added to the returned
    /// semaphore.
    pub fn hold_comment_inserts(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *lock(&self.shared.insert_gate) = Some(gate.clone());
        gate
    }

    /// Number of comment inserts that reached the store, failed ones included.
    pub fn comment_inserts(&self) -> usize {
        self.shared.comment_inserts.load(Ordering::SeqCst)
    }

    /// Parks comment reads for `post_id` until a permit is added to the
    /// returned semaphore. Reads for other posts go through.
    pub fn hold_comment_reads(&self, post_id: PostId) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        lock(&self.shared.read_gates).insert(post_id, gate.clone());
        gate
    }

    /// Number of comment reads that reached the store.
    pub fn comment_reads(&self) -> usize {
        self.shared.comment_reads.load(Ordering::SeqCst)
    }

    async fn pass(gate: Option<Arc<Semaphore>>) -> RemoteResult<()> {
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| RemoteError::Unavailable(e.to_string()))?
                .forget();
        }
        Ok(())
    }

    pub fn seed_comment(
        &self,
        post_id: PostId,
        user_id: UserId,
        content: &str,
        created_at: OffsetDateTime,
    ) -> Comment {
        let mut tables = lock(&self.shared.tables);
        let comment = Comment {
            id: tables.next_id(),
            post_id,
            user_id,
            content: content.to_owned(),
            created_at,
        };
        tables.comments.push(comment.clone());
        comment
    }

    pub fn seed_profile(&self, profile: Profile) {
        lock(&self.shared.tables)
            .profiles
            .insert(profile.id, profile);
    }

    pub fn seed_post(&self, user_id: UserId, title: &str, created_at: OffsetDateTime) -> Post {
        let mut tables = lock(&self.shared.tables);
        let post = Post {
            id: tables.next_id(),
            user_id: Some(user_id),
            title: title.to_owned(),
            content: None,
            image_url: None,
            video_url: None,
            upvotes: 0,
            created_at,
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn stored_comments(&self) -> Vec<Comment> {
        lock(&self.shared.tables).comments.clone()
    }

    pub fn stored_object(&self, path: &str) -> Option<(String, Vec<u8>)> {
        lock(&self.shared.tables).objects.get(path).cloned()
    }

    fn check(&self, fault: Fault) -> RemoteResult<()> {
        if lock(&self.shared.faults).contains(&fault) {
            return Err(RemoteError::Unavailable(format!("{fault:?} injected")));
        }
        Ok(())
    }

    fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn session_user(&self) -> RemoteResult<Option<SessionUser>> {
        Ok(self.session.clone())
    }

    async fn comments_for_post(&self, post_id: PostId) -> RemoteResult<Vec<Comment>> {
        self.shared.comment_reads.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.shared.read_gates).get(&post_id).cloned();
        Self::pass(gate).await?;

        self.check(Fault::CommentRead)?;
        let mut comments: Vec<Comment> = lock(&self.shared.tables)
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn insert_comment(&self, comment: &NewComment) -> RemoteResult<Vec<Comment>> {
        self.shared.comment_inserts.fetch_add(1, Ordering::SeqCst);

        let gate = lock(&self.shared.insert_gate).clone();
        Self::pass(gate).await?;

        self.check(Fault::CommentWrite)?;
        let mut tables = lock(&self.shared.tables);
        let row = Comment {
            id: tables.next_id(),
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.comments.push(row.clone());
        Ok(vec![row])
    }

    async fn delete_comment(&self, id: CommentId) -> RemoteResult<()> {
        self.check(Fault::CommentWrite)?;
        lock(&self.shared.tables).comments.retain(|c| c.id != id);
        Ok(())
    }

    async fn profiles_by_ids(&self, ids: &[UserId]) -> RemoteResult<Vec<Profile>> {
        self.check(Fault::ProfileRead)?;
        let tables = lock(&self.shared.tables);
        Ok(ids
            .iter()
            .filter_map(|id| tables.profiles.get(id).cloned())
            .collect())
    }

    async fn profile(&self, id: UserId) -> RemoteResult<Option<Profile>> {
        self.check(Fault::ProfileRead)?;
        Ok(lock(&self.shared.tables).profiles.get(&id).cloned())
    }

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> RemoteResult<()> {
        lock(&self.shared.tables).profiles.insert(
            profile.id,
            Profile {
                id: profile.id,
                bio: Some(profile.bio.clone()),
                avatar_url: Some(profile.avatar_url.clone()),
            },
        );
        Ok(())
    }

    async fn posts(&self) -> RemoteResult<Vec<Post>> {
        self.check(Fault::PostRead)?;
        let posts = lock(&self.shared.tables).posts.clone();
        Ok(Self::newest_first(posts))
    }

    async fn posts_by_user(&self, user_id: UserId) -> RemoteResult<Vec<Post>> {
        self.check(Fault::PostRead)?;
        let posts = lock(&self.shared.tables)
            .posts
            .iter()
            .filter(|p| p.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(Self::newest_first(posts))
    }

    async fn post(&self, id: PostId) -> RemoteResult<Option<Post>> {
        self.check(Fault::PostRead)?;
        Ok(lock(&self.shared.tables)
            .posts
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn insert_post(&self, post: &NewPost) -> RemoteResult<()> {
        self.check(Fault::PostWrite)?;
        let mut tables = lock(&self.shared.tables);
        let id = tables.next_id();
        tables.posts.push(Post {
            id,
            user_id: Some(post.user_id),
            title: post.title.clone(),
            content: Some(post.content.clone()),
            image_url: Some(post.image_url.clone()),
            video_url: Some(post.video_url.clone()),
            upvotes: 0,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> RemoteResult<()> {
        self.check(Fault::PostWrite)?;
        if let Some(post) = lock(&self.shared.tables)
            .posts
            .iter_mut()
            .find(|p| p.id == id)
        {
            post.title = patch.title.clone();
            post.content = Some(patch.content.clone());
            post.video_url = Some(patch.video_url.clone());
            post.image_url = Some(patch.image_url.clone());
        }
        Ok(())
    }

    async fn set_upvotes(&self, id: PostId, upvotes: i64) -> RemoteResult<()> {
        self.check(Fault::PostWrite)?;
        if let Some(post) = lock(&self.shared.tables)
            .posts
            .iter_mut()
            .find(|p| p.id == id)
        {
            post.upvotes = upvotes;
        }
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> RemoteResult<()> {
        self.check(Fault::PostWrite)?;
        lock(&self.shared.tables).posts.retain(|p| p.id != id);
        Ok(())
    }

    async fn upload(&self, upload: Upload) -> RemoteResult<String> {
        self.check(Fault::Upload)?;
        let url = format!("memory://images/{}", upload.path);
        lock(&self.shared.tables)
            .objects
            .insert(upload.path, (upload.content_type, upload.bytes));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn posts_come_back_newest_first() {
        let store = MemoryStore::new();
        let author = Uuid::now_v7();
        store.seed_post(author, "old", datetime!(2024-01-01 0:00 UTC));
        store.seed_post(author, "new", datetime!(2024-02-01 0:00 UTC));
        store.seed_post(Uuid::now_v7(), "other", datetime!(2024-03-01 0:00 UTC));

        let titles: Vec<_> = store.posts().await.unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, ["other", "new", "old"]);

        let mine: Vec<_> = store
            .posts_by_user(author)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(mine, ["new", "old"]);
    }

    #[tokio::test]
    async fn upsert_creates_then_replaces_profile() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        assert_eq!(store.profile(id).await.unwrap(), None);

        for bio in ["first", "second"] {
            store
                .upsert_profile(&ProfileUpsert {
                    id,
                    bio: bio.into(),
                    avatar_url: String::new(),
                    updated_at: OffsetDateTime::now_utc(),
                })
                .await
                .unwrap();
        }

        let profile = store.profile(id).await.unwrap().unwrap();
        assert_eq!(profile.bio.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn clones_share_tables_but_not_sessions() {
        let store = MemoryStore::new();
        let user = SessionUser {
            id: Uuid::now_v7(),
            email: "u@yarn.club".into(),
        };
        let signed_in = store.signed_in(user.clone());
        signed_in.seed_comment(1, user.id, "shared", datetime!(2024-01-01 0:00 UTC));

        assert_eq!(store.session_user().await.unwrap(), None);
        assert_eq!(signed_in.session_user().await.unwrap(), Some(user));
        assert_eq!(store.comments_for_post(1).await.unwrap().len(), 1);
        assert_eq!(signed_in.signed_out().session_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn upload_keeps_object() {
        let store = MemoryStore::new();
        let url = store
            .upload(Upload {
                path: "public/1-hat.png".into(),
                content_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert_eq!(url, "memory://images/public/1-hat.png");
        assert_eq!(
            store.stored_object("public/1-hat.png"),
            Some(("image/png".to_owned(), vec![1, 2, 3]))
        );
    }
}
