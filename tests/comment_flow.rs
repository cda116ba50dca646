use std::sync::Arc;

use crochetcorner::{
    comments::{
        CommentError, CommentSection, Confirmation, DeleteOutcome, ProfileCard, fetch_comments,
        placeholder_email,
    },
    remote::{Fault, MemoryStore, Profile, SessionUser},
};
use time::macros::datetime;
use uuid::Uuid;

const P1: i64 = 1;

fn user(email: &str) -> SessionUser {
    SessionUser {
        id: Uuid::now_v7(),
        email: email.to_owned(),
    }
}


#[tokio::test]
async fn post_without_comments_yields_empty_list() {
    let store = MemoryStore::new();
    store.seed_comment(2, Uuid::now_v7(), "elsewhere", datetime!(2024-01-01 0:00 UTC));

    assert!(fetch_comments(&store, P1).await.unwrap().is_empty());
}

#[tokio::test]
async fn merges_profiles_and_placeholder_emails() {
    let store = MemoryStore::new();
    let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
    store.seed_profile(Profile {
        id: b,
        bio: Some("hi".into()),
        avatar_url: None,
    });
    store.seed_comment(P1, a, "first", datetime!(2024-01-01 10:00 UTC));
    store.seed_comment(P1, b, "second", datetime!(2024-01-01 11:00 UTC));

    let comments = fetch_comments(&store, P1).await.unwrap();

    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].comment.content, "first");
    assert_eq!(comments[0].profile, ProfileCard::default());
    assert_eq!(
        comments[0].user_email,
        format!("user_{}@example.com", &a.to_string()[..8])
    );
    assert_eq!(comments[1].comment.content, "second");
    assert_eq!(comments[1].profile.bio, "hi");
    assert_eq!(comments[1].profile.avatar_url, "");
    assert_eq!(comments[1].user_email, placeholder_email(&b));
}

#[tokio::test]
async fn fetch_orders_oldest_first_whatever_the_insert_order() {
    let store = MemoryStore::new();
    let a = Uuid::now_v7();
    store.seed_comment(P1, a, "late", datetime!(2024-05-03 0:00 UTC));
    store.seed_comment(P1, a, "early", datetime!(2024-05-01 0:00 UTC));
    store.seed_comment(P1, a, "middle", datetime!(2024-05-02 0:00 UTC));

    let contents: Vec<_> = fetch_comments(&store, P1)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.comment.content)
        .collect();
    assert_eq!(contents, ["early", "middle", "late"]);
}

#[tokio::test]
async fn failed_refresh_keeps_displayed_list() {
    let store = MemoryStore::new();
    let a = Uuid::now_v7();
    store.seed_comment(P1, a, "kept", datetime!(2024-01-01 0:00 UTC));

    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();
    assert_eq!(section.comments().len(), 1);

    store.seed_comment(P1, a, "unseen", datetime!(2024-01-02 0:00 UTC));
    store.fail(Fault::CommentRead);
    assert!(matches!(section.refresh(&store).await, Err(CommentError::RemoteRead(_))));
    assert_eq!(section.comments().len(), 1);

    store.heal(Fault::CommentRead);
    store.fail(Fault::ProfileRead);
    assert!(matches!(section.refresh(&store).await, Err(CommentError::RemoteRead(_))));
    assert_eq!(section.comments().len(), 1);

    store.heal(Fault::ProfileRead);
    section.refresh(&store).await.unwrap();
    assert_eq!(section.comments().len(), 2);
}

#[tokio::test]
async fn anonymous_submit_is_refused_without_writing() {
    let store = MemoryStore::new();
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();

    let result = section.submit(&store, P1, "nice!").await;

    assert!(matches!(result, Err(CommentError::Unauthenticated)));
    assert_eq!(store.comment_inserts(), 0);
    assert_eq!(section.draft(), "nice!");
}

#[tokio::test]
async fn blank_submit_is_refused_without_writing() {
    let store = MemoryStore::new().signed_in(user("u@yarn.club"));
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();

    for text in ["", "   ", "\n\t "] {
        assert!(matches!(
            section.submit(&store, P1, text).await,
            Err(CommentError::Validation)
        ));
    }
    assert_eq!(store.comment_inserts(), 0);
    assert!(!section.is_submitting());
}

#[tokio::test]
async fn submit_appends_with_real_email_and_clears_draft() {
    let me = user("granny@yarn.club");
    let store = MemoryStore::new();
    store.seed_profile(Profile {
        id: me.id,
        bio: Some("amigurumi fan".into()),
        avatar_url: Some("https://cdn/avatar.png".into()),
    });
    store.seed_comment(P1, Uuid::now_v7(), "older", datetime!(2020-01-01 0:00 UTC));

    let store = store.signed_in(me.clone());
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();

    let added = section.submit(&store, P1, "  lovely stitches  ").await.unwrap();

    assert_eq!(added.comment.content, "lovely stitches");
    assert_eq!(added.comment.user_id, me.id);
    assert_eq!(added.user_email, "granny@yarn.club");
    assert_ne!(added.user_email, placeholder_email(&me.id));
    assert_eq!(added.profile.bio, "amigurumi fan");

    let shown = section.comments();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown.last(), Some(&added));
    assert_eq!(section.draft(), "");
    assert!(!section.is_submitting());
}

#[tokio::test]
async fn submit_without_profile_uses_empty_card() {
    let store = MemoryStore::new().signed_in(user("new@yarn.club"));
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();

    let added = section.submit(&store, P1, "hello").await.unwrap();
    assert_eq!(added.profile, ProfileCard::default());
}

#[tokio::test]
async fn failed_insert_keeps_draft_and_list() {
    let store = MemoryStore::new().signed_in(user("u@yarn.club"));
    store.fail(Fault::CommentWrite);
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();

    let result = section.submit(&store, P1, "try again").await;

    assert!(matches!(result, Err(CommentError::RemoteWrite(_))));
    assert_eq!(section.draft(), "try again");
    assert!(section.comments().is_empty());
    assert!(!section.is_submitting());

    store.heal(Fault::CommentWrite);
    section.submit(&store, P1, &section.draft()).await.unwrap();
    assert_eq!(section.comments().len(), 1);
}

#[tokio::test]
async fn overlapping_submits_write_once() {
    let store = MemoryStore::new().signed_in(user("u@yarn.club"));
    let gate = store.hold_comment_inserts();
    let section = Arc::new(CommentSection::new());
    section.open(&store, P1).await.unwrap();

    let first = tokio::spawn({
        let (section, store) = (section.clone(), store.clone());
        async move { section.submit(&store, P1, "first!").await }
    });
    while store.comment_inserts() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(section.is_submitting());

    let second = section.submit(&store, P1, "second!").await;
    assert!(matches!(second, Err(CommentError::SubmissionInFlight)));

    gate.add_permits(1);
    let first = first.await.unwrap().unwrap();

    assert_eq!(first.comment.content, "first!");
    assert_eq!(store.comment_inserts(), 1);
    assert_eq!(store.stored_comments().len(), 1);
    assert_eq!(section.comments().len(), 1);
    assert!(!section.is_submitting());
}

#[tokio::test]
async fn delete_removes_only_the_target() {
    let me = user("u@yarn.club");
    let store = MemoryStore::new().signed_in(me.clone());
    let keep = store.seed_comment(P1, me.id, "keep", datetime!(2024-01-01 0:00 UTC));
    let gone = store.seed_comment(P1, me.id, "gone", datetime!(2024-01-02 0:00 UTC));
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();

    let outcome = section.delete(&store, gone.id, Confirmation::Confirmed).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    let ids: Vec<_> = section.comments().iter().map(|c| c.comment.id).collect();
    assert_eq!(ids, [keep.id]);
    assert_eq!(store.stored_comments().len(), 1);
}

#[tokio::test]
async fn declined_delete_touches_nothing() {
    let store = MemoryStore::new();
    let c = store.seed_comment(P1, Uuid::now_v7(), "stays", datetime!(2024-01-01 0:00 UTC));
    store.fail(Fault::CommentWrite);
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();

    let outcome = section.delete(&store, c.id, Confirmation::Declined).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Cancelled);
    assert_eq!(section.comments().len(), 1);
    assert_eq!(store.stored_comments().len(), 1);
}

#[tokio::test]
async fn failed_delete_leaves_list_unchanged() {
    let store = MemoryStore::new();
    let c = store.seed_comment(P1, Uuid::now_v7(), "stays", datetime!(2024-01-01 0:00 UTC));
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();
    store.fail(Fault::CommentWrite);

    let result = section.delete(&store, c.id, Confirmation::Confirmed).await;

    assert!(matches!(result, Err(CommentError::RemoteWrite(_))));
    let shown = section.comments();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].comment.id, c.id);
}

#[tokio::test]
async fn switching_posts_resets_the_view() {
    let store = MemoryStore::new().signed_in(user("u@yarn.club"));
    store.seed_comment(P1, Uuid::now_v7(), "on one", datetime!(2024-01-01 0:00 UTC));
    store.fail(Fault::CommentWrite);
    let section = CommentSection::new();
    section.open(&store, P1).await.unwrap();
    let _ = section.submit(&store, P1, "unsent draft").await;
    assert_eq!(section.draft(), "unsent draft");

    section.open(&store, 2).await.unwrap();

    assert_eq!(section.post_id(), Some(2));
    assert!(section.comments().is_empty());
    assert_eq!(section.draft(), "");
}

#[tokio::test]
async fn submit_for_another_post_does_not_touch_open_thread() {
    let store = MemoryStore::new().signed_in(user("u@yarn.club"));
    let section = CommentSection::new();
    section.open(&store, 2).await.unwrap();
    store.fail(Fault::CommentWrite);
    let _ = section.submit(&store, 2, "draft on two").await;
    store.heal(Fault::CommentWrite);

    section.submit(&store, P1, "meant for one").await.unwrap();

    assert!(section.comments().is_empty());
    assert_eq!(section.draft(), "draft on two");
    assert_eq!(fetch_comments(&store, P1).await.unwrap().len(), 1);

    store.fail(Fault::CommentWrite);
    let _ = section.submit(&store, P1, "also for one").await;
    assert_eq!(section.draft(), "draft on two");
}

#[tokio::test]
async fn fetch_finishing_after_a_switch_is_discarded() {
    let store = MemoryStore::new();
    store.seed_comment(P1, Uuid::now_v7(), "on one", datetime!(2024-01-01 0:00 UTC));
    store.seed_comment(2, Uuid::now_v7(), "on two", datetime!(2024-01-01 0:00 UTC));
    let section = Arc::new(CommentSection::new());
    section.open(&store, P1).await.unwrap();

    let gate = store.hold_comment_reads(P1);
    let reads = store.comment_reads();
    let late = tokio::spawn({
        let (section, store) = (section.clone(), store.clone());
        async move { section.refresh(&store).await }
    });
    while store.comment_reads() == reads {
        tokio::task::yield_now().await;
    }

    section.open(&store, 2).await.unwrap();
    gate.add_permits(1);
    late.await.unwrap().unwrap();

    assert_eq!(section.post_id(), Some(2));
    let contents: Vec<_> = section
        .comments()
        .into_iter()
        .map(|c| c.comment.content)
        .collect();
    assert_eq!(contents, ["on two"]);
}
