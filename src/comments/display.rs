use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::remote::{Comment, Profile, SessionUser, UserId};

/// Stand-in address for authors other than the signed-in user, whose real
/// email is never readable from here.
pub fn placeholder_email(user_id: &UserId) -> String {
    let id = user_id.to_string();
    let prefix: String = id.chars().take(8).collect();
    format!("user_{prefix}@example.com")
}

/// Profile data as rendered: never absent, empty strings standing in for
/// missing fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileCard {
    pub bio: String,
    pub avatar_url: String,
}

impl From<Profile> for ProfileCard {
    fn from(profile: Profile) -> Self {
        Self {
            bio: profile.bio.unwrap_or_default(),
            avatar_url: profile.avatar_url.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub user_email: String,
    pub profile: ProfileCard,
}

impl DisplayComment {
    pub fn display_name(&self) -> &str {
        match self.user_email.split('@').next() {
            Some(name) if !name.is_empty() => name,
            _ => "Unknown user",
        }
    }

    pub fn avatar_initial(&self) -> char {
        self.user_email
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?')
    }

    pub fn is_authored_by(&self, user: Option<&SessionUser>) -> bool {
        user.is_some_and(|user| user.id == self.comment.user_id)
    }
}

/// Pairs a comment with its author's profile, if any, under the placeholder
/// email.
pub fn merge(comment: Comment, profile: Option<Profile>) -> DisplayComment {
    let user_email = placeholder_email(&comment.user_id);
    DisplayComment {
        comment,
        user_email,
        profile: profile.map(ProfileCard::from).unwrap_or_default(),
    }
}

/// Like [`merge`], for a comment the signed-in user just wrote: their real
/// email is known.
pub fn merge_own(comment: Comment, profile: Option<Profile>, user: &SessionUser) -> DisplayComment {
    DisplayComment {
        comment,
        user_email: user.email.clone(),
        profile: profile.map(ProfileCard::from).unwrap_or_default(),
    }
}

/// Distinct authors in order of first appearance.
pub fn distinct_authors(comments: &[Comment]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    comments
        .iter()
        .map(|c| c.user_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Joins comments with the fetched profile rows, oldest comment first.
pub fn assemble(mut comments: Vec<Comment>, profiles: Vec<Profile>) -> Vec<DisplayComment> {
    let by_user: HashMap<UserId, Profile> = profiles.into_iter().map(|p| (p.id, p)).collect();

    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    comments
        .into_iter()
        .map(|comment| {
            let profile = by_user.get(&comment.user_id).cloned();
            merge(comment, profile)
        })
        .collect()
}
