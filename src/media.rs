use axum::extract::Multipart;
use std::collections::HashMap;
use thiserror::Error;
use time::OffsetDateTime;

use crate::{
    AppResult,
    remote::{Upload, UserId},
};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Please upload a valid image file ({0}).")]
    UnsupportedType(&'static str),

    #[error("Image file is too large. Please choose a file smaller than 5MB.")]
    TooLarge,
}

/// Which images a form accepts.
#[derive(Debug, Clone, Copy)]
pub struct ImageRules {
    allowed: &'static [&'static str],
    label: &'static str,
}

/// New posts also take GIFs.
pub const POST_IMAGE: ImageRules = ImageRules {
    allowed: &["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"],
    label: "JPEG, PNG, GIF, or WebP",
};

pub const STILL_IMAGE: ImageRules = ImageRules {
    allowed: &["image/jpeg", "image/jpg", "image/png", "image/webp"],
    label: "JPEG, PNG, or WebP",
};

/// A file picked in a form, not yet checked.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Candidate {
    /// The last path component of the client's file name, reduced to
    /// `[A-Za-z0-9._-]` with leading dots removed.
    pub fn safe_name(&self) -> String {
        let last = self.file_name.rsplit(['/', '\\']).next().unwrap_or_default();
        let cleaned: String = last
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        match cleaned.trim_start_matches('.') {
            "" => "image".to_owned(),
            name => name.to_owned(),
        }
    }

    pub fn extension(&self) -> String {
        let name = self.safe_name();
        name.rsplit('.').next().unwrap_or_default().to_owned()
    }

    pub fn into_upload(self, path: String) -> Upload {
        Upload {
            path,
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

impl ImageRules {
    pub fn check(&self, file: &Candidate) -> Result<(), MediaError> {
        if file.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(MediaError::TooLarge);
        }
        if !self.allowed.contains(&file.content_type.as_str()) {
            return Err(MediaError::UnsupportedType(self.label));
        }
        Ok(())
    }
}

pub fn now_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

pub fn post_image_path(file: &Candidate, millis: i128) -> String {
    format!("public/{millis}-{}", file.safe_name())
}

pub fn replacement_image_path(file: &Candidate, millis: i128) -> String {
    format!("{millis}.{}", file.extension())
}

pub fn avatar_path(user_id: UserId, file: &Candidate, millis: i128) -> String {
    format!("avatars/avatar-{user_id}-{millis}.{}", file.extension())
}

/// Text fields and the first non-empty file of a multipart form.
#[derive(Debug, Default)]
pub struct MediaForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Candidate>,
}

impl MediaForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let bytes = field.bytes().await?;
                    if form.file.is_none() && !file_name.is_empty() && !bytes.is_empty() {
                        form.file = Some(Candidate {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                None => {
                    form.fields.insert(name, field.text().await?);
                }
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn file(name: &str, content_type: &str, size: usize) -> Candidate {
        Candidate {
            file_name: name.into(),
            content_type: content_type.into(),
            bytes: vec![0; size],
        }
    }

    #[test]
    fn gif_allowed_for_posts_only() {
        let gif = file("spin.gif", "image/gif", 10);
        assert_eq!(POST_IMAGE.check(&gif), Ok(()));
        assert_eq!(
            STILL_IMAGE.check(&gif),
            Err(MediaError::UnsupportedType("JPEG, PNG, or WebP"))
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert_eq!(STILL_IMAGE.check(&file("a.png", "image/png", MAX_UPLOAD_BYTES)), Ok(()));
        assert_eq!(
            STILL_IMAGE.check(&file("a.png", "image/png", MAX_UPLOAD_BYTES + 1)),
            Err(MediaError::TooLarge)
        );
    }

    #[test]
    fn rejects_non_images() {
        assert!(POST_IMAGE.check(&file("notes.pdf", "application/pdf", 10)).is_err());
    }

    #[test]
    fn object_paths() {
        let f = file("granny.square.png", "image/png", 1);
        let user = Uuid::parse_str("a1b2c3d4-e5f6-7890-abcd-ef1234567890").unwrap();

        assert_eq!(post_image_path(&f, 42), "public/42-granny.square.png");
        assert_eq!(replacement_image_path(&f, 42), "42.png");
        assert_eq!(
            avatar_path(user, &f, 42),
            "avatars/avatar-a1b2c3d4-e5f6-7890-abcd-ef1234567890-42.png"
        );
    }

    #[test]
    fn crafted_file_names_stay_in_their_folder() {
        let path = |name: &str| post_image_path(&file(name, "image/png", 1), 7);

        assert_eq!(path("../../avatars/x.png"), "public/7-x.png");
        assert_eq!(path("..\\..\\x.png"), "public/7-x.png");
        assert_eq!(path("a b#c?.png"), "public/7-a_b_c_.png");
        assert_eq!(path(".."), "public/7-image");
        assert_eq!(path("granny-square_2.png"), "public/7-granny-square_2.png");
        assert_eq!(
            replacement_image_path(&file("a.png/..", "image/png", 1), 7),
            "7.image"
        );
    }

    #[test]
    fn extension_falls_back_to_whole_name() {
        assert_eq!(file("blob", "image/png", 1).extension(), "blob");
    }
}
