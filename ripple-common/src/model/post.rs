use crate::model::{Id, image::Image, user::UserMarker};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

/// Feed views return at most this many posts per page.
pub const FEED_PAGE_SIZE: usize = 10;

pub const POST_CONTENT_MAX_LEN: usize = 1000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A post, a comment (`parent` set) or a repost (`original` set).
///
/// `reposts` lists the live posts sharing this one; it is populated by the
/// feed views only, mirroring what the feed screens render.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub content: PostContent,
    pub created_at: UtcDateTime,
    pub deleted_at: Option<UtcDateTime>,
    pub parent: Option<Id<PostMarker>>,
    pub original: Option<Id<PostMarker>>,
    pub images: Vec<Image>,
    pub reposts: Vec<Id<PostMarker>>,
}

impl Post {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
    /// Storage links resolved by the upload collaborator, in display order.
    pub images: Vec<String>,
}

/// One page of a feed view. `next_cursor` is the id of the last post on a
/// full page; pass it back to get the posts older than everything seen so
/// far. `None` means the feed is exhausted.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Id<PostMarker>>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostContent(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post content is invalid: {0:?}")]
pub struct InvalidPostContentError(String);

impl PostContent {
    pub fn new(content: String) -> Result<Self, InvalidPostContentError> {
        let char_count = content.chars().count();
        if char_count > 0 && char_count <= POST_CONTENT_MAX_LEN {
            Ok(PostContent(content))
        } else {
            Err(InvalidPostContentError(content))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for PostContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostContent::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"PostContent"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_rejects_empty_and_overlong() {
        assert!(PostContent::new(String::new()).is_err());
        assert!(PostContent::new("a".repeat(POST_CONTENT_MAX_LEN + 1)).is_err());
        assert!(PostContent::new("hello".into()).is_ok());
    }

    #[test]
    fn content_deserialization_validates() {
        assert!(serde_json::from_str::<PostContent>("\"\"").is_err());
        assert_eq!(
            serde_json::from_str::<PostContent>("\"hi\"").unwrap().get(),
            "hi"
        );
    }
}
