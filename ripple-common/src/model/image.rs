use crate::model::{
    Id,
    post::{PostContent, PostMarker},
    user::User,
};
use serde::Serialize;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ImageMarker;

/// An image attached to a post at creation time. The link is an opaque
/// storage path; this service never touches the bytes behind it.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct Image {
    pub id: Id<ImageMarker>,
    pub post: Id<PostMarker>,
    pub link: String,
}

/// Restricted projection returned when a single image is looked up:
/// the author's public profile plus the surrounding post's content and
/// creation time, nothing else.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ImageView {
    pub author: User,
    pub post: Id<PostMarker>,
    pub content: PostContent,
    pub created_at: UtcDateTime,
}
