use ripple_common::model::{
    Id, ModelValidationError,
    image::{Image, ImageView},
    post::{Post, PostContent, PostMarker},
    session::{Session, SessionTokenHash},
    user::{Nickname, User},
};
use sqlx::FromRow;
use time::{OffsetDateTime, UtcDateTime};

/// Raw rows as they come out of Postgres. Conversion into the domain
/// models revalidates text fields, so an invalid row surfaces as an error
/// instead of a bad value flowing through the API.
#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub struct PostRecord {
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
    pub parent_id: Option<i64>,
    pub original_id: Option<i64>,
}

impl PostRecord {
    /// Related rows are fetched in separate batched queries, so attaching
    /// them is part of the conversion rather than a `TryFrom`.
    pub fn into_post(
        self,
        images: Vec<Image>,
        reposts: Vec<Id<PostMarker>>,
    ) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: self.post_id.into(),
            author: self.author_id.into(),
            content: PostContent::new(self.content)?,
            created_at: UtcDateTime::from(self.created_at),
            deleted_at: self.deleted_at.map(UtcDateTime::from),
            parent: self.parent_id.map(Into::into),
            original: self.original_id.map(Into::into),
            images,
            reposts,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub struct ImageRecord {
    pub image_id: i64,
    pub post_id: i64,
    pub link: String,
}

impl From<ImageRecord> for Image {
    fn from(value: ImageRecord) -> Self {
        Self {
            id: value.image_id.into(),
            post: value.post_id.into(),
            link: value.link,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub nickname: String,
    pub image: Option<String>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            nickname: Nickname::new(value.nickname)?,
            image: value.image,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub struct SessionRecord {
    pub token_hash: Vec<u8>,
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
}

impl TryFrom<SessionRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        let token_hash =
            SessionTokenHash::try_from(value.token_hash.into_boxed_slice())?;

        Ok(Self {
            user: value.user_id.into(),
            token_hash,
            created_at: UtcDateTime::from(value.created_at),
            expires_at: value.expires_at.map(UtcDateTime::from),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub struct ImageViewRecord {
    pub user_id: i64,
    pub nickname: String,
    pub user_image: Option<String>,
    pub post_id: i64,
    pub content: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<ImageViewRecord> for ImageView {
    type Error = ModelValidationError;

    fn try_from(value: ImageViewRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            author: User {
                id: value.user_id.into(),
                nickname: Nickname::new(value.nickname)?,
                image: value.user_image,
            },
            post: value.post_id.into(),
            content: PostContent::new(value.content)?,
            created_at: UtcDateTime::from(value.created_at),
        })
    }
}
