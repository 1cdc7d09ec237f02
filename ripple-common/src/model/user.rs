use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const NICKNAME_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// Public profile of a post author. User lifecycle (signup, profile edits)
/// belongs to the identity service; we only keep the fields the feed and
/// the image view need.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub nickname: Nickname,
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateUser {
    pub nickname: Nickname,
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Nickname(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The nickname is invalid: {0:?}")]
pub struct InvalidNicknameError(String);

impl Nickname {
    pub fn new(nickname: String) -> Result<Self, InvalidNicknameError> {
        let char_count = nickname.chars().count();
        if char_count > 0 && char_count <= NICKNAME_MAX_LEN {
            Ok(Nickname(nickname))
        } else {
            Err(InvalidNicknameError(nickname))
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

impl<'de> Deserialize<'de> for Nickname {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Nickname::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Nickname"))
    }
}
