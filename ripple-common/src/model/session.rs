use crate::model::{Id, user::UserMarker};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

pub const SESSION_SECRET_LEN: usize = 32;
pub const SESSION_SALT_LEN: usize = 16;
pub const SESSION_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing session token failed: {0}")]
pub struct SessionTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionTokenDecodeError {
    #[error("Not enough parts separated by '.'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the secret part is incorrect")]
    InvalidSecretLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// A bearer token presented by clients: the claimed user id plus a random
/// secret and the salt it is hashed with. Only [`SessionTokenHash`] is
/// stored server-side; carrying the salt in the token keeps the lookup key
/// deterministic without a per-user salt table.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken {
    pub user_id: Id<UserMarker>,
    pub secret: [u8; SESSION_SECRET_LEN],
    pub salt: [u8; SESSION_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionTokenHash(pub Box<[u8; SESSION_TOKEN_HASH_LEN]>);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: Id<UserMarker>,
    pub token_hash: SessionTokenHash,
    pub created_at: UtcDateTime,
    pub expires_at: Option<UtcDateTime>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

impl SessionToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        let secret = rand::random();
        let salt = rand::random();

        Self {
            user_id,
            secret,
            salt,
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_secret = Base64Display::new(&self.secret, &BASE64_URL_SAFE_NO_PAD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_URL_SAFE_NO_PAD);

        format!("{user_id}.{encoded_secret}.{encoded_salt}")
    }

    pub fn hash(&self) -> Result<SessionTokenHash, SessionTokenHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; SESSION_TOKEN_HASH_LEN]);
        argon2
            .hash_password_into(&self.secret, &self.salt, &mut *hash)
            .map_err(SessionTokenHashError)?;

        Ok(SessionTokenHash(hash))
    }
}

impl FromStr for SessionToken {
    type Err = SessionTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');

        let user_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let secret_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let user_id = Id::from_str(user_id_part).map_err(Self::Err::InvalidUserId)?;
        let secret = BASE64_URL_SAFE_NO_PAD
            .decode(secret_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSecretLength)?;
        let salt = BASE64_URL_SAFE_NO_PAD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            secret,
            salt,
        })
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("user_id", &self.user_id)
            .field("secret", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for SessionTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionTokenHash")
            .field(&"[redacted]")
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The session token hash had an invalid length")]
pub struct InvalidSessionTokenHashError;

impl TryFrom<Box<[u8]>> for SessionTokenHash {
    type Error = InvalidSessionTokenHashError;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        Ok(Self(
            value.try_into().map_err(|_| InvalidSessionTokenHashError)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_through_string_form() {
        let token = SessionToken::generate_random(Id::new(7));
        let parsed: SessionToken = token.as_token_str().parse().unwrap();

        assert_eq!(parsed, token);
    }

    #[test]
    fn hash_is_stable_for_the_same_token() {
        let token = SessionToken::generate_random(Id::new(1));

        assert_eq!(token.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn tampered_token_parts_are_rejected() {
        assert!(SessionToken::from_str("justonepart").is_err());
        assert!(SessionToken::from_str("x.YWJj.YWJj").is_err());
        assert!(SessionToken::from_str("1.YWJj.YWJj").is_err());
    }

    #[test]
    fn expiry_is_checked_against_the_given_instant() {
        let token = SessionToken::generate_random(Id::new(1));
        let now = UtcDateTime::now();
        let session = Session {
            user: token.user_id,
            token_hash: token.hash().unwrap(),
            created_at: now,
            expires_at: Some(now + time::Duration::minutes(5)),
        };

        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + time::Duration::minutes(6)));
    }
}
