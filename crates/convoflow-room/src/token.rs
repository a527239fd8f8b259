// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HS256 room-join tokens.
//!
//! The agent signs its own access token with the room server's API secret.
//! The token names the agent identity and grants join, publish, subscribe
//! and data-publish rights on exactly one room.

use std::time::Duration;

use chrono::Utc;
use convoflow_core::ConvoflowError;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

/// Room permissions carried in the `video` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
}

/// JWT claims of a room-join token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

/// Mints a token for `identity` to join `room`, valid for `ttl` from now.
pub fn mint_access_token(
    api_key: &str,
    api_secret: &str,
    identity: &str,
    room: &str,
    ttl: Duration,
) -> Result<String, ConvoflowError> {
    mint_at(api_key, api_secret, identity, room, ttl, Utc::now().timestamp())
}

fn mint_at(
    api_key: &str,
    api_secret: &str,
    identity: &str,
    room: &str,
    ttl: Duration,
    now: i64,
) -> Result<String, ConvoflowError> {
    let exp = i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| {
            ConvoflowError::Config(format!("room token lifetime of {ttl:?} is out of range"))
        })?;

    let claims = Claims {
        iss: api_key.to_string(),
        sub: identity.to_string(),
        nbf: now,
        exp,
        video: VideoGrant {
            room: room.to_string(),
            room_join: true,
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
        },
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(api_secret.as_bytes()),
    )
    .map_err(|e| ConvoflowError::Internal(format!("failed to sign room token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};

    fn decode_claims(token: &str, secret: &str, check_expiry: bool) -> Claims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = check_expiry;
        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn token_has_expected_header_and_claims() {
        let token = mint_at(
            "APIkey123",
            "secret",
            "gemini-agent",
            "chat-room",
            Duration::from_secs(3600),
            1_700_000_000,
        )
        .unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));

        let claims = decode_claims(&token, "secret", false);
        assert_eq!(claims.iss, "APIkey123");
        assert_eq!(claims.sub, "gemini-agent");
        assert_eq!(claims.nbf, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_003_600);
        assert_eq!(claims.video.room, "chat-room");
        assert!(claims.video.room_join && claims.video.can_publish_data);
    }

    #[test]
    fn grant_uses_camel_case_keys() {
        let json = serde_json::to_value(VideoGrant {
            room: "room".into(),
            room_join: true,
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
        })
        .unwrap();
        assert_eq!(json["roomJoin"], true);
        assert_eq!(json["canPublishData"], true);
        assert_eq!(json["canSubscribe"], true);
    }

    #[test]
    fn signature_verifies_with_secret() {
        let token = mint_access_token("k", "top-secret", "id", "room", Duration::from_secs(60))
            .unwrap();

        let claims = decode_claims(&token, "top-secret", true);
        assert_eq!(claims.sub, "id");

        let wrong = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(wrong.is_err());
    }

    #[test]
    fn oversized_lifetime_is_rejected() {
        let result = mint_at(
            "k",
            "s",
            "id",
            "room",
            Duration::from_secs(u64::MAX),
            1_700_000_000,
        );
        assert!(matches!(result, Err(ConvoflowError::Config(_))));

        let near_limit = mint_at(
            "k",
            "s",
            "id",
            "room",
            Duration::from_secs(i64::MAX as u64),
            1,
        );
        assert!(matches!(near_limit, Err(ConvoflowError::Config(_))));
    }
}
