use super::UserId;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Server-side handle of a refresh token. The signed token is handed out,
/// the id is what the revocation store tracks.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn generate() -> Self {
        TokenId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 256 random bits, hex encoded.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub String);

impl LinkId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        LinkId(hex::encode(bytes))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload of access and refresh tokens. Access tokens never carry `jti`;
/// refresh tokens always do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    pub sub: UserId,
    pub email: String,
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<TokenId>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagicLinkClaims {
    pub sub: UserId,
    pub email: String,
    pub jti: LinkId,
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_ids_are_256_bit_hex() {
        let a = LinkId::generate();
        let b = LinkId::generate();
        assert_eq!(a.0.len(), 64);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn access_claims_omit_jti_on_the_wire() {
        let claims = TokenClaims {
            sub: UserId::generate(),
            email: "a@x.com".to_string(),
            kind: TokenKind::Access,
            jti: None,
            iat: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("jti").is_none());
        assert_eq!(json["kind"], "access");
    }

    #[test]
    fn claims_reject_extraneous_fields() {
        let json = serde_json::json!({
            "sub": uuid::Uuid::new_v4(),
            "email": "a@x.com",
            "kind": "access",
            "iat": 1,
            "exp": 2,
            "role": "admin",
        });
        assert!(serde_json::from_value::<TokenClaims>(json).is_err());
    }
}
