use crate::application_port::CredentialError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// HS256 signer/verifier bound to a single secret.
///
/// Tokens whose header names any other algorithm are refused, and expiry is
/// checked without leeway.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        JwtCodec {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, CredentialError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| CredentialError::Internal(format!("sign token: {e}")))
    }

    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, CredentialError> {
        let data = decode::<C>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    CredentialError::InvalidSignature
                }
                _ => CredentialError::Malformed,
            }
        })?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::*;
    use chrono::Utc;

    fn claims(exp_offset_secs: i64) -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            sub: UserId::generate(),
            email: "a@x.com".to_string(),
            kind: TokenKind::Access,
            jti: None,
            iat: now,
            exp: now + exp_offset_secs,
        }
    }

    #[test]
    fn signed_token_has_three_segments_and_verifies() {
        let codec = JwtCodec::new(b"access-secret");
        let original = claims(900);
        let token = codec.sign(&original).unwrap();

        assert_eq!(token.split('.').count(), 3);
        let decoded: TokenClaims = codec.verify(&token).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wrong_secret_is_a_signature_failure() {
        let token = JwtCodec::new(b"one-secret").sign(&claims(900)).unwrap();
        let err = JwtCodec::new(b"other-secret")
            .verify::<TokenClaims>(&token)
            .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected_without_leeway() {
        let codec = JwtCodec::new(b"access-secret");
        let token = codec.sign(&claims(-5)).unwrap();
        let err = codec.verify::<TokenClaims>(&token).unwrap_err();
        assert!(matches!(err, CredentialError::Expired));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = JwtCodec::new(b"access-secret");
        let token = codec.sign(&claims(900)).unwrap();
        let forged = codec.sign(&claims(900)).unwrap();

        // Splice the payload of one token onto the signature of another.
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        let err = codec.verify::<TokenClaims>(&spliced).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidSignature));
    }

    #[test]
    fn other_algorithms_are_refused_even_with_the_right_secret() {
        let secret = b"access-secret";
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims(900),
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let err = JwtCodec::new(secret)
            .verify::<TokenClaims>(&token)
            .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = JwtCodec::new(b"access-secret");
        for token in ["", "not-a-token", "a.b", "a.b.c"] {
            let err = codec.verify::<TokenClaims>(token).unwrap_err();
            assert!(
                matches!(
                    err,
                    CredentialError::Malformed | CredentialError::InvalidSignature
                ),
                "{token:?} gave {err:?}"
            );
        }
    }
}
