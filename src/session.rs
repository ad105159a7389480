//! Signed, expiring session tokens.
//!
//! Format: `v1.<base64url(json claims)>.<base64url(hmac-sha256)>`, with the MAC
//! taken over the encoded payload part.

use crate::error::AuthError;
use crate::identity::{Identity, Role};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION_V1: &str = "v1";
const MAX_TOKEN_LEN: usize = 1024;
const MAX_PAYLOAD_PART_LEN: usize = 768;
const MAX_SIG_PART_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Claims {
    sub: i64,
    role: Role,
    /// Unix seconds.
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionCodec {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| AuthError::Malformed(e.to_string()))
    }

    pub fn issue(&self, identity: &Identity, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Malformed("token lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: identity.subject_id,
            role: identity.role,
            exp: expires_at.timestamp(),
        };
        let payload_bytes =
            serde_json::to_vec(&claims).map_err(|e| AuthError::Malformed(e.to_string()))?;
        let payload_part = URL_SAFE_NO_PAD.encode(payload_bytes);
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(IssuedToken {
            token: format!("{TOKEN_VERSION_V1}.{payload_part}.{sig_part}"),
            expires_at,
        })
    }

    /// Checks signature and expiry. A token is expired from its `exp` second on.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::Malformed("token exceeds max length".to_string()));
        }
        let (payload_part, sig_part) = split_token(token)?;
        if payload_part.len() > MAX_PAYLOAD_PART_LEN || sig_part.len() > MAX_SIG_PART_LEN {
            return Err(AuthError::Malformed(
                "token part exceeds max length".to_string(),
            ));
        }

        let expected = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| AuthError::Malformed("token signature mismatch".to_string()))?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        let claims: Claims =
            serde_json::from_slice(&payload_bytes).map_err(|e| AuthError::Malformed(e.to_string()))?;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::ExpiredToken);
        }
        Ok(Identity::new(claims.sub, claims.role))
    }
}

fn split_token(token: &str) -> Result<(&str, &str), AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        [version, payload, sig] if *version == TOKEN_VERSION_V1 => Ok((payload, sig)),
        [version, _, _] => Err(AuthError::Malformed(format!(
            "unsupported token version: {version}"
        ))),
        _ => Err(AuthError::Malformed("invalid token format".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> SessionCodec {
        SessionCodec::new("test-secret", Duration::seconds(60))
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 12, 0, 0).single().expect("valid time")
    }

    fn sign(claims_json: &str, secret: &str) -> String {
        let payload_part = URL_SAFE_NO_PAD.encode(claims_json);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("mac");
        mac.update(payload_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("v1.{payload_part}.{sig_part}")
    }

    #[test]
    fn issued_token_verifies_to_the_same_identity() {
        let codec = codec();
        let issued = codec.issue(&Identity::parent(3), noon()).expect("issue");
        assert_eq!(issued.expires_at, noon() + Duration::seconds(60));
        assert!(issued.token.starts_with("v1."));
        assert_eq!(
            codec.verify(&issued.token, noon()).expect("verify"),
            Identity::parent(3)
        );
    }

    #[test]
    fn token_expires_at_exp() {
        let codec = codec();
        let issued = codec.issue(&Identity::teacher(7), noon()).expect("issue");
        let just_before = noon() + Duration::seconds(59);
        assert!(codec.verify(&issued.token, just_before).is_ok());
        assert!(matches!(
            codec.verify(&issued.token, issued.expires_at),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_malformed() {
        let codec = codec();
        let issued = codec.issue(&Identity::student(21), noon()).expect("issue");
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(r#"{"sub":21,"role":"admin","exp":9999999999}"#);
        parts[1] = &forged_payload;
        let forged = parts.join(".");
        assert!(matches!(
            codec.verify(&forged, noon()),
            Err(AuthError::Malformed(_))
        ));

        let other = SessionCodec::new("other-secret", Duration::seconds(60));
        assert!(matches!(
            other.verify(&issued.token, noon()),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(codec.verify("not-a-token", noon()), Err(AuthError::Malformed(_))));
        assert!(matches!(
            codec.verify(&"a".repeat(MAX_TOKEN_LEN + 1), noon()),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn out_of_range_lifetime_is_an_error_not_a_panic() {
        let codec = SessionCodec::new("test-secret", Duration::MAX);
        assert!(matches!(
            codec.issue(&Identity::admin(1), noon()),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let codec = codec();
        let issued = codec.issue(&Identity::admin(1), noon()).expect("issue");
        let v2 = issued.token.replacen("v1.", "v2.", 1);
        let err = codec.verify(&v2, noon()).expect_err("v2");
        assert!(err.to_string().contains("unsupported token version"));
    }

    #[test]
    fn unrecognised_role_decodes_to_unknown() {
        let token = sign(r#"{"sub":5,"role":"janitor","exp":9999999999}"#, "test-secret");
        let identity = codec().verify(&token, noon()).expect("verify");
        assert_eq!(identity.role, Role::Unknown);
    }
}
