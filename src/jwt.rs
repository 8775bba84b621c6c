//! JWT signing and verification for the dual-token session scheme.
//!
//! Access and refresh tokens carry the same payload but are signed with
//! two independent secrets, so a leaked access-signing secret cannot be
//! used to forge refresh tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Access token lifetime: 5 minutes unless overridden on the command line.
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(5 * 60);

/// Refresh token lifetime: 7 days unless overridden on the command line.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Claims embedded in both token kinds. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: i64,
    /// Account email
    pub email: String,
    /// Display name
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Three-way verification result.
///
/// `Expired` still carries the decoded claims: the signature checked out
/// and only the time window elapsed, so the renewal path may read the
/// payload. `Invalid` carries nothing - a bad signature means no field of
/// the payload can be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(Claims),
    Expired(Claims),
    Invalid,
}

impl Verification {
    /// Claims if the token is valid and unexpired.
    pub fn valid(self) -> Option<Claims> {
        match self {
            Verification::Valid(claims) => Some(claims),
            _ => None,
        }
    }
}

/// A freshly signed token together with its timestamps.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    /// Issued at (Unix seconds)
    pub issued_at: u64,
    /// Expiration (Unix seconds)
    pub expires_at: u64,
    /// Lifetime in seconds, for cookie Max-Age
    pub ttl_secs: u64,
}

struct TrackKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TrackKeys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Configuration for JWT operations: one key pair per token track plus the
/// configured lifetimes. Built once at startup and shared by reference.
pub struct JwtConfig {
    access: TrackKeys,
    refresh: TrackKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtConfig {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: TrackKeys::new(access_secret),
            refresh: TrackKeys::new(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a short-lived access token. Stateless: never stored server-side.
    pub fn sign_access(&self, sub: i64, email: &str, name: &str) -> Result<SignedToken, JwtError> {
        sign(&self.access, self.access_ttl, sub, email, name)
    }

    /// Sign a long-lived refresh token. The caller must persist it in the
    /// refresh-token registry for it to be usable.
    pub fn sign_refresh(&self, sub: i64, email: &str, name: &str) -> Result<SignedToken, JwtError> {
        sign(&self.refresh, self.refresh_ttl, sub, email, name)
    }

    pub fn verify_access(&self, token: &str) -> Verification {
        verify(&self.access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Verification {
        verify(&self.refresh, token)
    }
}

fn sign(
    keys: &TrackKeys,
    ttl: Duration,
    sub: i64,
    email: &str,
    name: &str,
) -> Result<SignedToken, JwtError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs();
    let exp = now + ttl.as_secs();

    let claims = Claims {
        sub,
        email: email.to_string(),
        name: name.to_string(),
        iat: now,
        exp,
    };

    let token = jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding)
        .map_err(JwtError::Encoding)?;

    Ok(SignedToken {
        token,
        issued_at: now,
        expires_at: exp,
        ttl_secs: ttl.as_secs(),
    })
}

fn verify(keys: &TrackKeys, token: &str) -> Verification {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    match jsonwebtoken::decode::<Claims>(token, &keys.decoding, &validation) {
        Ok(data) => Verification::Valid(data.claims),
        Err(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) => {
            // Signature was good; decode again without the expiry check to
            // recover the claims for the renewal path.
            let mut expired_ok = Validation::new(Algorithm::HS256);
            expired_ok.leeway = 0;
            expired_ok.validate_exp = false;
            match jsonwebtoken::decode::<Claims>(token, &keys.decoding, &expired_ok) {
                Ok(data) => Verification::Expired(data.claims),
                Err(_) => Verification::Invalid,
            }
        }
        Err(_) => Verification::Invalid,
    }
}

/// Errors that can occur while signing a token.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::new(
            b"access-secret-for-testing-only!!",
            b"refresh-secret-for-testing-only!",
            DEFAULT_ACCESS_TTL,
            DEFAULT_REFRESH_TTL,
        )
    }

    /// Sign claims with an `exp` already in the past, using the access secret.
    fn craft_expired_access_token(secret: &[u8]) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            sub: 7,
            email: "alice@example.com".to_string(),
            name: "alice".to_string(),
            iat: now - 360,
            exp: now - 60,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_valid() {
        let config = test_config();

        let signed = config.sign_access(7, "alice@example.com", "alice").unwrap();
        assert_eq!(signed.ttl_secs, DEFAULT_ACCESS_TTL.as_secs());
        assert_eq!(signed.expires_at, signed.issued_at + signed.ttl_secs);

        match config.verify_access(&signed.token) {
            Verification::Valid(claims) => {
                assert_eq!(claims.sub, 7);
                assert_eq!(claims.email, "alice@example.com");
                assert_eq!(claims.name, "alice");
                assert_eq!(claims.exp, signed.expires_at);
            }
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_token_returns_claims() {
        let config = test_config();
        let token = craft_expired_access_token(b"access-secret-for-testing-only!!");

        match config.verify_access(&token) {
            Verification::Expired(claims) => {
                assert_eq!(claims.sub, 7);
                assert_eq!(claims.email, "alice@example.com");
            }
            other => panic!("expected Expired, got {:?}", other),
        }
    }

    #[test]
    fn test_tampered_signature_is_invalid() {
        let config = test_config();
        let signed = config.sign_access(7, "alice@example.com", "alice").unwrap();

        // Flip the last character of the signature.
        let mut tampered = signed.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert_eq!(config.verify_access(&tampered), Verification::Invalid);
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let config = test_config();
        let signed = config.sign_access(7, "alice@example.com", "alice").unwrap();

        // Corrupt a character of the payload segment. The signature no
        // longer matches, so the result must be Invalid, never Expired.
        let parts: Vec<&str> = signed.token.split('.').collect();
        let mut payload: Vec<u8> = parts[1].bytes().collect();
        payload[0] ^= 0x01;
        let tampered = format!(
            "{}.{}.{}",
            parts[0],
            String::from_utf8(payload).unwrap(),
            parts[2]
        );

        assert_eq!(config.verify_access(&tampered), Verification::Invalid);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let config = test_config();
        let other = JwtConfig::new(
            b"a-completely-different-secret!!!",
            b"another-different-secret-here!!!",
            DEFAULT_ACCESS_TTL,
            DEFAULT_REFRESH_TTL,
        );

        let signed = config.sign_access(7, "alice@example.com", "alice").unwrap();
        assert_eq!(other.verify_access(&signed.token), Verification::Invalid);
    }

    #[test]
    fn test_tracks_use_distinct_secrets() {
        let config = test_config();

        let access = config.sign_access(7, "alice@example.com", "alice").unwrap();
        let refresh = config.sign_refresh(7, "alice@example.com", "alice").unwrap();

        // A token from one track must not verify against the other.
        assert_eq!(config.verify_refresh(&access.token), Verification::Invalid);
        assert_eq!(config.verify_access(&refresh.token), Verification::Invalid);
    }

    #[test]
    fn test_garbage_is_invalid_not_expired() {
        let config = test_config();
        assert_eq!(config.verify_access("not-a-token"), Verification::Invalid);
        assert_eq!(config.verify_access(""), Verification::Invalid);
    }
}
