//! JWT Token Handling
//! Mission: Mint signed tokens and verify them in a fixed, cheapest-first order

use crate::auth::{
    clock::Clock,
    errors::{AuthError, TokenError},
    models::Claims,
    revocation::RevocationRegistry,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The only algorithm this server issues or accepts.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;
const SIGNING_ALGORITHM_NAME: &str = "HS256";

/// Bytes of randomness per token id (128 bits).
const TOKEN_ID_BYTES: usize = 16;

/// Symmetric server secret, ready for both directions.
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    /// Fails with `SigningKeyUnavailable` when the secret is empty or blank.
    pub fn from_secret(secret: &str) -> Result<Self, AuthError> {
        if secret.trim().is_empty() {
            return Err(AuthError::SigningKeyUnavailable);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

/// A freshly minted token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Mints signed tokens with a fixed time-to-live.
pub struct TokenIssuer {
    key: SigningKey,
    /// `None` when the configured TTL does not fit in unix seconds.
    ttl_secs: Option<i64>,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(key: SigningKey, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            key,
            ttl_secs: i64::try_from(ttl.as_secs()).ok(),
            clock,
        }
    }

    /// Issue a token for an already-authenticated subject.
    ///
    /// Fails with `InvalidTokenLifetime` rather than minting a token whose
    /// expiry would overflow.
    pub fn issue(&self, subject: &str) -> Result<IssuedToken, AuthError> {
        let iat = self.clock.now_ts();
        let exp = self
            .ttl_secs
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or(AuthError::InvalidTokenLifetime)?;
        let claims = Claims {
            sub: subject.to_string(),
            jti: new_token_id(),
            iat,
            exp,
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.key.encoding)?;

        debug!(
            subject,
            token_id = %claims.jti,
            "Issued token, expires in {}s",
            exp - iat
        );

        Ok(IssuedToken { token, claims })
    }
}

/// 128 bits from the OS CSPRNG, hex encoded.
fn new_token_id() -> String {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Parses and checks tokens: structure, algorithm and signature, expiry, revocation.
pub struct TokenValidator {
    key: SigningKey,
    validation: Validation,
    revocations: Arc<RevocationRegistry>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(key: SigningKey, revocations: Arc<RevocationRegistry>, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked against our own clock, after the signature.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key,
            validation,
            revocations,
            clock,
        }
    }

    pub fn revocations(&self) -> &Arc<RevocationRegistry> {
        &self.revocations
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Full verification. Failures are reported in check order:
    /// `Malformed`, `BadSignature`, `Expired`, `Revoked`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify_for_revocation(token)?;

        if claims.is_expired_at(self.clock.now_ts()) {
            return Err(TokenError::Expired);
        }
        if self.revocations.is_revoked(&claims.jti) {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    /// Structure and signature only. Logout uses this so a token at or past
    /// its expiry can still be denylisted.
    pub fn verify_for_revocation(&self, token: &str) -> Result<Claims, TokenError> {
        check_structure(token)?;

        let data = decode::<Claims>(token, &self.key.decoding, &self.validation)
            .map_err(|e| classify(e.kind()))?;

        Ok(data.claims)
    }
}

/// Split into three segments, decode header and claims, and insist on our
/// algorithm before any MAC is computed.
fn check_structure(token: &str) -> Result<(), TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    let header: RawHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let payload: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Malformed)?;
    if !payload.is_object() {
        return Err(TokenError::Malformed);
    }

    // Algorithm confusion ("none", HS512, RS256 with our secret as a public key, ...).
    if header.alg != SIGNING_ALGORITHM_NAME {
        return Err(TokenError::BadSignature);
    }

    Ok(())
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;

    const SECRET: &str = "test-secret-key-12345";
    const TTL: Duration = Duration::from_secs(3600);

    struct Fixture {
        issuer: TokenIssuer,
        validator: TokenValidator,
        registry: Arc<RevocationRegistry>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let registry = Arc::new(RevocationRegistry::new(clock.clone()));
        let key = SigningKey::from_secret(SECRET).unwrap();
        Fixture {
            issuer: TokenIssuer::new(key.clone(), TTL, clock.clone()),
            validator: TokenValidator::new(key, registry.clone(), clock.clone()),
            registry,
            clock,
        }
    }

    fn b64(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let f = fixture();

        let issued = f.issuer.issue("user1").unwrap();
        assert!(!issued.token.is_empty());
        assert_eq!(issued.token.split('.').count(), 3);

        let claims = f.validator.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "user1");
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iat, f.clock.now_ts());
    }

    #[test]
    fn test_token_ids_are_unique_and_128_bit() {
        let f = fixture();
        let mut seen = HashSet::new();

        for _ in 0..1000 {
            let issued = f.issuer.issue("user1").unwrap();
            assert_eq!(issued.claims.jti.len(), TOKEN_ID_BYTES * 2);
            assert!(issued.claims.jti.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(issued.claims.jti));
        }
    }

    #[test]
    fn test_expired_after_ttl() {
        let f = fixture();
        let issued = f.issuer.issue("user1").unwrap();

        f.clock.advance(ChronoDuration::seconds(3599));
        assert!(f.validator.verify(&issued.token).is_ok());

        f.clock.advance(ChronoDuration::seconds(1));
        assert_eq!(f.validator.verify(&issued.token), Err(TokenError::Expired));

        // Signature is still good.
        assert!(f.validator.verify_for_revocation(&issued.token).is_ok());
    }

    #[test]
    fn test_oversized_ttl_is_refused() {
        let f = fixture();
        let key = SigningKey::from_secret(SECRET).unwrap();

        // Does not fit in i64 seconds.
        let huge = TokenIssuer::new(key.clone(), Duration::from_secs(u64::MAX), f.clock.clone());
        assert!(matches!(
            huge.issue("user1"),
            Err(AuthError::InvalidTokenLifetime)
        ));

        // Fits, but iat + ttl overflows.
        let overflowing = TokenIssuer::new(
            key.clone(),
            Duration::from_secs(i64::MAX as u64),
            f.clock.clone(),
        );
        assert!(matches!(
            overflowing.issue("user1"),
            Err(AuthError::InvalidTokenLifetime)
        ));

        // Largest configurable lifetime still yields a live token.
        let longest = TokenIssuer::new(
            key,
            Duration::from_secs(crate::config::MAX_TOKEN_TTL_SECS),
            f.clock.clone(),
        );
        let issued = longest.issue("user1").unwrap();
        assert_eq!(
            issued.claims.exp - issued.claims.iat,
            crate::config::MAX_TOKEN_TTL_SECS as i64
        );
        assert!(f.validator.verify(&issued.token).is_ok());
    }

    #[test]
    fn test_altered_signature_is_bad_signature() {
        let f = fixture();
        let issued = f.issuer.issue("user1").unwrap();

        let (message, signature) = issued.token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = signature.chars().collect();
        let mid = sig.len() / 2;
        sig[mid] = if sig[mid] == 'A' { 'B' } else { 'A' };
        let forged = format!("{}.{}", message, sig.into_iter().collect::<String>());

        assert_eq!(f.validator.verify(&forged), Err(TokenError::BadSignature));

        // Even once expired, a forged signature is reported as such.
        f.clock.advance(ChronoDuration::hours(2));
        assert_eq!(f.validator.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_altered_claims_is_bad_signature() {
        let f = fixture();
        let issued = f.issuer.issue("user1").unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let forged_claims = b64(&format!(
            r#"{{"sub":"admin","jti":"{}","iat":{},"exp":{}}}"#,
            issued.claims.jti, issued.claims.iat, issued.claims.exp
        ));
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert_eq!(f.validator.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_different_secrets_reject() {
        let f = fixture();
        let other = TokenIssuer::new(
            SigningKey::from_secret("another-secret").unwrap(),
            TTL,
            f.clock.clone(),
        );

        let issued = other.issue("user1").unwrap();
        assert_eq!(f.validator.verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_algorithm_none_rejected() {
        let f = fixture();
        let now = f.clock.now_ts();
        let token = format!(
            "{}.{}.",
            b64(r#"{"alg":"none","typ":"JWT"}"#),
            b64(&format!(
                r#"{{"sub":"user1","jti":"x","iat":{},"exp":{}}}"#,
                now,
                now + 60
            ))
        );

        assert_eq!(f.validator.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_other_hmac_algorithm_rejected() {
        let f = fixture();
        let now = f.clock.now_ts();
        let claims = Claims {
            sub: "user1".to_string(),
            jti: "abc".to_string(),
            iat: now,
            exp: now + 60,
        };
        // Same secret, different algorithm.
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(f.validator.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let f = fixture();
        let issued = f.issuer.issue("user1").unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let cases = vec![
            String::new(),
            "invalid.token.here".to_string(),
            "not-a-jwt".to_string(),
            format!("{}.{}", parts[0], parts[1]),
            format!("{}.{}.{}.extra", parts[0], parts[1], parts[2]),
            format!("{}.{}.{}", b64("[1,2,3]"), parts[1], parts[2]),
            format!("{}.{}.{}", b64(r#"{"typ":"JWT"}"#), parts[1], parts[2]),
            format!("{}.{}.{}", parts[0], b64("\"just a string\""), parts[2]),
            format!("{}.%%%.{}", parts[0], parts[2]),
        ];

        for token in cases {
            assert_eq!(
                f.validator.verify(&token),
                Err(TokenError::Malformed),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_signed_but_incomplete_claims_is_malformed() {
        let f = fixture();
        #[derive(serde::Serialize)]
        struct Partial {
            sub: String,
            exp: i64,
        }
        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &Partial {
                sub: "user1".to_string(),
                exp: f.clock.now_ts() + 60,
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(f.validator.verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_revoked_token_rejected() {
        let f = fixture();
        let issued = f.issuer.issue("user1").unwrap();
        let sibling = f.issuer.issue("user1").unwrap();

        f.registry.add(&issued.claims.jti, issued.claims.exp);

        assert_eq!(f.validator.verify(&issued.token), Err(TokenError::Revoked));
        // Only that token id is affected.
        assert!(f.validator.verify(&sibling.token).is_ok());
    }

    #[test]
    fn test_expired_and_revoked_reports_expired() {
        let f = fixture();
        let issued = f.issuer.issue("user1").unwrap();
        f.registry.add(&issued.claims.jti, issued.claims.exp);

        f.clock.advance(ChronoDuration::seconds(3600));
        assert_eq!(f.validator.verify(&issued.token), Err(TokenError::Expired));

        // Pruning the entry does not change the outcome.
        assert_eq!(f.registry.prune_expired(), 1);
        assert_eq!(f.validator.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_missing_secret_is_unavailable() {
        assert!(matches!(
            SigningKey::from_secret(""),
            Err(AuthError::SigningKeyUnavailable)
        ));
        assert!(matches!(
            SigningKey::from_secret("   "),
            Err(AuthError::SigningKeyUnavailable)
        ));
    }
}
