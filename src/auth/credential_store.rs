//! Credential Storage
//! Mission: Answer "is this username/password pair known?" without leaking timing

use crate::auth::{errors::AuthError, models::Credential};
use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// A loaded credential, kept only as keyed MAC tags so every comparison runs
/// over the same 32 bytes whatever the input length.
struct StoredCredential {
    username_tag: Vec<u8>,
    secret_tag: Vec<u8>,
}

const USERNAME_DOMAIN: u8 = 0x01;
const SECRET_DOMAIN: u8 = 0x02;

/// In-memory credential list, loaded once at startup.
///
/// Reads share the lock; `reload` takes it exclusively for the swap only.
pub struct CredentialStore {
    mac: HmacSha256,
    entries: RwLock<Vec<StoredCredential>>,
}

impl CredentialStore {
    /// Create a store holding `credentials`. The MAC key is fresh per process.
    pub fn new(credentials: Vec<Credential>) -> Result<Self> {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| anyhow!("credential MAC key error: {}", e))?;

        let store = Self {
            mac,
            entries: RwLock::new(Vec::new()),
        };
        store.reload(credentials);
        Ok(store)
    }

    /// Replace the whole credential list.
    pub fn reload(&self, credentials: Vec<Credential>) {
        let stored: Vec<StoredCredential> = credentials
            .into_iter()
            .map(|c| StoredCredential {
                username_tag: self.tag(USERNAME_DOMAIN, &c.username),
                secret_tag: self.tag(SECRET_DOMAIN, &c.password),
            })
            .collect();
        let count = stored.len();

        *self.entries.write() = stored;

        info!("🔐 Credential store loaded with {} user(s)", count);
    }

    /// Check a username/password pair.
    ///
    /// Every entry is compared so the time taken does not depend on where (or
    /// whether) the username appears in the list.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let entries = self.entries.read();
        if entries.is_empty() {
            return Err(AuthError::NoCredentialsLoaded);
        }

        let mut matched = false;
        for entry in entries.iter() {
            let user_ok = self.verify(USERNAME_DOMAIN, username, &entry.username_tag);
            let secret_ok = self.verify(SECRET_DOMAIN, password, &entry.secret_tag);
            matched |= secret_ok & user_ok;
        }

        debug!(username, matched, "credential check");
        Ok(matched)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn keyed(&self, domain: u8, value: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(&[domain]);
        mac.update(value.as_bytes());
        mac
    }

    fn tag(&self, domain: u8, value: &str) -> Vec<u8> {
        self.keyed(domain, value).finalize().into_bytes().to_vec()
    }

    /// `verify_slice` compares in constant time.
    fn verify(&self, domain: u8, value: &str, expected: &[u8]) -> bool {
        self.keyed(domain, value).verify_slice(expected).is_ok()
    }
}
