//! Authentication Module
//! Mission: Issue, verify and revoke short-lived signed bearer tokens

pub mod api;
pub mod clock;
pub mod credential_store;
pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod revocation;

pub use api::AuthState;
pub use clock::{Clock, ManualClock, SystemClock};
pub use credential_store::CredentialStore;
pub use errors::{AuthError, TokenError};
pub use jwt::{IssuedToken, SigningKey, TokenIssuer, TokenValidator};
pub use middleware::{auth_middleware, AuthGate, GateError};
pub use models::{Claims, Credential, Identity};
pub use revocation::{spawn_pruner, RevocationRegistry};
