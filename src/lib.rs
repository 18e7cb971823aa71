//! tokengate
//!
//! Credential and token lifecycle for a resource API: login issues a signed
//! bearer token, every protected request is verified at the gate, and logout
//! revokes a token before its natural expiry.

pub mod app;
pub mod auth;
pub mod config;
pub mod middleware;
