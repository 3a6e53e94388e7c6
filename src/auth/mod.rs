//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Local registration and login (Argon2id password hashes)
//! - Google OAuth sign-in (authorization-code flow)
//! - Session token issuance and validation (HS256 JWT)
//! - SessionUser extractor for token-protected routes

pub mod extractors;
pub mod federated;
pub mod handlers;
pub mod local;
pub mod models;
pub mod password;
pub mod routes;
pub mod store;
pub mod token;
pub mod validators;


pub use federated::FederatedAuth;
pub use local::LocalAuth;
pub use routes::auth_routes;
pub use store::UserStore;
pub use token::TokenCodec;
