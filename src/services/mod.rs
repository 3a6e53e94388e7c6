// src/services/mod.rs
//
// Clients for external collaborators

pub mod google;

// Re-export commonly used types for convenience
pub use google::{GoogleService, IdentityProvider, ProviderError, ProviderIdentity, TokenExchange};
