pub mod authority;
pub mod credential;
pub mod parser;
pub mod token_provider;

pub use authority::{AuthError, CredentialAuthority, HttpAuthority, IssuedToken};
pub use credential::{Credential, Scopes};
pub use token_provider::TokenProvider;
