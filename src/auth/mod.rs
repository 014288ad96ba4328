//! Authentication module
//!
//! Password and identity-provider sign-in, signed session tokens and the
//! session cookie.

pub mod handlers;
pub mod password;
mod service;
mod token;

pub use service::{ProviderIdentity, ProviderLogin, Session, SessionManager};
pub use token::{Claims, TokenCodec};
