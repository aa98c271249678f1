//! Domain entities
//!
//! The adapter keeps its own vocabulary (`AuthorizationSession`, `BackendHandle`)
//! instead of reusing OAuth protocol types: the session is emulated state, the
//! code and bearer token are the only things a client ever sees.

mod client;
mod credential;
mod csrf;
mod ids;
mod pkce;
mod session;
mod token;

pub use client::RegisteredClient;
pub use credential::BackendCredential;
pub use csrf::CsrfToken;
pub use ids::{char_prefix, AuthorizationCode, BackendHandle, BearerToken, CsrfState};
pub use pkce::{PkceChallenge, PkceMethod};
pub use session::{
    AuthorizationSession, AuthorizeRequest, ExchangeRequest, SessionEvent, SessionStatus,
};
pub use token::IssuedToken;
