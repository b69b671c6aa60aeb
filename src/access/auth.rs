//! Credential check seam
//!
//! The server never verifies passwords or issues tokens itself. It hands the
//! presented token to an [`Authenticator`] and gets back either a
//! [`Credential`] or a rejection reason.

use std::collections::HashMap;
use std::future::Future;

use super::groups::PermittedGroups;

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Identity the token belongs to
    pub subject: String,
    /// Groups this caller may observe
    pub permitted: PermittedGroups,
}

impl Credential {
    pub fn new(subject: impl Into<String>, permitted: PermittedGroups) -> Self {
        Self {
            subject: subject.into(),
            permitted,
        }
    }
}

/// Outcome of a credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Token is valid
    Accept(Credential),
    /// Token is invalid, with a client-facing reason
    Reject(String),
}

impl AuthResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AuthResult::Accept(_))
    }

    /// The credential, if accepted
    pub fn credential(self) -> Option<Credential> {
        match self {
            AuthResult::Accept(credential) => Some(credential),
            AuthResult::Reject(_) => None,
        }
    }
}

/// Verifies tokens presented by devices and observers
///
/// Called once per request, and once per stream at connection time. The
/// returned permitted set is fixed for the stream's lifetime.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, token: &str) -> impl Future<Output = AuthResult> + Send;
}

/// Fixed table of tokens, typically loaded from the config file
#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, Credential>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `credential`, replacing any previous entry
    pub fn insert(&mut self, token: impl Into<String>, credential: Credential) {
        self.tokens.insert(token.into(), credential);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_token(mut self, token: impl Into<String>, credential: Credential) -> Self {
        self.insert(token, credential);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn lookup(&self, token: &str) -> AuthResult {
        match self.tokens.get(token) {
            Some(credential) => AuthResult::Accept(credential.clone()),
            None => AuthResult::Reject("Invalid token".into()),
        }
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, token: &str) -> impl Future<Output = AuthResult> + Send {
        std::future::ready(self.lookup(token))
    }
}
