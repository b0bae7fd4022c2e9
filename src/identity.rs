//! Resolution of request credentials to a timer owner.

use std::collections::HashMap;

use crate::timer::OwnerId;

/// Credentials presented with a request. Only bearer tokens are understood here;
/// session cookies and the like are the surrounding application's business.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub bearer_token: Option<&'a str>,
}

impl<'a> Credentials<'a> {
    pub fn bearer(token: &'a str) -> Self {
        Self {
            bearer_token: Some(token),
        }
    }

    pub fn anonymous() -> Self {
        Self { bearer_token: None }
    }
}

pub trait IdentityProvider: Send + Sync {
    /// `None` means unauthenticated.
    fn authenticate(&self, credentials: &Credentials<'_>) -> Option<OwnerId>;
}

/// Static token table, loaded from settings.
#[derive(Debug, Clone, Default)]
pub struct TokenIdentity {
    tokens: HashMap<String, OwnerId>,
}

impl TokenIdentity {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .filter(|(token, owner)| !token.is_empty() && !owner.is_empty())
                .map(|(token, owner)| (token, OwnerId::new(owner)))
                .collect(),
        }
    }
}

impl IdentityProvider for TokenIdentity {
    fn authenticate(&self, credentials: &Credentials<'_>) -> Option<OwnerId> {
        let token = credentials.bearer_token?.trim();
        self.tokens.get(token).cloned()
    }
}
