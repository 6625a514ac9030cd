//! Credential injection.
//!
//! The transport and the REST collaborator never look a token up on their
//! own; whoever owns the login flow hands it in through [`Credentials`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// A bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Shared, observable slot holding the current credential.
///
/// Cloning yields another handle to the same slot. Set it on login, clear it
/// on logout; the session transport reacts to both.
#[derive(Clone)]
pub struct Credentials {
    tx: Arc<watch::Sender<Option<Credential>>>,
}

impl Credentials {
    pub fn new(initial: Option<Credential>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn empty() -> Self {
        Self::new(None)
    }

    /// Replace the current credential (`None` on logout).
    pub fn set(&self, credential: Option<Credential>) {
        self.tx.send_replace(credential);
    }

    pub fn current(&self) -> Option<Credential> {
        self.tx.borrow().clone()
    }

    pub fn is_present(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Receiver that is notified on every `set`.
    pub fn watch(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("present", &self.is_present())
            .finish()
    }
}
