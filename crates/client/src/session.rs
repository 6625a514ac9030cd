//! One signed-in notification session.
//!
//! Ties the transport, the store and the credential slot together so callers
//! only deal with login, logout and shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::api_client::NotificationApi;
use crate::config::ClientConfig;
use crate::credentials::{Credential, Credentials};
use crate::stores::NotificationStore;
use crate::toast::ToastSink;
use crate::ws::{WsConnection, WsHandle};

pub struct NotificationSession {
    credentials: Credentials,
    store: NotificationStore,
    connection: Option<WsConnection>,
    pump: JoinHandle<()>,
}

impl NotificationSession {
    /// Spawn the transport and wire its events into a fresh store.
    ///
    /// With `credential` present the socket connects immediately and the
    /// initial page is fetched before this returns.
    pub async fn start(
        config: ClientConfig,
        api: Arc<dyn NotificationApi>,
        toasts: Arc<dyn ToastSink>,
        credential: Option<Credential>,
    ) -> Self {
        let credentials = Credentials::new(credential);
        let store = NotificationStore::new(&config, api, credentials.clone(), toasts);
        let connection = WsConnection::spawn(config, credentials.clone());
        let pump = store.attach(connection.handle().subscribe());

        if credentials.is_present() {
            store.load_initial().await;
        }

        Self {
            credentials,
            store,
            connection: Some(connection),
            pump,
        }
    }

    /// Install a credential. The transport (re)connects with it.
    pub async fn login(&self, credential: Credential) {
        self.credentials.set(Some(credential));
        self.store.load_initial().await;
    }

    pub fn logout(&self) {
        self.credentials.set(None);
        self.store.clear();
    }

    pub fn connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.handle().is_connected())
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Transport handle, or `None` after shutdown.
    pub fn handle(&self) -> Option<WsHandle> {
        self.connection.as_ref().map(WsConnection::handle)
    }

    /// Tear the transport down and wait for it to stop.
    pub async fn shutdown(mut self) {
        if let Some(connection) = self.connection.take() {
            connection.shutdown().await;
        }
        self.pump.abort();
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
