//! Explicitly constructed holder of the process-wide realtime connection.

use std::sync::{Arc, OnceLock};

use super::{Connection, Credentials, Transport, WsTransport};
use crate::config::ClientConfig;

/// Shared by every view of one client process. The connection is created on
/// first use and lives as long as the context.
pub struct SyncContext {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    connection: OnceLock<Arc<Connection>>,
}

impl SyncContext {
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials) -> Arc<Self> {
        Arc::new(Self {
            transport,
            credentials,
            connection: OnceLock::new(),
        })
    }

    /// Context speaking WebSocket to the configured server.
    pub fn from_config(config: &ClientConfig) -> Arc<Self> {
        Self::new(
            Arc::new(WsTransport::new(config)),
            Credentials::new(config.user_id.clone(), config.api_key.clone()),
        )
    }

    pub fn user_id(&self) -> &str {
        &self.credentials.user_id
    }

    /// The shared connection, opened on first call.
    pub fn connection(&self) -> Arc<Connection> {
        self.connection
            .get_or_init(|| self.transport.connect(self.credentials.clone()))
            .clone()
    }

    /// The connection if some view already opened it.
    pub fn existing_connection(&self) -> Option<Arc<Connection>> {
        self.connection.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::ManualTransport;

    #[test]
    fn test_connection_is_lazy_and_shared() {
        let transport = Arc::new(ManualTransport::default());
        let context = SyncContext::new(transport.clone(), Credentials::new("u1", None));

        assert!(context.existing_connection().is_none());
        assert!(transport.connects.lock().unwrap().is_empty());

        let first = context.connection();
        let second = context.connection();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            *transport.connects.lock().unwrap(),
            vec![Credentials::new("u1", None)]
        );
    }
}
