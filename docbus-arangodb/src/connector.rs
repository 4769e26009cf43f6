//! [`Connector`] producing [`ArangoDatabase`] handles.

use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use docbus_core::{
    driver::{Connection, ConnectionOptions, Connector},
    error::{DriverError, StoreResult},
};

use crate::database::ArangoDatabase;

/// Creates database handles sharing one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct ArangoConnector {
    client: Client,
}

impl ArangoConnector {
    pub fn new() -> StoreResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| DriverError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    /// Uses a preconfigured client, e.g. one with custom TLS roots.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Connector for ArangoConnector {
    fn connect(&self, options: &ConnectionOptions) -> StoreResult<Connection> {
        debug!(url = %options.url, database = %options.database_name, "arangodb handle created");

        Ok(Arc::new(ArangoDatabase::new(
            self.client.clone(),
            options.clone(),
        )))
    }
}
