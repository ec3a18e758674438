//! One-time setup shared by every repository of an application
//!
//! [`Rice`] validates the configuration and opens the store client once; repositories for any
//! document type are then opened from it without reconnecting.
//!
//! # Example
//!
//! ```rust,ignore
//! use mongo_rice::{Config, Rice};
//!
//! let config = Config::load()?;
//! let rice = Rice::builder().config(config.mongo).build().await?;
//! let songs = rice.repository::<Song>()?;
//! let albums = rice.repository::<Album>()?;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::config::MongoConfig;
use crate::document::CollectionDocument;
use crate::repository::{
    DocumentMapper, IdentityMapper, RepositoryError, RepositoryOperation, RepositoryResult,
    RiceRepository,
};
use crate::store::{StoreClient, StoreConnector};

/// A validated configuration and a connected store client
#[derive(Clone)]
pub struct Rice {
    config: MongoConfig,
    client: Arc<dyn StoreClient>,
}

impl Rice {
    /// Start building
    pub fn builder() -> RiceBuilder {
        RiceBuilder::new()
    }

    /// The validated store configuration
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// The shared store client
    pub fn client(&self) -> Arc<dyn StoreClient> {
        Arc::clone(&self.client)
    }

    /// Repository for `D` returning documents as they are stored
    ///
    /// # Errors
    ///
    /// `Configuration` when `D`'s collection binding is invalid.
    pub fn repository<D: CollectionDocument>(&self) -> RepositoryResult<RiceRepository<D>> {
        RiceRepository::from_client(self.client.as_ref(), &self.config, IdentityMapper)
    }

    /// Repository for `D` mapping documents to `E` with `mapper`
    ///
    /// # Errors
    ///
    /// `Configuration` when `D`'s collection binding is invalid.
    pub fn mapped_repository<D, E, M>(&self, mapper: M) -> RepositoryResult<RiceRepository<D, E, M>>
    where
        D: CollectionDocument,
        E: Send + 'static,
        M: DocumentMapper<D, E>,
    {
        RiceRepository::from_client(self.client.as_ref(), &self.config, mapper)
    }
}

impl fmt::Debug for Rice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rice")
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Rice`]
#[derive(Default)]
pub struct RiceBuilder {
    config: Option<MongoConfig>,
    connector: Option<Arc<dyn StoreConnector>>,
}

impl RiceBuilder {
    /// Create a builder with no configuration and the default connector
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store configuration (required)
    #[must_use]
    pub fn config(mut self, config: MongoConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `connector` instead of the MongoDB driver
    #[must_use]
    pub fn connector(mut self, connector: impl StoreConnector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Validate the configuration and connect
    ///
    /// # Errors
    ///
    /// `Configuration` when no configuration was given, it is invalid, or no connector is
    /// available; the connector is not called in these cases. `Store` when connecting fails.
    pub async fn build(self) -> RepositoryResult<Rice> {
        let config = self.config.ok_or_else(|| {
            RepositoryError::configuration("no MongoDB configuration was provided")
        })?;
        config.validate()?;

        let connector = match self.connector {
            Some(connector) => connector,
            None => Self::default_connector()?,
        };
        let client = connector
            .connect(&config)
            .await
            .map_err(|e| RepositoryError::store(RepositoryOperation::Connect, e))?;

        tracing::info!(database = %config.database, "Store client ready");
        Ok(Rice { config, client })
    }

    #[cfg(feature = "mongodb")]
    fn default_connector() -> RepositoryResult<Arc<dyn StoreConnector>> {
        Ok(Arc::new(crate::store::MongoConnector))
    }

    #[cfg(not(feature = "mongodb"))]
    fn default_connector() -> RepositoryResult<Arc<dyn StoreConnector>> {
        Err(RepositoryError::configuration(
            "no store connector was provided and the mongodb feature is disabled",
        ))
    }
}

impl fmt::Debug for RiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiceBuilder")
            .field("config", &self.config)
            .field("connector", &self.connector.is_some())
            .finish()
    }
}
