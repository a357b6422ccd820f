//! Data sources handed to the use cases.
//!
//! One collection accessor per logical data source. Built from the
//! bootstrapped handles; repositories never see a connection.

use crate::lifecycle::bootstrap::DataStores;
use crate::nosql::{CollectionAccessor, NoSqlError, NoSqlResult};

#[derive(Debug, Clone)]
pub struct Datasources {
    pub hotels: CollectionAccessor,
    pub locations: CollectionAccessor,
    pub services: CollectionAccessor,
    pub reservations: CollectionAccessor,
}

impl Datasources {
    /// Take an accessor from each bootstrapped handle and mark it in use.
    pub fn create(stores: &DataStores) -> NoSqlResult<Self> {
        let take = |key: &str| -> NoSqlResult<CollectionAccessor> {
            let handle = stores.get(key).ok_or_else(|| {
                NoSqlError::Precondition(format!("data source '{}' was not bootstrapped", key))
            })?;
            let accessor = handle.collection()?;
            handle.mark_in_use()?;
            Ok(accessor)
        };

        Ok(Self {
            hotels: take("hotels")?,
            locations: take("locations")?,
            services: take("services")?,
            reservations: take("reservations")?,
        })
    }

    pub fn from_accessors(
        hotels: CollectionAccessor,
        locations: CollectionAccessor,
        services: CollectionAccessor,
        reservations: CollectionAccessor,
    ) -> Self {
        Self {
            hotels,
            locations,
            services,
            reservations,
        }
    }

    /// Logical name / accessor pairs.
    pub fn entries(&self) -> [(&'static str, &CollectionAccessor); 4] {
        [
            ("hotels", &self.hotels),
            ("locations", &self.locations),
            ("services", &self.services),
            ("reservations", &self.reservations),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoSqlConfig;
    use crate::lifecycle::bootstrap::{BootstrapPlan, Bootstrapper};
    use crate::nosql::{ClientRegistry, ClientState, MemoryConnector};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_marks_handles_in_use() {
        let connector = MemoryConnector::new();
        let bootstrapper = Bootstrapper::new(ClientRegistry::new(Arc::new(connector)));
        let bootstrapped = bootstrapper
            .bootstrap(BootstrapPlan::from_config(&NoSqlConfig::default()))
            .await
            .unwrap();

        let datasources = Datasources::create(&bootstrapped.stores).unwrap();
        assert_eq!(datasources.hotels.name(), "hotels");
        assert_eq!(datasources.reservations.name(), "reservations");
        for (key, _) in datasources.entries() {
            assert_eq!(bootstrapped.stores.get(key).unwrap().state(), ClientState::InUse);
        }
        // The tracking collection is not a data source.
        assert_eq!(
            bootstrapped.stores.tracking().unwrap().state(),
            ClientState::Connected
        );

        bootstrapped.teardown.run().await;
    }

    #[tokio::test]
    async fn test_missing_store_is_precondition_error() {
        let err = Datasources::create(&DataStores::default()).unwrap_err();
        assert!(matches!(err, NoSqlError::Precondition(_)));
    }
}
