//! Cached brand catalog
//!
//! Brand lists are cached per region for a fixed TTL. Failed fetches are
//! never cached, so the next call goes back to the provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::model::{Brand, Region};
use super::GiftProvider;
use crate::error::GiftError;
use crate::store::Store;

const ALL_REGIONS: &str = "*";

#[derive(Clone)]
struct CachedBrands {
    brands: Vec<Brand>,
    fetched_at: Instant,
}

/// Brand list from the provider, filtered by the admin allow-list
#[derive(Clone)]
pub struct BrandCatalog {
    provider: Arc<dyn GiftProvider>,
    store: Arc<dyn Store>,
    ttl: Duration,
    cache: Arc<RwLock<HashMap<String, CachedBrands>>>,
}

impl BrandCatalog {
    pub fn new(provider: Arc<dyn GiftProvider>, store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self {
            provider,
            store,
            ttl,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Brands available in `region`, restricted to admin-enabled codes when
    /// an allow-list exists.
    pub async fn brands(&self, region: Option<&str>) -> Result<Vec<Brand>, GiftError> {
        let brands = self.fetch_cached(region).await?;
        let enabled = self.store.enabled_brand_codes(region).await?;
        if enabled.is_empty() {
            return Ok(brands);
        }
        Ok(brands
            .into_iter()
            .filter(|b| enabled.iter().any(|code| code == &b.brand_code))
            .collect())
    }

    pub async fn regions(&self) -> Result<Vec<Region>, GiftError> {
        Ok(self.provider.list_regions().await?)
    }

    /// Look a brand up in the fresh cache entries only; never hits the network.
    pub async fn cached_brand(&self, brand_code: &str) -> Option<Brand> {
        let cache = self.cache.read().await;
        cache
            .values()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .flat_map(|entry| entry.brands.iter())
            .find(|b| b.brand_code == brand_code)
            .cloned()
    }

    async fn fetch_cached(&self, region: Option<&str>) -> Result<Vec<Brand>, GiftError> {
        let key = region.unwrap_or(ALL_REGIONS).to_string();

        if let Some(entry) = self.cache.read().await.get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.brands.clone());
            }
        }

        let brands = self.provider.list_brands(region).await.map_err(|e| {
            tracing::warn!(error = %e, region = %key, "Brand list fetch failed");
            GiftError::from(e)
        })?;

        self.cache.write().await.insert(
            key,
            CachedBrands {
                brands: brands.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(brands)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::gifts::ClaimLink;
    use crate::provider::{ProviderError, Reward};
    use crate::store::{MemoryStore, APP_DEFAULTS_KEY};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl GiftProvider for CountingProvider {
        fn is_configured(&self) -> bool {
            true
        }

        async fn list_brands(&self, _region: Option<&str>) -> Result<Vec<Brand>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Unavailable("down".into()));
            }
            Ok(["amazonUS", "starbucksUS"]
                .iter()
                .map(|code| Brand {
                    brand_code: code.to_string(),
                    name: code.to_string(),
                    image_url: None,
                    min_price_in_cents: Some(500),
                    max_price_in_cents: Some(10_000),
                    fixed_price_values_in_cents: vec![],
                })
                .collect())
        }

        async fn list_regions(&self) -> Result<Vec<Region>, ProviderError> {
            Ok(vec![])
        }

        async fn create_claim_link(
            &self,
            _id: Uuid,
            _brand_code: &str,
            _amount_cents: i64,
        ) -> Result<ClaimLink, ProviderError> {
            unreachable!()
        }

        async fn cancel(&self, _id: Uuid) -> Result<(), ProviderError> {
            unreachable!()
        }

        async fn reward(&self, _id: Uuid) -> Result<Option<Reward>, ProviderError> {
            unreachable!()
        }

        async fn list_rewards(&self, _limit: u32) -> Result<Vec<Reward>, ProviderError> {
            unreachable!()
        }

        async fn account_balance(&self) -> Option<i64> {
            None
        }
    }

    #[tokio::test]
    async fn test_caches_success_only() {
        let provider = Arc::new(CountingProvider::default());
        let store = Arc::new(MemoryStore::new());
        let catalog = BrandCatalog::new(provider.clone(), store, Duration::from_secs(60));

        provider.fail.store(true, Ordering::SeqCst);
        assert!(catalog.brands(None).await.is_err());
        assert!(catalog.brands(None).await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        provider.fail.store(false, Ordering::SeqCst);
        assert_eq!(catalog.brands(None).await.unwrap().len(), 2);
        assert_eq!(catalog.brands(None).await.unwrap().len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(catalog.cached_brand("amazonUS").await.is_some());
    }

    #[tokio::test]
    async fn test_filters_by_enabled_codes() {
        let provider = Arc::new(CountingProvider::default());
        let store = Arc::new(MemoryStore::new());
        store
            .set_enabled_brand_codes(APP_DEFAULTS_KEY, vec!["starbucksUS".into()])
            .await;
        let catalog = BrandCatalog::new(provider, store, Duration::from_secs(60));

        let brands = catalog.brands(Some("us")).await.unwrap();
        assert_eq!(brands.len(), 1);
        assert_eq!(brands[0].brand_code, "starbucksUS");
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let provider = Arc::new(CountingProvider::default());
        let store = Arc::new(MemoryStore::new());
        let catalog = BrandCatalog::new(provider.clone(), store, Duration::ZERO);

        catalog.brands(None).await.unwrap();
        catalog.brands(None).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(catalog.cached_brand("amazonUS").await.is_none());
    }
}
