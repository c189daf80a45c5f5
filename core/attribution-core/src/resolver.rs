//! Fuses navigation signals with stored state into the current record.
//!
//! ```text
//! params ──(empty?)──► referrer
//!    │                    │
//!    ▼                    ▼
//! existing ⊕ referrer ⊕ params ⊕ {last_updated, referrer, landing_page}
//! ```
//!
//! When neither source produced anything the stored record is returned as-is
//! and nothing is written, so repeated calls on a quiet page never refresh
//! `last_updated`.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::record::{AttributionRecord, Signals, UpdateMetadata};
use crate::signals::Navigation;
use crate::store::AttributionStore;

/// Anything that can hand out the current attribution record.
pub trait AttributionSource {
    fn current_attribution(&mut self) -> AttributionRecord;
}

pub struct AttributionResolver<S: AttributionStore> {
    store: S,
    navigation: Navigation,
    config: ResolverConfig,
}

impl<S: AttributionStore> AttributionResolver<S> {
    pub fn new(store: S, navigation: Navigation, config: ResolverConfig) -> Self {
        AttributionResolver {
            store,
            navigation,
            config,
        }
    }

    pub fn resolve(&mut self) -> AttributionRecord {
        self.resolve_at(Utc::now())
    }

    pub fn resolve_at(&mut self, now: DateTime<Utc>) -> AttributionRecord {
        let params = self.navigation.extract_parameters();
        let referrer = if params.is_empty() {
            self.navigation.extract_referrer()
        } else {
            Signals::default()
        };
        let existing = self
            .store
            .read(&self.config.record_key)
            .unwrap_or_default();

        if params.is_empty() && referrer.is_empty() {
            debug!("No new attribution signal, keeping stored record");
            return existing;
        }

        let metadata = UpdateMetadata {
            last_updated: now,
            referrer: self.navigation.referrer().to_string(),
            landing_page: self.navigation.page_url().to_string(),
        };
        let merged = AttributionRecord::merged(existing, &referrer, &params, metadata);

        if let Err(err) = self
            .store
            .write(&self.config.record_key, &merged, self.config.ttl_days)
        {
            warn!(error = %err, key = %self.config.record_key, "Failed to persist attribution");
        } else {
            debug!(
                source = merged.source.as_deref().unwrap_or_default(),
                medium = merged.medium.as_deref().unwrap_or_default(),
                "Attribution updated"
            );
        }

        merged
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: AttributionStore> AttributionSource for AttributionResolver<S> {
    fn current_attribution(&mut self) -> AttributionRecord {
        self.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    const KEY: &str = "attribution_data";

    fn resolver(
        page: &str,
        referrer: Option<&str>,
        store: MemoryStore,
    ) -> AttributionResolver<MemoryStore> {
        let navigation = Navigation::new(page, referrer).unwrap();
        AttributionResolver::new(store, navigation, ResolverConfig::default())
    }

    fn stored(source: &str, medium: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        let record = AttributionRecord {
            source: Some(source.to_string()),
            medium: Some(medium.to_string()),
            ..AttributionRecord::default()
        };
        store.write(KEY, &record, 30).unwrap();
        store
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_visit_without_signal_is_empty_and_unwritten() {
        let mut resolver = resolver("https://shop.example.com/", None, MemoryStore::new());
        let record = resolver.resolve();
        assert!(record.is_empty());
        assert_eq!(resolver.store().write_count(), 0);
        assert!(resolver.store().raw(KEY).is_none());
    }

    #[test]
    fn test_google_referrer_resolves_organic() {
        let mut resolver = resolver(
            "https://shop.example.com/",
            Some("https://www.google.com/"),
            MemoryStore::new(),
        );
        let record = resolver.resolve_at(noon());
        assert_eq!(record.source.as_deref(), Some("google"));
        assert_eq!(record.medium.as_deref(), Some("organic"));
        assert_eq!(record.referrer.as_deref(), Some("https://www.google.com/"));
        assert_eq!(record.landing_page.as_deref(), Some("https://shop.example.com/"));
        assert_eq!(record.last_updated, Some(noon()));
        assert_eq!(resolver.store().read(KEY), Some(record));
    }

    #[test]
    fn test_gclid_resolves_google_paid() {
        let mut resolver = resolver(
            "https://shop.example.com/?gclid=abc123",
            None,
            MemoryStore::new(),
        );
        let record = resolver.resolve();
        assert_eq!(record.source.as_deref(), Some("google"));
        assert_eq!(record.medium.as_deref(), Some("paid"));
        assert_eq!(record.referrer.as_deref(), Some(""));
    }

    #[test]
    fn test_parameters_suppress_referrer_classification() {
        let mut resolver = resolver(
            "https://shop.example.com/?utm_campaign=launch",
            Some("https://www.facebook.com/"),
            stored("newsletter", "email"),
        );
        let record = resolver.resolve();
        assert_eq!(record.source.as_deref(), Some("newsletter"));
        assert_eq!(record.medium.as_deref(), Some("email"));
        assert_eq!(record.campaign.as_deref(), Some("launch"));
    }

    #[test]
    fn test_new_source_keeps_stored_medium() {
        let mut resolver = resolver(
            "https://shop.example.com/?utm_source=b",
            None,
            stored("a", "x"),
        );
        let record = resolver.resolve();
        assert_eq!(record.source.as_deref(), Some("b"));
        assert_eq!(record.medium.as_deref(), Some("x"));
    }

    #[test]
    fn test_same_site_navigation_keeps_existing_record() {
        let mut resolver = resolver(
            "https://shop.example.com/products",
            Some("https://shop.example.com/"),
            stored("google", "organic"),
        );
        let record = resolver.resolve();
        assert_eq!(record.source.as_deref(), Some("google"));
        assert_eq!(record.last_updated, None);
        assert_eq!(resolver.store().write_count(), 1);
    }

    #[test]
    fn test_repeated_resolve_without_signal_is_identical() {
        let mut resolver = resolver(
            "https://shop.example.com/",
            None,
            stored("google", "organic"),
        );
        let first = resolver.resolve();
        let second = resolver.resolve();
        assert_eq!(first, second);
        assert_eq!(resolver.store().write_count(), 1);
    }

    #[test]
    fn test_signal_refreshes_last_updated() {
        let mut resolver = resolver(
            "https://shop.example.com/?fbclid=1",
            None,
            MemoryStore::new(),
        );
        let first = resolver.resolve_at(noon());
        let later = noon() + Duration::hours(1);
        let second = resolver.resolve_at(later);
        assert_eq!(first.last_updated, Some(noon()));
        assert_eq!(second.last_updated, Some(later));
        assert_eq!(second.source.as_deref(), Some("meta"));
    }

    #[test]
    fn test_corrupt_store_treated_as_empty() {
        let mut store = MemoryStore::new();
        store.insert_raw(KEY, "%7Bbroken", Utc::now() + Duration::days(1));
        let mut resolver = resolver("https://shop.example.com/", None, store);
        assert!(resolver.resolve().is_empty());
    }

    #[test]
    fn test_corrupt_store_replaced_when_signal_arrives() {
        let mut store = MemoryStore::new();
        store.insert_raw(KEY, "%7Bbroken", Utc::now() + Duration::days(1));
        let mut resolver = resolver(
            "https://shop.example.com/?utm_source=x&utm_medium=y",
            None,
            store,
        );
        let record = resolver.resolve();
        assert_eq!(resolver.store().read(KEY), Some(record));
    }

    #[test]
    fn test_custom_record_key_and_ttl() {
        let navigation = Navigation::new("https://shop.example.com/?ttclid=1", None).unwrap();
        let config = ResolverConfig {
            record_key: "custom".to_string(),
            ttl_days: 7,
        };
        let before = Utc::now();
        let mut resolver = AttributionResolver::new(MemoryStore::new(), navigation, config);
        resolver.resolve();

        assert!(resolver.store().raw(KEY).is_none());
        let expires_at = resolver.store().expires_at("custom").unwrap();
        assert!(expires_at < before + Duration::days(8));
        assert!(expires_at >= before + Duration::days(7));
    }
}
