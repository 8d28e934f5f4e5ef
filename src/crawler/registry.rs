use crate::crawler::Crawler;
use crate::model::VendorId;
use crate::vendors::{Moshtix, Oztix, Ticketmaster};
use crate::HarvestError;
use std::collections::BTreeMap;

/// Lookup table from vendor id to the adapter that owns it
#[derive(Default)]
pub struct CrawlerRegistry {
    crawlers: BTreeMap<VendorId, Box<dyn Crawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in vendor adapter
    pub fn with_default_vendors() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Moshtix::new()));
        registry.register(Box::new(Oztix::new()));
        registry.register(Box::new(Ticketmaster::new()));
        registry
    }

    /// Registers an adapter under its own vendor id, returning any adapter
    /// it replaced
    pub fn register(&mut self, crawler: Box<dyn Crawler>) -> Option<Box<dyn Crawler>> {
        self.crawlers.insert(crawler.vendor_id(), crawler)
    }

    pub fn get(&self, vendor_id: VendorId) -> Option<&dyn Crawler> {
        self.crawlers.get(&vendor_id).map(|crawler| crawler.as_ref())
    }

    /// Like [`CrawlerRegistry::get`], but an unknown vendor is an error
    pub fn require(&self, vendor_id: VendorId) -> Result<&dyn Crawler, HarvestError> {
        self.get(vendor_id)
            .ok_or(HarvestError::UnknownVendor(vendor_id))
    }

    /// Registered vendor ids in ascending order
    pub fn vendor_ids(&self) -> Vec<VendorId> {
        self.crawlers.keys().copied().collect()
    }
}
