use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::*;

use crate::{db_types::ProviderTag, gateway::PaymentProvider};

/// The set of payment provider adapters the engine can dispatch to.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderTag, Arc<dyn PaymentProvider>>,
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags = self.tags();
        tags.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        write!(f, "ProviderRegistry({tags:?})")
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own tag, replacing any adapter previously registered for that tag.
    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) -> &mut Self {
        let tag = provider.tag();
        if self.providers.insert(tag.clone(), provider).is_some() {
            warn!("🔌️ Payment provider {tag} was registered twice. The last registration wins.");
        } else {
            info!("🔌️ Payment provider {tag} registered");
        }
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, tag: &ProviderTag) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(tag).cloned()
    }

    pub fn supports(&self, tag: &ProviderTag) -> bool {
        self.providers.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<ProviderTag> {
        self.providers.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
