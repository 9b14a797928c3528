use std::sync::Arc;

use shared::{llms::LLMProvider, usage::PriceTable};

use crate::services::{memory_store::MemoryStore, store::ChatStore};

// Application state that will be shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn ChatStore>,
    /// `None` when no provider credential is configured.
    pub(crate) provider: Option<Arc<dyn LLMProvider>>,
    pub(crate) prices: Arc<PriceTable>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        provider: Option<Arc<dyn LLMProvider>>,
        prices: PriceTable,
    ) -> Self {
        Self {
            store,
            provider,
            prices: Arc::new(prices),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()), None, PriceTable::default())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store.backend())
            .field(
                "provider",
                &self.provider.as_ref().map(|provider| provider.provider_name()),
            )
            .finish_non_exhaustive()
    }
}
