//! Provider router — selects the correct model backend based on config.

use crate::openai_compat::OpenAiCompatProvider;
use leash_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes model requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }
}

/// Build providers from configuration.
///
/// Known names get their well-known endpoints; any other entry in
/// `[providers]` needs an explicit `api_url`.
pub fn build_from_config(config: &leash_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let provider: Arc<dyn Provider> = match (name.as_str(), &provider_config.api_url) {
            ("openai", None) => Arc::new(OpenAiCompatProvider::openai(api_key)),
            ("openrouter", None) => Arc::new(OpenAiCompatProvider::openrouter(api_key)),
            ("ollama", url) => Arc::new(OpenAiCompatProvider::ollama(url.as_deref())),
            (_, Some(url)) => Arc::new(OpenAiCompatProvider::new(name, url, api_key)),
            (_, None) => {
                tracing::warn!(provider = %name, "No api_url for unknown provider, skipping");
                continue;
            }
        };

        router.register(name, provider);
    }

    // The default provider always exists, even with an empty [providers]
    // table — built from the top-level api_key.
    if router.default().is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let provider: Arc<dyn Provider> = match config.default_provider.as_str() {
            "openrouter" => Arc::new(OpenAiCompatProvider::openrouter(api_key)),
            "ollama" => Arc::new(OpenAiCompatProvider::ollama(None)),
            _ => Arc::new(OpenAiCompatProvider::openai(api_key)),
        };
        router.register(config.default_provider.clone(), provider);
    }

    router
}
