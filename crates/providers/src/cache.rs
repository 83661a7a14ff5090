//! Provider client cache.
//!
//! Clients are memoized by the full option tuple: two requests with equal
//! options share one handle, while changing any field (model, URL, key,
//! context size) builds a fresh one. The cache is a plain value owned by
//! the caller, not a process-wide singleton, so tests and parallel sessions
//! each get their own.

use std::sync::Arc;

use codeclaw_core::Provider;
use codeclaw_core::error::Result;
use codeclaw_core::session::ProviderOptions;

use crate::kind::ProviderKind;

#[derive(Default)]
pub struct ProviderClientCache {
    // Linear scan; a process holds a handful of distinct option tuples at most.
    clients: Vec<(ProviderOptions, Arc<dyn Provider>)>,
}

impl ProviderClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized client for these options, building it on first use.
    ///
    /// Fails synchronously with a configuration error when the provider tag
    /// is not in the supported set; no request is attempted.
    pub fn get_or_create(&mut self, options: &ProviderOptions) -> Result<Arc<dyn Provider>> {
        if let Some((_, client)) = self.clients.iter().find(|(cached, _)| cached == options) {
            return Ok(Arc::clone(client));
        }

        let kind: ProviderKind = options.provider.parse()?;
        let client = kind.build(options);
        self.clients.push((options.clone(), Arc::clone(&client)));
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
