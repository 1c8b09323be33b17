use crate::convert::{BlobConverter, Converter};
use std::collections::HashMap;
use std::sync::Arc;

/// Picks a converter by file extension, falling back to verbatim storage.
pub struct ConversionRouter {
    routes: HashMap<String, Arc<dyn Converter>>,
    fallback: Arc<dyn Converter>,
}

impl ConversionRouter {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: Arc::new(BlobConverter),
        }
    }

    pub fn with_route<S: Into<String>>(mut self, extension: S, converter: Arc<dyn Converter>) -> Self {
        self.register(extension, converter);
        self
    }

    pub fn register<S: Into<String>>(&mut self, extension: S, converter: Arc<dyn Converter>) {
        self.routes.insert(extension.into(), converter);
    }

    /// Extensions match exactly, so `SLP` does not route to the `slp` converter.
    pub fn route(&self, extension: &str) -> &dyn Converter {
        self.routes
            .get(extension)
            .map(|c| c.as_ref())
            .unwrap_or_else(|| self.fallback.as_ref())
    }
}

impl Default for ConversionRouter {
    fn default() -> Self {
        Self::new()
    }
}
