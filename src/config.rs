//! Configuration for the weaving engine.
//!
//! This module provides [`WeaverConfig`], which controls hierarchy caching, frame computation and
//! batch parallelism.

/// Configuration for the weaving engine.
///
/// Controls how the class topology caches entries, how deep hierarchy walks may go and whether
/// stack map frames are computed for rewritten methods.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// Internal-name prefixes whose topology entries are cached independently of any loader.
    ///
    /// Classes under these prefixes are assumed to be identical for every loader.
    pub durable_prefixes: Vec<String>,
    /// Maximum number of levels a breadth-first hierarchy walk descends.
    pub max_hierarchy_depth: usize,
    /// Compute `StackMapTable` frames for rewritten methods of class version 50 and later.
    pub compute_frames: bool,
    /// Minimum batch size for which `transform_all` fans out over the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            durable_prefixes: vec!["java/".to_string()],
            max_hierarchy_depth: 64,
            compute_frames: true,
            parallel_threshold: 4,
        }
    }
}

impl WeaverConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` falls under one of the durable prefixes.
    #[must_use]
    pub fn is_durable(&self, name: &str) -> bool {
        self.durable_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}
