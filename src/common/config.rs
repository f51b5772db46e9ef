/// Engine-wide storage configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Frames per buffer pool instance
    pub pool_size: usize,
    /// Number of buffer pool shards
    pub num_instances: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 64,
            num_instances: 4,
        }
    }
}
