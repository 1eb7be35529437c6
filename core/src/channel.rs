//! Channel configuration for throughput sample delivery

/// Channel buffer configuration for orchestrator communication
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Throughput sample buffer size (orchestrator -> reporter)
    ///
    /// The orchestrator never blocks on a full buffer; excess samples are
    /// dropped.
    pub sample_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { sample_buffer: 64 }
    }
}

impl ChannelConfig {
    /// Create a new channel config with custom sample buffer size
    pub fn with_sample_buffer(mut self, size: usize) -> Self {
        self.sample_buffer = size;
        self
    }
}
