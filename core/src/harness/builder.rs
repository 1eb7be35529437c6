//! Builder pattern for Harness construction

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use crate::channel::ChannelConfig;
use crate::config::HarnessConfig;
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::orchestrator::ThroughputSample;
use crate::persistence::StateStore;
use crate::traits::RaceBait;

use super::executor::Harness;

/// Builder for creating a Harness with proper configuration
///
/// # Example
///
/// ```ignore
/// let (harness, samples) = HarnessBuilder::new()
///     .work_dir("/mnt/ext4-test/burst")
///     .items(1000)
///     .mutators(16)
///     .bait(bait)
///     .build()?;
/// ```
pub struct HarnessBuilder {
    config: HarnessConfig,
    bait: Option<Arc<dyn RaceBait>>,
    channel_config: ChannelConfig,
}

impl HarnessBuilder {
    /// Create a new harness builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
            bait: None,
            channel_config: ChannelConfig::default(),
        }
    }

    /// Set the full harness configuration
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the race-bait directory
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    /// Set the items per burst
    pub fn items(mut self, items: usize) -> Self {
        self.config.items = items;
        self
    }

    /// Set the accumulator count
    pub fn accumulators(mut self, accumulators: usize) -> Self {
        self.config.accumulators = accumulators;
        self
    }

    /// Set the mutator count
    pub fn mutators(mut self, mutators: usize) -> Self {
        self.config.mutators = mutators;
        self
    }

    /// Set the persisted record location
    pub fn state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_path = path.into();
        self
    }

    /// Set the race bait
    pub fn bait(mut self, bait: Arc<dyn RaceBait>) -> Self {
        self.bait = Some(bait);
        self
    }

    /// Set the channel configuration
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Build the harness and return it along with the sample receiver
    ///
    /// The configuration is clamped into range; see
    /// [`HarnessConfig::clamped`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bait is not set or the run context cannot be
    /// built.
    pub fn build(self) -> HarnessResult<(Harness, Receiver<ThroughputSample>)> {
        let bait = self.bait.ok_or_else(|| HarnessError::missing_config("bait"))?;

        let store = Arc::new(StateStore::new(self.config.state_path.clone()));
        let ctx = Arc::new(RunContext::new(self.config)?);
        let (samples_tx, samples_rx) = mpsc::sync_channel(self.channel_config.sample_buffer);

        Ok((Harness::new(ctx, bait, store, samples_tx), samples_rx))
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
