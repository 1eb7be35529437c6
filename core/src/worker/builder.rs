//! Builder pattern for Worker construction

use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::partition::Partition;
use crate::traits::RaceBait;

use super::executor::Worker;
use super::role::{Role, WorkerRecord};

use std::sync::Arc;

/// Builder for creating Worker instances
///
/// Provides ergonomic construction with validation. The quorum defaults to
/// the configured count for the role and the partition to this worker's
/// share of the item space.
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0, Role::Mutator)
///     .context(ctx)
///     .bait(bait)
///     .cpu_hint(Some(2))
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: usize,
    role: Role,
    ctx: Option<Arc<RunContext>>,
    bait: Option<Arc<dyn RaceBait>>,
    partition: Option<Partition>,
    quorum: Option<u32>,
    cpu_hint: Option<usize>,
}

impl WorkerBuilder {
    /// Create a new builder for worker `id` of `role`
    pub fn new(id: usize, role: Role) -> Self {
        Self {
            id,
            role,
            ctx: None,
            bait: None,
            partition: None,
            quorum: None,
            cpu_hint: None,
        }
    }

    /// Set the run context
    pub fn context(mut self, ctx: Arc<RunContext>) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Set the race bait
    pub fn bait(mut self, bait: Arc<dyn RaceBait>) -> Self {
        self.bait = Some(bait);
        self
    }

    /// Override the owned partition
    pub fn partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Override the arrival quorum
    pub fn quorum(mut self, quorum: u32) -> Self {
        self.quorum = Some(quorum);
        self
    }

    /// Set the processor to pin to
    pub fn cpu_hint(mut self, hint: Option<usize>) -> Self {
        self.cpu_hint = hint;
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if the context or bait is missing, or if the id is
    /// outside the configured count for the role.
    pub fn build(self) -> HarnessResult<Worker> {
        let ctx = self.ctx.ok_or(HarnessError::missing_config("context"))?;
        let bait = self.bait.ok_or(HarnessError::missing_config("bait"))?;

        let config = ctx.config();
        let parties = match self.role {
            Role::Accumulator => config.accumulators,
            Role::Mutator => config.mutators,
        };
        if self.id >= parties {
            return Err(HarnessError::config(format!(
                "{} id {} outside 0..{}",
                self.role, self.id, parties
            )));
        }

        let quorum = self
            .quorum
            .unwrap_or_else(|| u32::try_from(parties).unwrap_or(u32::MAX));
        let partition = self
            .partition
            .unwrap_or_else(|| Partition::of(config.items, parties, self.id));

        let record = Arc::new(WorkerRecord::new(
            self.id,
            self.role,
            self.cpu_hint,
            partition,
        ));
        Ok(Worker::new(record, self.role.bindings(quorum), ctx, bait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{ItemHandle, RawToken};
    use crate::config::HarnessConfig;
    use crate::traits::BaitError;

    struct NullBait;

    impl RaceBait for NullBait {
        fn name(&self) -> &str {
            "null"
        }
        fn create(&self, item: ItemHandle) -> Result<RawToken, BaitError> {
            Ok(item.index() as RawToken)
        }
        fn trigger(&self, _item: ItemHandle, _token: RawToken) -> Result<(), BaitError> {
            Ok(())
        }
        fn mutate(&self, _item: ItemHandle, _token: RawToken) -> Result<(), BaitError> {
            Ok(())
        }
        fn release(&self, _item: ItemHandle, _token: Option<RawToken>) -> Result<(), BaitError> {
            Ok(())
        }
    }

    fn context() -> Arc<RunContext> {
        let config = HarnessConfig::default()
            .with_items(100)
            .with_accumulators(2)
            .with_mutators(3);
        Arc::new(RunContext::new(config).unwrap())
    }

    #[test]
    fn test_builder_missing_context() {
        let result = WorkerBuilder::new(0, Role::Mutator)
            .bait(Arc::new(NullBait))
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("context"));
    }

    #[test]
    fn test_builder_missing_bait() {
        let result = WorkerBuilder::new(0, Role::Mutator)
            .context(context())
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("bait"));
    }

    #[test]
    fn test_builder_rejects_out_of_range_id() {
        let result = WorkerBuilder::new(3, Role::Mutator)
            .context(context())
            .bait(Arc::new(NullBait))
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_builder_defaults_partition_from_config() {
        let worker = WorkerBuilder::new(2, Role::Mutator)
            .context(context())
            .bait(Arc::new(NullBait))
            .cpu_hint(Some(4))
            .build()
            .unwrap();

        let record = worker.record();
        assert_eq!(record.partition, Partition { start: 66, end: 100 });
        assert_eq!(record.cpu_hint, Some(4));
        assert_eq!(record.role, Role::Mutator);
    }

    #[test]
    fn test_builder_partition_override() {
        let worker = WorkerBuilder::new(0, Role::Accumulator)
            .context(context())
            .bait(Arc::new(NullBait))
            .partition(Partition { start: 10, end: 20 })
            .quorum(1)
            .build()
            .unwrap();

        assert_eq!(worker.record().partition.len(), 10);
    }
}
