//! Pipeline registry

use indexmap::IndexMap;
use tracing::debug;

use super::SuiteRegistry;
use crate::error::{EntityKind, NotFoundError, RegistryError};
use crate::models::{is_cron_like, PipelineConfig};

/// Registered pipelines in registration order
#[derive(Clone, Debug, Default)]
pub struct PipelineRegistry {
    pipelines: IndexMap<String, PipelineConfig>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline; every referenced suite must already exist
    pub fn register(
        &mut self,
        pipeline: PipelineConfig,
        suites: &SuiteRegistry,
    ) -> Result<(), RegistryError> {
        if self.pipelines.contains_key(&pipeline.id) {
            return Err(RegistryError::DuplicatePipeline(pipeline.id));
        }

        if let Some(unknown) = pipeline.suites.iter().find(|id| !suites.contains(id)) {
            return Err(RegistryError::InvalidSuiteReference {
                pipeline: pipeline.id.clone(),
                suite: unknown.clone(),
            });
        }

        if let Some(cron) = &pipeline.schedule {
            if !is_cron_like(cron) {
                return Err(RegistryError::InvalidSchedule {
                    owner: pipeline.id.clone(),
                    expression: cron.clone(),
                });
            }
        }

        debug!(
            "Registered pipeline {} ({} suites, parallel: {}, fail-fast: {})",
            pipeline.id,
            pipeline.suites.len(),
            pipeline.parallel,
            pipeline.fail_fast
        );
        self.pipelines.insert(pipeline.id.clone(), pipeline);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&PipelineConfig, NotFoundError> {
        self.pipelines
            .get(id)
            .ok_or_else(|| NotFoundError::new(EntityKind::Pipeline, id))
    }

    pub fn list_all(&self) -> impl Iterator<Item = &PipelineConfig> + '_ {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
