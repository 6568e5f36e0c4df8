//! Suite registry
//!
//! Insertion-ordered, validated store of suite definitions.

use indexmap::IndexMap;
use tracing::debug;

use super::find_cycle;
use crate::error::{EntityKind, NotFoundError, RegistryError};
use crate::models::{is_cron_like, SuiteType, TestSuite, Trigger};

/// Registered suites, keyed by id in registration order
#[derive(Clone, Debug, Default)]
pub struct SuiteRegistry {
    suites: IndexMap<String, TestSuite>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suite; the registry is unchanged on error
    pub fn register(&mut self, suite: TestSuite) -> Result<(), RegistryError> {
        if self.suites.contains_key(&suite.id) {
            return Err(RegistryError::DuplicateSuite(suite.id));
        }

        validate_definition(&suite)?;

        for dependency in &suite.dependencies {
            if *dependency == suite.id {
                return Err(RegistryError::CyclicDependency {
                    path: vec![suite.id.clone(), suite.id.clone()],
                });
            }
            if !self.suites.contains_key(dependency) {
                return Err(RegistryError::InvalidDependency {
                    suite: suite.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        let cycle = find_cycle(&suite.id, |id| {
            if id == suite.id {
                Some(suite.dependencies.as_slice())
            } else {
                self.suites.get(id).map(|s| s.dependencies.as_slice())
            }
        });
        if let Some(path) = cycle {
            return Err(RegistryError::CyclicDependency { path });
        }

        debug!(
            "Registered suite {} ({} dependencies)",
            suite.id,
            suite.dependencies.len()
        );
        self.suites.insert(suite.id.clone(), suite);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&TestSuite, NotFoundError> {
        self.suites
            .get(id)
            .ok_or_else(|| NotFoundError::new(EntityKind::Suite, id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.suites.contains_key(id)
    }

    /// Registration index, used as the stable tie-break
    pub fn position(&self, id: &str) -> Option<usize> {
        self.suites.get_index_of(id)
    }

    pub fn list_all(&self) -> impl Iterator<Item = &TestSuite> + '_ {
        self.suites.values()
    }

    pub fn list_by_type(&self, suite_type: SuiteType) -> impl Iterator<Item = &TestSuite> + '_ {
        self.suites
            .values()
            .filter(move |s| s.suite_type == suite_type)
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Insert without validation, for building malformed graphs in tests
    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, suite: TestSuite) {
        self.suites.insert(suite.id.clone(), suite);
    }
}

fn validate_definition(suite: &TestSuite) -> Result<(), RegistryError> {
    for trigger in &suite.triggers {
        if let Trigger::Schedule { cron } = trigger {
            if !is_cron_like(cron) {
                return Err(RegistryError::InvalidSchedule {
                    owner: suite.id.clone(),
                    expression: cron.clone(),
                });
            }
        }
    }

    let multiplier = suite.retry_policy.backoff_multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(RegistryError::InvalidRetryPolicy {
            suite: suite.id.clone(),
            reason: format!("backoff multiplier must be >= 1, got {multiplier}"),
        });
    }

    Ok(())
}
