use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{StoreError, StoreResult, TaskStore};
use crate::models::{ProvisionTask, TaskId};

/// Map-backed task store for tests and single-process development.
///
/// Entry-level locking in `DashMap` gives the same row-level read-modify-write
/// semantics as the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskId, ProvisionTask>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: &ProvisionTask) -> StoreResult<ProvisionTask> {
        match self.tasks.entry(task.task_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateTask {
                task_id: task.task_id.clone(),
            }),
            Entry::Vacant(slot) => {
                let mut stored = task.clone();
                stored.version = 1;
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn get(&self, task_id: &TaskId) -> StoreResult<Option<ProvisionTask>> {
        Ok(self.tasks.get(task_id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, task: &ProvisionTask) -> StoreResult<ProvisionTask> {
        let mut entry = self
            .tasks
            .get_mut(&task.task_id)
            .ok_or_else(|| StoreError::NotFound {
                task_id: task.task_id.clone(),
            })?;

        if entry.version != task.version {
            return Err(StoreError::VersionConflict {
                task_id: task.task_id.clone(),
                expected: task.version,
            });
        }

        let mut stored = task.clone();
        stored.version = task.version + 1;
        *entry = stored.clone();
        Ok(stored)
    }

    async fn find_expired_leases(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<ProvisionTask>> {
        let mut expired: Vec<ProvisionTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.value().lease_expired(now))
            .map(|entry| entry.value().clone())
            .collect();
        expired.sort_by_key(|task| task.lease_expires_at);
        expired.truncate(limit);
        Ok(expired)
    }
}
