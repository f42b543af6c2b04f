use super::types::*;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Persistent alert relation.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Writes every record or none of them. Returns the assigned ids in input order.
    async fn insert_batch(&self, records: &[AlertRecord]) -> Result<Vec<i64>>;

    /// Filtered page ordered by `created_at DESC, id DESC`.
    async fn list(&self, query: &AlertQuery) -> Result<AlertPage>;

    async fn get(&self, id: i64) -> Result<Option<AlertRecord>>;

    /// Distinct task ids, ascending.
    async fn task_ids(&self) -> Result<Vec<String>>;

    async fn count(&self) -> Result<u64>;

    /// Returns whether a record with this id existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Returns how many of the ids existed. Unknown ids are ignored.
    async fn delete_many(&self, ids: &[i64]) -> Result<u64>;
}

#[derive(Default)]
struct MemoryState {
    records: Vec<AlertRecord>,
    next_id: i64,
}

/// Process-local store for tests and storage-less runs.
#[derive(Default)]
pub struct MemoryAlertStore {
    state: Mutex<MemoryState>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn insert_batch(&self, records: &[AlertRecord]) -> Result<Vec<i64>> {
        let mut state = self.state();
        let mut ids = Vec::with_capacity(records.len());

        for record in records {
            state.next_id += 1;
            let id = state.next_id;
            state.records.push(AlertRecord {
                id: Some(id),
                ..record.clone()
            });
            ids.push(id);
        }

        Ok(ids)
    }

    async fn list(&self, query: &AlertQuery) -> Result<AlertPage> {
        let state = self.state();
        let mut matching: Vec<&AlertRecord> =
            state.records.iter().filter(|r| query.matches(r)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let items = matching
            .iter()
            .skip(query.offset() as usize)
            .take(query.page_size() as usize)
            .map(|r| (*r).clone())
            .collect();

        Ok(AlertPage {
            items,
            total: matching.len() as u64,
            page: query.page(),
            page_size: query.page_size(),
        })
    }

    async fn get(&self, id: i64) -> Result<Option<AlertRecord>> {
        Ok(self
            .state()
            .records
            .iter()
            .find(|r| r.id == Some(id))
            .cloned())
    }

    async fn task_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .state()
            .records
            .iter()
            .map(|r| r.task_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state().records.len() as u64)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.delete_many(&[id]).await? == 1)
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        let mut state = self.state();
        let before = state.records.len();
        state
            .records
            .retain(|r| r.id.is_none_or(|id| !ids.contains(&id)));
        Ok((before - state.records.len()) as u64)
    }
}
