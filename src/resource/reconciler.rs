//! Resource Reconciler
//!
//! Find-by-id-or-name, merge, create/update/delete. The same logic drives
//! catalog resources and policy rules through [`ResourceApi`].

use crate::error::{ZpaError, ZpaResult};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Result of a write, with anything worth reporting that did not fail it
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub item: T,
    pub warnings: Vec<String>,
}

impl<T> Applied<T> {
    pub fn clean(item: T) -> Self {
        Self {
            item,
            warnings: Vec::new(),
        }
    }
}

/// CRUD surface of one resource kind
#[async_trait]
pub trait ResourceApi: Send + Sync {
    type Item: Clone + PartialEq + fmt::Debug + Send + Sync;

    /// Human-readable kind, used in errors
    fn kind(&self) -> &str;

    fn id_of(&self, item: &Self::Item) -> Option<String>;

    fn name_of(&self, item: &Self::Item) -> Option<String>;

    /// Lay `desired` over `existing`. The existing id must survive.
    fn merge(&self, existing: &Self::Item, desired: &Self::Item) -> Self::Item;

    /// Whether writing `merged` would leave `existing` as it is
    fn is_unchanged(&self, existing: &Self::Item, merged: &Self::Item) -> bool {
        existing == merged
    }

    /// Internal-form JSON for callers
    fn render(&self, item: &Self::Item) -> ZpaResult<Value>;

    /// `None` when the server does not know the id
    async fn get_by_id(&self, id: &str) -> ZpaResult<Option<Self::Item>>;

    async fn list_all(&self) -> ZpaResult<Vec<Self::Item>>;

    async fn create(&self, desired: &Self::Item) -> ZpaResult<Applied<Self::Item>>;

    /// Write `merged`. `desired` is what the caller asked for, before the
    /// merge filled in existing values.
    async fn update(&self, merged: &Self::Item, desired: &Self::Item) -> ZpaResult<Applied<Self::Item>>;

    /// Returns the final HTTP status
    async fn delete(&self, id: &str) -> ZpaResult<u16>;
}

/// What a reconcile step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Deleted,
    Unchanged,
    Absent,
}

impl Action {
    pub fn changed(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

/// Outcome of [`ResourceReconciler::upsert`] or [`ResourceReconciler::ensure_absent`]
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T> {
    pub action: Action,
    /// The resource after the step; `None` only when nothing existed
    pub item: Option<T>,
    pub warnings: Vec<String>,
}

impl<T> Reconciled<T> {
    pub fn changed(&self) -> bool {
        self.action.changed()
    }
}

/// Generic reconciler over one [`ResourceApi`]
pub struct ResourceReconciler<A> {
    api: A,
}

impl<A: ResourceApi> ResourceReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Id lookup first; the name is only tried when the id finds nothing.
    /// A 404 that used up the retry budget counts as not found; any other
    /// failure is returned.
    pub async fn get_by_id_or_name(
        &self,
        id: Option<&str>,
        name: Option<&str>,
    ) -> ZpaResult<Option<A::Item>> {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            match self.api.get_by_id(id).await {
                Ok(Some(item)) => return Ok(Some(item)),
                Ok(None) => tracing::debug!("{} {} not found by id", self.api.kind(), id),
                Err(e) if e.status() == Some(404) => {
                    tracing::debug!("{} {} lookup failed, treating as absent: {}", self.api.kind(), id, e);
                },
                Err(e) => return Err(e),
            }
        }

        match name.filter(|name| !name.is_empty()) {
            Some(name) => self.get_by_name(name).await,
            None => Ok(None),
        }
    }

    /// First exact match in server order
    pub async fn get_by_name(&self, name: &str) -> ZpaResult<Option<A::Item>> {
        let items = self.api.list_all().await?;
        Ok(items
            .into_iter()
            .find(|item| self.api.name_of(item).as_deref() == Some(name)))
    }

    /// Update the match of `desired` if there is one, create otherwise
    pub async fn upsert(&self, desired: &A::Item) -> ZpaResult<Reconciled<A::Item>> {
        let id = self.api.id_of(desired);
        let name = self.api.name_of(desired);

        match self.get_by_id_or_name(id.as_deref(), name.as_deref()).await? {
            Some(existing) => {
                let merged = self.api.merge(&existing, desired);
                let action = if self.api.is_unchanged(&existing, &merged) {
                    Action::Unchanged
                } else {
                    Action::Updated
                };
                tracing::info!(
                    "updating {} {:?}",
                    self.api.kind(),
                    self.api.id_of(&existing)
                );
                let applied = self.api.update(&merged, desired).await?;
                Ok(Reconciled {
                    action,
                    item: Some(applied.item),
                    warnings: applied.warnings,
                })
            },
            None => {
                tracing::info!("creating {} {:?}", self.api.kind(), name);
                let applied = self.api.create(desired).await?;
                Ok(Reconciled {
                    action: Action::Created,
                    item: Some(applied.item),
                    warnings: applied.warnings,
                })
            },
        }
    }

    pub async fn delete(&self, id: &str) -> ZpaResult<u16> {
        tracing::info!("deleting {} {}", self.api.kind(), id);
        self.api.delete(id).await
    }

    /// Delete the match of `desired`, or do nothing when there is none
    pub async fn ensure_absent(&self, desired: &A::Item) -> ZpaResult<Reconciled<A::Item>> {
        let id = self.api.id_of(desired);
        let name = self.api.name_of(desired);

        let Some(existing) = self.get_by_id_or_name(id.as_deref(), name.as_deref()).await? else {
            return Ok(Reconciled {
                action: Action::Absent,
                item: None,
                warnings: Vec::new(),
            });
        };

        let Some(existing_id) = self.api.id_of(&existing) else {
            return Err(ZpaError::NotFound(format!(
                "{} {:?} has no id to delete",
                self.api.kind(),
                name
            )));
        };

        self.delete(&existing_id).await?;
        Ok(Reconciled {
            action: Action::Deleted,
            item: Some(existing),
            warnings: Vec::new(),
        })
    }

    /// Read-only lookup: by id, else by name, else everything. A missing
    /// id or name match is an error here.
    pub async fn query(&self, id: Option<&str>, name: Option<&str>) -> ZpaResult<Vec<A::Item>> {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            return match self.get_by_id_or_name(Some(id), None).await? {
                Some(item) => Ok(vec![item]),
                None => Err(ZpaError::NotFound(format!(
                    "Failed to get {} with id {}",
                    self.api.kind(),
                    id
                ))),
            };
        }

        if let Some(name) = name.filter(|name| !name.is_empty()) {
            return match self.get_by_name(name).await? {
                Some(item) => Ok(vec![item]),
                None => Err(ZpaError::NotFound(format!(
                    "Failed to get {} with name {}",
                    self.api.kind(),
                    name
                ))),
            };
        }

        self.api.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::record::Resource;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory store that counts calls
    #[derive(Default)]
    struct MemoryApi {
        items: Mutex<Vec<Resource>>,
        next_id: AtomicU32,
        id_lookups: AtomicU32,
        list_calls: AtomicU32,
        writes: AtomicU32,
        fail_id_lookup_with: Option<u16>,
    }

    impl MemoryApi {
        fn with(items: Vec<Value>) -> Self {
            let api = Self::default();
            *api.items.lock().unwrap() = items
                .iter()
                .map(|v| Resource::from_value(v).unwrap())
                .collect();
            api.next_id.store(100, Ordering::SeqCst);
            api
        }
    }

    #[async_trait]
    impl ResourceApi for MemoryApi {
        type Item = Resource;

        fn kind(&self) -> &str {
            "thing"
        }

        fn id_of(&self, item: &Resource) -> Option<String> {
            item.id()
        }

        fn name_of(&self, item: &Resource) -> Option<String> {
            item.name()
        }

        fn merge(&self, existing: &Resource, desired: &Resource) -> Resource {
            existing.merged_with(desired)
        }

        fn render(&self, item: &Resource) -> ZpaResult<Value> {
            Ok(item.clone().into_value())
        }

        async fn get_by_id(&self, id: &str) -> ZpaResult<Option<Resource>> {
            self.id_lookups.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_id_lookup_with {
                return Err(ZpaError::fatal("GET", "/thing", Some(status), "Reached max retries"));
            }
            let items = self.items.lock().unwrap();
            Ok(items.iter().find(|r| r.id().as_deref() == Some(id)).cloned())
        }

        async fn list_all(&self) -> ZpaResult<Vec<Resource>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.lock().unwrap().clone())
        }

        async fn create(&self, desired: &Resource) -> ZpaResult<Applied<Resource>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut created = desired.clone();
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            created.set("id", json!(id.to_string()));
            self.items.lock().unwrap().push(created.clone());
            Ok(Applied::clean(created))
        }

        async fn update(&self, merged: &Resource, _desired: &Resource) -> ZpaResult<Applied<Resource>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut items = self.items.lock().unwrap();
            let slot = items
                .iter_mut()
                .find(|r| r.id() == merged.id())
                .ok_or_else(|| ZpaError::NotFound("update".into()))?;
            *slot = merged.clone();
            Ok(Applied::clean(merged.clone()))
        }

        async fn delete(&self, id: &str) -> ZpaResult<u16> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.items.lock().unwrap().retain(|r| r.id().as_deref() != Some(id));
            Ok(204)
        }
    }

    fn desired(value: Value) -> Resource {
        Resource::from_value(&value).unwrap()
    }

    #[tokio::test]
    async fn test_id_hit_skips_listing() {
        let reconciler = ResourceReconciler::new(MemoryApi::with(vec![json!({"id": "1", "name": "A"})]));
        let found = reconciler.get_by_id_or_name(Some("1"), Some("A")).await.unwrap();

        assert_eq!(found.and_then(|r| r.id()).as_deref(), Some("1"));
        assert_eq!(reconciler.api().list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_id_miss_falls_back_to_first_name_match() {
        let reconciler = ResourceReconciler::new(MemoryApi::with(vec![
            json!({"id": "1", "name": "dup"}),
            json!({"id": "2", "name": "dup"}),
        ]));
        let found = reconciler.get_by_id_or_name(Some("404"), Some("dup")).await.unwrap();

        assert_eq!(found.and_then(|r| r.id()).as_deref(), Some("1"));
        assert_eq!(reconciler.api().id_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.api().list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_404_counts_as_not_found() {
        let mut api = MemoryApi::with(vec![json!({"id": "1", "name": "A"})]);
        api.fail_id_lookup_with = Some(404);
        let reconciler = ResourceReconciler::new(api);

        let found = reconciler.get_by_id_or_name(Some("1"), Some("A")).await.unwrap();
        assert!(found.is_some());
        assert_eq!(reconciler.api().list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_server_error_is_returned() {
        for status in [401, 403, 500, 503] {
            let mut api = MemoryApi::with(vec![json!({"id": "1", "name": "A"})]);
            api.fail_id_lookup_with = Some(status);
            let reconciler = ResourceReconciler::new(api);

            let err = reconciler.get_by_id_or_name(Some("1"), Some("A")).await.unwrap_err();
            assert_eq!(err.status(), Some(status));
            assert_eq!(reconciler.api().list_calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_upsert_never_creates_after_failed_id_lookup() {
        let mut api = MemoryApi::with(vec![]);
        api.fail_id_lookup_with = Some(503);
        let reconciler = ResourceReconciler::new(api);

        let result = reconciler.upsert(&desired(json!({"id": "1", "enabled": false}))).await;
        assert!(matches!(result, Err(ZpaError::FatalHttp { status: Some(503), .. })));
        assert_eq!(reconciler.api().writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let reconciler = ResourceReconciler::new(MemoryApi::with(vec![]));

        let first = reconciler
            .upsert(&desired(json!({"name": "G1", "enabled": true})))
            .await
            .unwrap();
        assert_eq!(first.action, Action::Created);
        let id = first.item.as_ref().and_then(|r| r.id()).unwrap();

        let second = reconciler
            .upsert(&desired(json!({"name": "G1", "enabled": false})))
            .await
            .unwrap();
        assert_eq!(second.action, Action::Updated);
        assert_eq!(second.item.as_ref().and_then(|r| r.id()), Some(id));
        assert_eq!(reconciler.api().items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_same_state_is_unchanged() {
        let reconciler = ResourceReconciler::new(MemoryApi::with(vec![json!({"id": "1", "name": "G1", "enabled": true})]));
        let outcome = reconciler
            .upsert(&desired(json!({"name": "G1", "enabled": true})))
            .await
            .unwrap();

        assert_eq!(outcome.action, Action::Unchanged);
        assert!(!outcome.changed());
    }

    #[tokio::test]
    async fn test_existing_id_wins_over_desired() {
        let reconciler = ResourceReconciler::new(MemoryApi::with(vec![json!({"id": "1", "name": "G1"})]));
        let outcome = reconciler
            .upsert(&desired(json!({"id": "999", "name": "G1", "enabled": true})))
            .await
            .unwrap();

        assert_eq!(outcome.item.and_then(|r| r.id()).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_ensure_absent() {
        let reconciler = ResourceReconciler::new(MemoryApi::with(vec![json!({"id": "1", "name": "G1"})]));

        let removed = reconciler.ensure_absent(&desired(json!({"name": "G1"}))).await.unwrap();
        assert_eq!(removed.action, Action::Deleted);
        assert!(removed.changed());

        let again = reconciler.ensure_absent(&desired(json!({"name": "G1"}))).await.unwrap();
        assert_eq!(again.action, Action::Absent);
        assert!(!again.changed());
        assert_eq!(reconciler.api().writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_modes() {
        let reconciler = ResourceReconciler::new(MemoryApi::with(vec![
            json!({"id": "1", "name": "A"}),
            json!({"id": "2", "name": "B"}),
        ]));

        assert_eq!(reconciler.query(None, None).await.unwrap().len(), 2);
        assert_eq!(reconciler.query(None, Some("B")).await.unwrap()[0].id().as_deref(), Some("2"));
        assert!(matches!(
            reconciler.query(Some("9"), None).await,
            Err(ZpaError::NotFound(_))
        ));
        assert!(matches!(
            reconciler.query(None, Some("C")).await,
            Err(ZpaError::NotFound(_))
        ));
    }
}
