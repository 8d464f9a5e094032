//! Catalog-driven resource API
//!
//! One [`ResourceApi`] implementation for every kind described in the
//! embedded catalog. Paths, list fields and field mapping all come from the
//! kind's [`ResourceDef`].

use super::reconciler::{Applied, ResourceApi};
use super::record::{scalar_to_string, Resource};
use super::registry::{item_path, ResourceDef};
use crate::error::{ZpaError, ZpaResult};
use crate::zpa::client::ZpaClient;
use async_trait::async_trait;
use serde_json::Value;

/// [`ResourceApi`] over one catalog kind for one customer
pub struct CatalogApi<'a> {
    client: &'a ZpaClient,
    def: &'a ResourceDef,
    collection: String,
}

impl<'a> CatalogApi<'a> {
    /// Resolve the collection path. Path parameters are taken from `desired`.
    pub fn new(client: &'a ZpaClient, def: &'a ResourceDef, desired: &Resource) -> ZpaResult<Self> {
        let collection = def.collection_path(client.customer_id(), desired)?;
        Ok(Self {
            client,
            def,
            collection,
        })
    }

    pub fn definition(&self) -> &ResourceDef {
        self.def
    }

    pub fn collection_path(&self) -> &str {
        &self.collection
    }

    fn ensure_writable(&self, operation: &str) -> ZpaResult<()> {
        if self.def.read_only {
            return Err(ZpaError::Config(format!(
                "{} are read-only, cannot {}",
                self.def.display_name, operation
            )));
        }
        Ok(())
    }

    fn from_response(&self, json: Option<&Value>) -> Option<Resource> {
        match json {
            Some(Value::Object(map)) => Some(self.def.map_from_wire(map)),
            _ => None,
        }
    }

    /// GET the whole object of a kind whose endpoint is not a paged list
    pub async fn fetch_singleton(&self) -> ZpaResult<Resource> {
        let response = self.client.get(&self.collection).await?;
        if response.status != 200 {
            return Err(ZpaError::Fetch {
                resource: self.def.display_name.clone(),
                path: self.collection.clone(),
                message: response.message().unwrap_or("unknown").to_string(),
            });
        }
        self.from_response(response.json.as_ref())
            .ok_or_else(|| ZpaError::NotFound(self.def.display_name.clone()))
    }

    fn payload(&self, resource: &Resource) -> Value {
        Value::Object(self.def.map_to_wire(resource))
    }
}

#[async_trait]
impl ResourceApi for CatalogApi<'_> {
    type Item = Resource;

    fn kind(&self) -> &str {
        &self.def.display_name
    }

    fn id_of(&self, item: &Resource) -> Option<String> {
        item.id()
    }

    fn name_of(&self, item: &Resource) -> Option<String> {
        item.lookup(&self.def.name_field).and_then(scalar_to_string)
    }

    fn merge(&self, existing: &Resource, desired: &Resource) -> Resource {
        existing.merged_with(&self.def.retain_declared(desired))
    }

    fn render(&self, item: &Resource) -> ZpaResult<Value> {
        Ok(item.clone().into_value())
    }

    async fn get_by_id(&self, id: &str) -> ZpaResult<Option<Resource>> {
        let response = self.client.get(&item_path(&self.collection, id)).await?;
        if response.status != 200 {
            return Ok(None);
        }
        Ok(self.from_response(response.json.as_ref()))
    }

    async fn list_all(&self) -> ZpaResult<Vec<Resource>> {
        if self.def.singleton {
            return Ok(vec![self.fetch_singleton().await?]);
        }

        let items = self
            .client
            .paginate_all(&self.collection, &self.def.list_key)
            .await?;

        Ok(items
            .iter()
            .filter_map(|item| item.as_object())
            .map(|map| self.def.map_from_wire(map))
            .collect())
    }

    async fn create(&self, desired: &Resource) -> ZpaResult<Applied<Resource>> {
        self.ensure_writable("create")?;

        let mut body = desired.clone();
        body.remove("id");
        let payload = self.payload(&body);

        let response = self.client.post(&self.collection, Some(&payload)).await?;
        if response.status > 299 {
            return Err(ZpaError::fatal("POST", &self.collection, Some(response.status), response.raw));
        }

        let created = self
            .from_response(response.json.as_ref())
            .unwrap_or(body);
        Ok(Applied::clean(created))
    }

    async fn update(&self, merged: &Resource, _desired: &Resource) -> ZpaResult<Applied<Resource>> {
        self.ensure_writable("update")?;

        let id = merged
            .id()
            .ok_or_else(|| ZpaError::NotFound(format!("{} without id", self.def.display_name)))?;
        let path = item_path(&self.collection, &id);
        let payload = self.payload(merged);

        let response = self.client.put(&path, Some(&payload)).await?;
        if response.status > 299 {
            return Err(ZpaError::fatal("PUT", &path, Some(response.status), response.raw));
        }

        // PUT usually answers 204 with no body
        let updated = self
            .from_response(response.json.as_ref())
            .filter(|r| r.id().is_some())
            .unwrap_or_else(|| merged.clone());
        Ok(Applied::clean(updated))
    }

    async fn delete(&self, id: &str) -> ZpaResult<u16> {
        self.ensure_writable("delete")?;

        let path = item_path(&self.collection, id);
        let response = self.client.delete(&path).await?;
        if response.status > 299 {
            return Err(ZpaError::fatal("DELETE", &path, Some(response.status), response.raw));
        }
        Ok(response.status)
    }
}

