use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::client::{query_pairs, ApiClient};
use crate::error::ClientResult;
use crate::models::Paginated;

/// CRUD calls against one collection path, e.g. `/product`.
#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
    client: &'a ApiClient,
    path: &'static str,
}

impl<'a> Resource<'a> {
    pub(crate) fn new(client: &'a ApiClient, path: &'static str) -> Self {
        Self { client, path }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub async fn list<T, Q>(&self, query: &Q) -> ClientResult<Paginated<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let query = query_pairs(query)?;
        self.client.send(Method::GET, self.path, query, None).await
    }

    pub async fn get<T: DeserializeOwned>(&self, id: Uuid) -> ClientResult<T> {
        self.client
            .send(Method::GET, &self.item(id), Vec::new(), None)
            .await
    }

    pub async fn create<T, B>(&self, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.client
            .send(Method::POST, self.path, Vec::new(), Some(body))
            .await
    }

    pub async fn update<T, B>(&self, id: Uuid, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.client
            .send(Method::PATCH, &self.item(id), Vec::new(), Some(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, id: Uuid) -> ClientResult<T> {
        self.client
            .send(Method::DELETE, &self.item(id), Vec::new(), None)
            .await
    }

    fn item(&self, id: Uuid) -> String {
        format!("{}/{}", self.path, id)
    }
}
