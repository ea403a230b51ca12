//! [`RemoteStore`] over a PostgREST-compatible HTTP API.
//!
//! Row-level security on the server decides what a token may see, so rows of
//! other users are invisible rather than refused. A write that matches no
//! row is therefore reported as [`RemoteError::NotFound`].

use async_trait::async_trait;
use engine::{Collection, Filter, RemoteError, RemoteStore, Row};
use reqwest::{Method, RequestBuilder, Url};

mod error;
mod query;

const API_KEY_HEADER: &str = "apikey";
const PREFER_HEADER: &str = "Prefer";

#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: Url,
    http: reqwest::Client,
    api_key: String,
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, RemoteError> {
        // Without the trailing slash `join` would drop the last path segment.
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&base_url)
            .map_err(|err| RemoteError::Validation(format!("invalid base_url: {err}")))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            access_token: None,
        })
    }

    /// Act as the user owning `token`. Without one requests carry the api key
    /// only.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn endpoint(&self, collection: Collection, filter: Option<&Filter>) -> Result<Url, RemoteError> {
        let mut url = self
            .base_url
            .join(&format!("rest/v1/{}", collection.as_str()))
            .map_err(|err| RemoteError::Validation(format!("invalid base_url: {err}")))?;
        if let Some(filter) = filter {
            query::apply(&mut url, filter);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(bearer)
    }

    /// Send a filtered write and return the rows it touched.
    async fn write_returning(
        &self,
        method: Method,
        collection: Collection,
        filter: &Filter,
        body: Option<Row>,
    ) -> Result<Vec<Row>, RemoteError> {
        if filter.predicates().is_empty() {
            return Err(RemoteError::Validation(
                "refusing to write without a filter".to_string(),
            ));
        }

        let url = self.endpoint(collection, Some(filter))?;
        let mut request = self
            .request(method, url)
            .header(PREFER_HEADER, "return=representation");
        if let Some(body) = &body {
            request = request.json(body);
        }

        let res = request.send().await.map_err(error::transport)?;
        let res = error::check(res).await?;
        let rows = res.json::<Vec<Row>>().await.map_err(error::transport)?;
        if rows.is_empty() {
            return Err(RemoteError::NotFound(format!(
                "{} matching filter",
                collection.as_str()
            )));
        }
        Ok(rows)
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Row>, RemoteError> {
        let mut url = self.endpoint(collection, None)?;
        url.query_pairs_mut().append_pair("select", "*");
        query::apply(&mut url, filter);
        tracing::debug!("GET {}", url.path());

        let res = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(error::transport)?;
        let res = error::check(res).await?;
        res.json::<Vec<Row>>().await.map_err(error::transport)
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<(), RemoteError> {
        let url = self.endpoint(collection, None)?;
        let res = self
            .request(Method::POST, url)
            .header(PREFER_HEADER, "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(error::transport)?;
        error::check(res).await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Row,
    ) -> Result<(), RemoteError> {
        let rows = self
            .write_returning(Method::PATCH, collection, filter, Some(fields))
            .await?;
        tracing::debug!("updated {} row(s) of {}", rows.len(), collection.as_str());
        Ok(())
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), RemoteError> {
        let rows = self
            .write_returning(Method::DELETE, collection, filter, None)
            .await?;
        tracing::debug!("deleted {} row(s) of {}", rows.len(), collection.as_str());
        Ok(())
    }
}
