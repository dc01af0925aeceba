// HTTP client for the hosted backend.
//
// A thin reqwest wrapper with generic helpers for the row API
// (`/rest/v1/<table>`), stored procedures (`/rest/v1/rpc/<fn>`) and the
// auth API (`/auth/v1/*`). Every request carries the public API key; the
// bearer token is the signed-in user's access token when there is one and
// the API key otherwise.

use std::sync::RwLock;

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Query-string pairs in the row API's filter syntax, e.g. `("id", "eq.42")`.
pub type Filters = Vec<(&'static str, String)>;

pub struct HostedClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl HostedClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("yallwall/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Request failed: {what}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{what} returned {status}: {body}");
        }
        Ok(response)
    }

    /// `GET /rest/v1/<table>` with filters, returning the matching rows.
    pub async fn select<T: DeserializeOwned>(&self, table: &str, filters: &Filters) -> Result<Vec<T>> {
        debug!(table, "REST select");
        let request = self
            .request(Method::GET, &format!("/rest/v1/{table}"))
            .query(filters);
        self.send(&format!("select {table}"), request)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to deserialize {table} rows"))
    }

    /// Number of rows matching `filters`, read from the Content-Range total.
    pub async fn count(&self, table: &str, filters: &Filters) -> Result<u64> {
        let mut query = filters.clone();
        query.push(("select", "*".to_string()));
        query.push(("limit", "0".to_string()));
        let request = self
            .request(Method::GET, &format!("/rest/v1/{table}"))
            .header("Prefer", "count=exact")
            .query(&query);
        let response = self.send(&format!("count {table}"), request).await?;

        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        content_range_total(range)
            .with_context(|| format!("Missing row count for {table} in {range:?}"))
    }

    /// `POST /rest/v1/<table>`, returning the inserted rows.
    pub async fn insert<B, T>(&self, table: &str, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(table, "REST insert");
        let request = self
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .header("Prefer", "return=representation")
            .json(body);
        self.send(&format!("insert into {table}"), request)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to deserialize inserted {table} row"))
    }

    /// Insert-or-merge on the primary key.
    pub async fn upsert<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> Result<()> {
        debug!(table, "REST upsert");
        let request = self
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body);
        self.send(&format!("upsert into {table}"), request).await?;
        Ok(())
    }

    /// `PATCH /rest/v1/<table>` on the rows matching `filters`.
    pub async fn update<B, T>(&self, table: &str, filters: &Filters, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(table, "REST update");
        let request = self
            .request(Method::PATCH, &format!("/rest/v1/{table}"))
            .header("Prefer", "return=representation")
            .query(filters)
            .json(body);
        self.send(&format!("update {table}"), request)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to deserialize updated {table} rows"))
    }

    /// `DELETE /rest/v1/<table>`, returning how many rows went away.
    ///
    /// Rows hidden by the backend's access policy are not deleted and not
    /// counted, so zero can mean "not yours" as well as "not found".
    pub async fn delete(&self, table: &str, filters: &Filters) -> Result<usize> {
        debug!(table, "REST delete");
        let request = self
            .request(Method::DELETE, &format!("/rest/v1/{table}"))
            .header("Prefer", "return=representation")
            .query(filters);
        let rows: Vec<serde_json::Value> = self
            .send(&format!("delete from {table}"), request)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to deserialize deleted {table} rows"))?;
        Ok(rows.len())
    }

    /// Call a stored procedure. The result body is ignored.
    pub async fn rpc<B: Serialize + ?Sized>(&self, function: &str, args: &B) -> Result<()> {
        debug!(function, "RPC call");
        let request = self
            .request(Method::POST, &format!("/rest/v1/rpc/{function}"))
            .json(args);
        self.send(&format!("rpc {function}"), request).await?;
        Ok(())
    }

    /// POST to the auth API and decode the JSON reply.
    pub async fn auth_post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, &format!("/auth/v1/{path}"))
            .json(body);
        self.send(&format!("auth {path}"), request)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to deserialize auth {path} response"))
    }

    /// GET from the auth API. Returns None on 401, when the token is no
    /// longer valid.
    pub async fn auth_get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self
            .request(Method::GET, &format!("/auth/v1/{path}"))
            .send()
            .await
            .with_context(|| format!("Request failed: auth {path}"))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("auth {path} returned {status}: {body}");
        }
        let value = response
            .json()
            .await
            .with_context(|| format!("Failed to deserialize auth {path} response"))?;
        Ok(Some(value))
    }

    /// POST to the auth API, ignoring the reply body.
    pub async fn auth_post_empty(&self, path: &str) -> Result<()> {
        let request = self.request(Method::POST, &format!("/auth/v1/{path}"));
        self.send(&format!("auth {path}"), request).await?;
        Ok(())
    }
}

/// `eq.<value>` filter operand.
pub fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// `in.("a","b")` filter operand.
pub fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

/// Total from a `Content-Range` header such as `0-24/573` or `*/0`.
pub fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_list_quotes_values() {
        let ids = vec!["a1".to_string(), "b2".to_string()];
        assert_eq!(in_list(&ids), r#"in.("a1","b2")"#);
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("0-24/573"), Some(573));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-24/*"), None);
        assert_eq!(content_range_total(""), None);
    }

    #[test]
    fn test_token_defaults_to_none() {
        let client = HostedClient::new("https://example.test/", "anon").unwrap();
        assert_eq!(client.base_url(), "https://example.test");
        assert!(client.access_token().is_none());
        client.set_access_token(Some("tok".to_string()));
        assert_eq!(client.access_token().as_deref(), Some("tok"));
    }
}
