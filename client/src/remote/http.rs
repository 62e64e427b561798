//! HTTP transport for the remote key-value map API.

use super::{MapRef, MapStore, Page};
use crate::config::{Config, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};
use kvsync_engine::Entry;
use reqwest::{header::ACCEPT, Method, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response body of a page listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesResponse {
    #[serde(default)]
    key_value_entries: Vec<WireEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

/// Request body for entry writes. The remote stores values as strings.
#[derive(Debug, Serialize)]
struct EntryBody<'a> {
    name: &'a str,
    value: String,
}

#[derive(Debug, Serialize)]
struct CreateMapBody<'a> {
    name: &'a str,
    encrypted: bool,
}

/// Key-value map client over HTTP.
///
/// The bearer credential is fixed at construction; build one client per
/// caller identity.
#[derive(Clone)]
pub struct HttpMapClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    page_size: u32,
}

impl std::fmt::Debug for HttpMapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMapClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl HttpMapClient {
    /// Create a client. `timeout` bounds every individual request.
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(&config.base_url, config.token.clone(), config.timeout)?
            .with_page_size(config.page_size))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// `{base}/organizations/{o}/environments/{e}/keyvaluemaps/{tail...}`,
    /// with every segment percent-encoded.
    fn url(&self, map: &MapRef, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::InvalidUrl(self.base_url.to_string()))?;
            segments
                .pop_if_empty()
                .extend([
                    "organizations",
                    map.organization.as_str(),
                    "environments",
                    map.environment.as_str(),
                    "keyvaluemaps",
                ])
                .extend(tail);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
    }

    async fn send_entry(&self, method: Method, url: Url, entry: &Entry) -> Result<()> {
        let body = EntryBody {
            name: &entry.name,
            value: entry.value.to_wire_string(),
        };
        let resp = self.request(method, url).json(&body).send().await?;
        check_status(resp).await.map(|_| ())
    }
}

/// Turn a non-success response into [`Error::Remote`] with its raw body.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Remote {
        status: status.as_u16(),
        body,
    })
}

impl MapStore for HttpMapClient {
    async fn list_entries(&self, map: &MapRef, cursor: &str) -> Result<Page> {
        let url = self.url(map, &[map.map.as_str(), "entries"])?;
        let mut req = self
            .request(Method::GET, url)
            .query(&[("pageSize", self.page_size.to_string())]);
        if !cursor.is_empty() {
            req = req.query(&[("pageToken", cursor)]);
        }

        let resp = check_status(req.send().await?).await?;
        let body: ListEntriesResponse = resp.json().await?;

        let entries = body
            .key_value_entries
            .into_iter()
            .map(|wire| Entry::from_json(wire.name, &wire.value))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Decode(e.to_string()))?;

        tracing::debug!(
            "Listed {} entries from {} (cursor {:?})",
            entries.len(),
            map,
            cursor
        );

        Ok(Page::new(entries, body.next_page_token.unwrap_or_default()))
    }

    async fn put_entry(&self, map: &MapRef, entry: &Entry) -> Result<()> {
        let url = self.url(map, &[map.map.as_str(), "entries", entry.name.as_str()])?;
        match self.send_entry(Method::PUT, url, entry).await {
            Err(e) if e.is_not_found() => {
                tracing::debug!("Entry {} missing in {}, creating it", entry.name, map);
                let url = self.url(map, &[map.map.as_str(), "entries"])?;
                self.send_entry(Method::POST, url, entry).await
            }
            other => other,
        }
    }

    async fn delete_entry(&self, map: &MapRef, name: &str) -> Result<()> {
        let url = self.url(map, &[map.map.as_str(), "entries", name])?;
        let resp = self.request(Method::DELETE, url).send().await?;
        check_status(resp).await.map(|_| ())
    }

    async fn create_map(&self, map: &MapRef, encrypted: bool) -> Result<()> {
        let url = self.url(map, &[])?;
        let body = CreateMapBody {
            name: &map.map,
            encrypted,
        };
        let resp = self.request(Method::POST, url).json(&body).send().await?;
        check_status(resp).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpMapClient {
        HttpMapClient::new(base, "token", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn builds_entry_urls() {
        let map = MapRef::new("acme", "prod", "settings");
        let url = client("https://api.example.com/v1")
            .url(&map, &["settings", "entries", "db.host"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/organizations/acme/environments/prod/keyvaluemaps/settings/entries/db.host"
        );
    }

    #[test]
    fn trailing_slash_in_base_is_ignored() {
        let map = MapRef::new("acme", "prod", "settings");
        let url = client("https://api.example.com/v1/").url(&map, &[]).unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/organizations/acme/environments/prod/keyvaluemaps"
        );
    }

    #[test]
    fn segments_are_encoded() {
        let map = MapRef::new("acme", "prod", "my map");
        let url = client("http://localhost:8080")
            .url(&map, &["my map", "entries", "a/b?c"])
            .unwrap();

        assert!(url
            .as_str()
            .ends_with("/keyvaluemaps/my%20map/entries/a%2Fb%3Fc"));
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = HttpMapClient::new("not a url", "t", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));

        let err = HttpMapClient::new("mailto:ops@example.com", "t", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn decodes_list_response() {
        let body: ListEntriesResponse = serde_json::from_str(
            r#"{"keyValueEntries": [{"name": "a", "value": "1"}], "nextPageToken": "abc"}"#,
        )
        .unwrap();
        assert_eq!(body.key_value_entries.len(), 1);
        assert_eq!(body.next_page_token.as_deref(), Some("abc"));

        let empty: ListEntriesResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.key_value_entries.is_empty());
        assert!(empty.next_page_token.is_none());
    }

    #[test]
    fn debug_redacts_token() {
        let client = HttpMapClient::new(
            "https://api.example.com/v1",
            "s3cr3t-bearer",
            Duration::from_secs(5),
        )
        .unwrap();

        let debug = format!("{:?}", client);
        assert!(!debug.contains("s3cr3t-bearer"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("api.example.com"));
    }
}
