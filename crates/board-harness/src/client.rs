//! REST client for the remote board API (Miro REST v2).
//!
//! [`RestBoard`] implements the engine's [`BoardSource`] and [`BoardWriter`]
//! for one board. [`RestBoards`] resolves board ids to clients that share a
//! single connection pool and token.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | board metadata | `GET /v2/boards/{board}` |
//! | item listing | `GET /v2/boards/{board}/items?limit&cursor&type` |
//! | connector listing | `GET /v2/boards/{board}/connectors?limit&cursor` |
//! | point lookup | `GET /v2/boards/{board}/items/{id}` |
//! | detail lookup | `GET /v2/boards/{board}/{collection}/{id}` |
//! | tags | `GET /v2/boards/{board}/tags`, members via `items?tag_id=` |
//! | groups | `GET /v2/boards/{board}/groups`, members via `groups/{id}` |
//! | create / update | `POST` / `PATCH /v2/boards/{board}/{collection}[/{id}]` |
//!
//! HTTP 404 maps to [`BoardError::NotFound`]; any other non-success status
//! maps to [`BoardError::Upstream`] carrying the store's message. Requests
//! are not retried.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use board_harness_core::error::BoardError;
use board_harness_core::models::{BoardInfo, GroupRef, Item, ItemType, Tag};
use board_harness_core::source::{Board, BoardSource, BoardWriter, Listing, Page};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ApiConfig;
use crate::traits::BoardResolver;

const MAX_ERROR_MESSAGE: usize = 300;

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    #[serde(default)]
    data: GroupData,
}

#[derive(Debug, Default, Deserialize)]
struct GroupData {
    #[serde(default)]
    items: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

/// Pull a readable message out of an error body.
fn upstream_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_MESSAGE {
        let mut cut: String = message.chars().take(MAX_ERROR_MESSAGE).collect();
        cut.push_str("...");
        cut
    } else {
        message
    }
}

/// Client for one board.
pub struct RestBoard {
    http: reqwest::Client,
    base_url: String,
    board_id: String,
    token: String,
    page_size: usize,
}

impl RestBoard {
    pub fn new(http: reqwest::Client, api: &ApiConfig, board_id: &str, token: &str) -> Self {
        Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            board_id: board_id.to_string(),
            token: token.to_string(),
            page_size: api.page_size,
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Board-scoped URL; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid board API base url '{}'", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("board API base url '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["v2", "boards", self.board_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
    }

    /// Send `request` and decode the JSON body, mapping 404 to not-found for
    /// `kind`/`id`.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: &'static str,
        id: &str,
    ) -> Result<T> {
        let response = self
            .authorized(request)
            .send()
            .await
            .with_context(|| format!("request for {} {} failed", kind, id))?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .with_context(|| format!("invalid response body for {} {}", kind, id));
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(BoardError::not_found(kind, id).into());
        }
        Err(BoardError::Upstream {
            status: status.as_u16(),
            message: upstream_message(&body),
        }
        .into())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        kind: &'static str,
        id: &str,
    ) -> Result<T> {
        let url = self.url(segments)?;
        debug!(%url, ?query, "GET");
        self.send(self.http.get(url).query(query), kind, id).await
    }

    fn page_query(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", self.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        query
    }

    /// Follow `cursor` through a listing of records that carry an `id`.
    async fn drain_ids(
        &self,
        segments: &[&str],
        extra: &[(&'static str, String)],
        kind: &'static str,
        id: &str,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let mut query = self.page_query(cursor.as_deref());
            query.extend(extra.iter().cloned());
            let page: ListResponse<IdOnly> = self.get(segments, &query, kind, id).await?;
            ids.extend(page.data.into_iter().map(|r| r.id));
            match page.cursor {
                Some(next) if seen.insert(next.clone()) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(ids)
    }

    fn collection(item_type: &ItemType) -> Result<&'static str> {
        item_type.api_collection().ok_or_else(|| {
            BoardError::Validation(format!("items of type '{}' cannot be written", item_type)).into()
        })
    }
}

#[async_trait]
impl BoardSource for RestBoard {
    async fn board_info(&self) -> Result<BoardInfo> {
        self.get(&[], &[], "board", &self.board_id).await
    }

    async fn list_page(&self, listing: &Listing, cursor: Option<&str>) -> Result<Page> {
        let mut query = self.page_query(cursor);
        let path = match listing {
            Listing::Items { item_type } => {
                if let Some(t) = item_type {
                    query.push(("type", t.as_str().to_string()));
                }
                "items"
            }
            Listing::Connectors => "connectors",
        };
        let page: ListResponse<Item> = self.get(&[path], &query, "board", &self.board_id).await?;
        Ok(Page {
            items: page.data,
            cursor: page.cursor,
        })
    }

    async fn item(&self, id: &str) -> Result<Item> {
        self.get(&["items", id], &[], "item", id).await
    }

    async fn item_detail(&self, id: &str, item_type: &ItemType) -> Result<Item> {
        match item_type.api_collection() {
            Some(collection) => {
                let kind = if *item_type == ItemType::Frame { "frame" } else { "item" };
                self.get(&[collection, id], &[], kind, id).await
            }
            None => self.item(id).await,
        }
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        let page: ListResponse<Tag> = self.get(&["tags"], &[], "board", &self.board_id).await?;
        Ok(page.data)
    }

    async fn tag_members(&self, tag_id: &str) -> Result<Vec<String>> {
        self.drain_ids(&["items"], &[("tag_id", tag_id.to_string())], "tag", tag_id)
            .await
    }

    async fn groups(&self) -> Result<Vec<GroupRef>> {
        let mut groups = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let query = self.page_query(cursor.as_deref());
            let page: ListResponse<GroupRef> =
                self.get(&["groups"], &query, "board", &self.board_id).await?;
            groups.extend(page.data);
            match page.cursor {
                Some(next) if seen.insert(next.clone()) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(groups)
    }

    async fn group_members(&self, group_id: &str) -> Result<Vec<String>> {
        let group: GroupResponse = self
            .get(&["groups", group_id], &[], "group", group_id)
            .await?;
        Ok(group.data.items)
    }

    async fn comments(&self) -> Result<Vec<Value>> {
        match self
            .get::<ListResponse<Value>>(&["comments"], &[], "comments", &self.board_id)
            .await
        {
            Ok(page) => Ok(page.data),
            // boards without comment access answer 404
            Err(e) if matches!(BoardError::classify(&e), Some(BoardError::NotFound { .. })) => {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BoardWriter for RestBoard {
    async fn create_item(&self, item_type: &ItemType, body: Map<String, Value>) -> Result<Item> {
        let collection = Self::collection(item_type)?;
        let url = self.url(&[collection])?;
        debug!(%url, "POST");
        self.send(self.http.post(url).json(&body), "board", &self.board_id)
            .await
            .with_context(|| format!("failed to create {}", item_type))
    }

    async fn update_item(
        &self,
        id: &str,
        item_type: &ItemType,
        body: Map<String, Value>,
    ) -> Result<Item> {
        let collection = Self::collection(item_type)?;
        let url = self.url(&[collection, id])?;
        debug!(%url, "PATCH");
        self.send(self.http.patch(url).json(&body), "item", id)
            .await
            .with_context(|| format!("failed to update {} {}", item_type, id))
    }
}

/// Resolves board ids to [`RestBoard`] clients sharing one HTTP pool.
pub struct RestBoards {
    api: ApiConfig,
    http: reqwest::Client,
    token: String,
}

impl RestBoards {
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let token = api.resolve_token()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api: api.clone(),
            http,
            token,
        })
    }
}

impl BoardResolver for RestBoards {
    fn board(&self, board_id: Option<&str>) -> Result<Arc<dyn Board>> {
        let board_id = board_id
            .or(self.api.board_id.as_deref())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                BoardError::Validation(
                    "no board_id given and api.board_id is not configured".to_string(),
                )
            })?;
        Ok(Arc::new(RestBoard::new(
            self.http.clone(),
            &self.api,
            board_id,
            &self.token,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_prefers_json_message() {
        assert_eq!(
            upstream_message(r#"{"status":429,"message":"Too many requests"}"#),
            "Too many requests"
        );
        assert_eq!(upstream_message("  plain failure "), "plain failure");
    }

    #[test]
    fn test_upstream_message_truncated() {
        let long = "x".repeat(1000);
        let message = upstream_message(&long);
        assert_eq!(message.chars().count(), MAX_ERROR_MESSAGE + 3);
    }

    #[test]
    fn test_url_layout() {
        let api = ApiConfig {
            base_url: "http://localhost:9/".to_string(),
            ..Default::default()
        };
        let board = RestBoard::new(reqwest::Client::new(), &api, "b1", "t");
        assert_eq!(
            board.url(&["items"]).unwrap().as_str(),
            "http://localhost:9/v2/boards/b1/items"
        );
        assert_eq!(board.board_id(), "b1");
    }

    #[test]
    fn test_url_segments_are_escaped() {
        let api = ApiConfig {
            base_url: "http://localhost:9".to_string(),
            ..Default::default()
        };
        let board = RestBoard::new(reqwest::Client::new(), &api, "b1", "t");
        assert_eq!(
            board.url(&["items", "a/b?c#d"]).unwrap().as_str(),
            "http://localhost:9/v2/boards/b1/items/a%2Fb%3Fc%23d"
        );
        assert_eq!(
            board.url(&["shapes", "../x"]).unwrap().path(),
            "/v2/boards/b1/shapes/..%2Fx"
        );
    }

    #[test]
    fn test_resolver_requires_board_id() {
        let api = ApiConfig {
            token: Some("t".to_string()),
            ..Default::default()
        };
        let boards = RestBoards::from_config(&api).unwrap();
        let err = boards.board(None).err().unwrap();
        assert!(matches!(
            BoardError::classify(&err),
            Some(BoardError::Validation(_))
        ));
        assert!(boards.board(Some("b2")).is_ok());
    }
}
