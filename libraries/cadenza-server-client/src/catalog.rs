//! Paged collection catalog over HTTP.

use crate::client::Connection;
use crate::error::{Result, ServerClientError};
use crate::types::CollectionPageResponse;
use async_trait::async_trait;
use cadenza_core::{Catalog, CollectionId, TrackPage};
use std::sync::Arc;
use tracing::debug;

/// `Catalog` backed by `GET /api/collections/{id}/tracks?page=N`.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    connection: Arc<Connection>,
}

impl HttpCatalog {
    pub(crate) fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    /// Fetch one page of a collection.
    pub async fn get_page(&self, collection_id: &CollectionId, page: u32) -> Result<TrackPage> {
        let mut url = self.connection.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServerClientError::InvalidUrl("Base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(["api", "collections", collection_id.as_str(), "tracks"]);
        url.query_pairs_mut().append_pair("page", &page.to_string());

        debug!(url = %url, collection_id = %collection_id, page, "Fetching collection page");

        let request = self.connection.http.get(url.clone());
        let response = self
            .connection
            .authorize(request, &url)
            .send()
            .await
            .map_err(ServerClientError::from_transport)?;

        let status = response.status();

        if status.is_success() {
            let body: CollectionPageResponse = response.json().await.map_err(|e| {
                ServerClientError::ParseError(format!("Failed to parse collection page: {}", e))
            })?;

            let connection = &self.connection;
            let track_page = body.into_page(page, |locator| {
                connection
                    .resolve(locator)
                    .map(String::from)
                    .unwrap_or_else(|_| locator.to_string())
            });

            debug!(
                collection_id = %collection_id,
                page,
                tracks = track_page.tracks.len(),
                has_more = track_page.has_more,
                "Fetched collection page"
            );

            Ok(track_page)
        } else if status.as_u16() == 401 {
            Err(ServerClientError::AuthRequired)
        } else if status.as_u16() == 404 {
            Err(ServerClientError::NotFound(format!(
                "collection {}",
                collection_id
            )))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ServerClientError::ServerError {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn fetch_page(
        &self,
        collection_id: &CollectionId,
        page: u32,
    ) -> cadenza_core::Result<TrackPage> {
        Ok(self.get_page(collection_id, page).await?)
    }
}
