//! Google Drive API client: folder lookup, paged listing and PDF export.

use std::path::{Path, PathBuf};

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::Endpoints;
use crate::error::{DriveError, ItemError, Result};
use crate::models::{ApiErrorResponse, FileListResponse, RemoteFile};

/// Files requested per listing page.
pub const PAGE_SIZE: u32 = 500;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, parents, trashed)";

/// Position in a paged listing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageCursor {
    First,
    Next(String),
    Done,
}

/// Client for interacting with Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    endpoints: Endpoints,
}

impl DriveClient {
    /// Create a client talking to the public Google endpoints.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_endpoints(auth, Endpoints::default())
    }

    pub fn with_endpoints(auth: Authenticator, endpoints: Endpoints) -> Self {
        Self {
            auth,
            http: Client::new(),
            endpoints,
        }
    }

    /// Get file or folder metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<RemoteFile> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.endpoints.drive_api, file_id))
            .bearer_auth(&token)
            .query(&[
                ("supportsAllDrives", "true"),
                ("fields", "id, name, mimeType, parents, trashed"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let metadata: RemoteFile = response.json().await?;
        Ok(metadata)
    }

    /// Lazily list the non-trashed direct children of a folder.
    ///
    /// Pages are fetched on demand as the stream is polled, following the
    /// continuation token until the service stops returning one. The first
    /// failed page ends the stream with that error.
    pub fn list_folder_children<'a>(
        &'a self,
        folder_id: &'a str,
    ) -> impl Stream<Item = Result<RemoteFile>> + 'a {
        stream::try_unfold(PageCursor::First, move |cursor| {
            self.next_page(folder_id, cursor)
        })
        .map_ok(|files| stream::iter(files.into_iter().map(Ok::<_, DriveError>)))
        .try_flatten()
    }

    async fn next_page(
        &self,
        folder_id: &str,
        cursor: PageCursor,
    ) -> Result<Option<(Vec<RemoteFile>, PageCursor)>> {
        let page_token = match cursor {
            PageCursor::First => None,
            PageCursor::Next(token) => Some(token),
            PageCursor::Done => return Ok(None),
        };

        let token = self.auth.get_access_token().await?;
        let query = format!("'{}' in parents and trashed = false", folder_id);
        let page_size = PAGE_SIZE.to_string();

        let mut request = self
            .http
            .get(format!("{}/files", self.endpoints.drive_api))
            .bearer_auth(&token);

        if let Some(ref page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request
            .query(&[
                ("q", query.as_str()),
                ("pageSize", page_size.as_str()),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
                ("fields", LIST_FIELDS),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let page: FileListResponse = response.json().await?;
        debug!(
            files = page.files.len(),
            has_more = page.next_page_token.is_some(),
            "Fetched listing page"
        );

        let next = match page.next_page_token {
            Some(token) if !token.is_empty() => PageCursor::Next(token),
            _ => PageCursor::Done,
        };

        let children = page
            .files
            .into_iter()
            .filter(|file| file.is_live_child_of(folder_id))
            .collect();

        Ok(Some((children, next)))
    }

    /// Export a spreadsheet as A4, fit-to-width PDF and stream it to `destination`.
    ///
    /// The body is streamed into a `.part` sibling which is renamed onto
    /// `destination` once complete. Returns the number of bytes written. A
    /// failed export leaves no partial file and does not touch an existing
    /// `destination`.
    pub async fn export_pdf(
        &self,
        file_id: &str,
        destination: &Path,
    ) -> std::result::Result<u64, ItemError> {
        let token = self
            .auth
            .get_access_token()
            .await
            .map_err(|e| ItemError::Token(e.to_string()))?;

        let response = self
            .http
            .get(format!(
                "{}/spreadsheets/d/{}/export",
                self.endpoints.docs, file_id
            ))
            .bearer_auth(&token)
            .query(&[
                ("format", "pdf"),
                ("size", "A4"),
                ("fitw", "true"),
                ("gid", "0"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ItemError::Status(status.as_u16()));
        }

        let partial = partial_path(destination);
        let written = match write_body(response, &partial).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&partial, destination).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(written)
    }
}

/// In-progress download path next to `destination`.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}

async fn write_body(response: Response, destination: &Path) -> std::result::Result<u64, ItemError> {
    let mut file = File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

async fn api_error(response: Response) -> DriveError {
    let status = response.status();
    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        };
    }
    DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    }
}
