//! # PlayUR Client
//!
//! Talks to the PlayUR platform API: the resource list endpoints used for
//! enum generation, build versioning and upload, and user login.
//!
//! Every request carries the game's `gameID` and `clientSecret`. Responses
//! go through one policy (see [`ApiResponse`]): transport and parse errors
//! are returned as errors, a structured `success: false` is returned as
//! [`ApiResponse::Failure`].

use playur_core::prelude::*;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

mod response;

pub use response::ApiResponse;

pub const LATEST_BUILD_ENDPOINT: &str = "Build/latestBuildID.php";
pub const UPLOAD_BUILD_ENDPOINT: &str = "Build/";
pub const LOGIN_ENDPOINT: &str = "User/login.php";
pub const REGISTER_ENDPOINT: &str = "User/register.php";

pub const ARCHIVE_FILE_NAME: &str = "index.zip";
pub const ARCHIVE_MIME: &str = "application/zip";

#[derive(Error, Debug)]
pub enum PlayurClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Transport(reqwest::Error),

    #[error("Server communication error: {0}")]
    ServerCommunication(String),

    #[error("Server returned error {0}: {1}")]
    ServerError(StatusCode, String),

    #[error("{0}")]
    Application(String),
}

/// Request URLs carry the client secret, so they are dropped from the error.
impl From<reqwest::Error> for PlayurClientError {
    fn from(err: reqwest::Error) -> Self {
        PlayurClientError::Transport(err.without_url())
    }
}

pub type Result<T> = std::result::Result<T, PlayurClientError>;

/// Fields of the registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone)]
pub struct PlayurClient {
    base_url: String,
    client: Client,
    credentials: GameCredentials,
}

impl PlayurClient {
    pub fn new(base_url: impl Into<String>, credentials: GameCredentials) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            credentials,
        }
    }

    pub fn from_settings(settings: &PlayurSettings) -> std::result::Result<Self, SettingsError> {
        Ok(Self::new(settings.server_url.clone(), settings.credentials()?))
    }

    pub fn credentials(&self) -> &GameCredentials {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<ApiResponse> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        response::interpret(status, &text)
    }

    /// GET with the game credentials (and `extra`) in the query string.
    pub async fn get(&self, endpoint: &str, extra: &[(&str, &str)]) -> Result<ApiResponse> {
        let url = self.url(endpoint);
        debug!(%url, "GET");

        let mut query: Vec<(&str, String)> = self.credentials.as_form();
        query.extend(extra.iter().map(|(k, v)| (*k, v.to_string())));

        self.send(self.client.get(&url).query(&query)).await
    }

    /// POST a url-encoded form, game credentials included.
    pub async fn post_form(&self, endpoint: &str, fields: &[(&str, &str)]) -> Result<ApiResponse> {
        let url = self.url(endpoint);
        debug!(%url, "POST");

        let mut form: Vec<(&str, String)> = self.credentials.as_form();
        form.extend(fields.iter().map(|(k, v)| (*k, v.to_string())));

        self.send(self.client.post(&url).form(&form)).await
    }

    /// Multipart upload of a single file.
    ///
    /// The form carries `gameID`, `clientSecret`, `file` and, when given,
    /// `request` holding the JSON-encoded metadata. The MIME type is guessed
    /// from `file_name` when not supplied.
    pub async fn upload_file(
        &self,
        endpoint: &str,
        path: &Path,
        file_name: &str,
        mime: Option<&str>,
        request: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(endpoint);

        let file = File::open(path).await?;
        let length = file.metadata().await?.len();
        let mime = mime.map(str::to_string).unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string()
        });

        info!(%url, path = %path.display(), bytes = length, %mime, "uploading file");

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(file_name.to_string())
            .mime_str(&mime)?;

        let mut form = Form::new();
        for (key, value) in self.credentials.as_form() {
            form = form.text(key, value);
        }
        form = form.part("file", part);
        if let Some(request) = request {
            form = form.text("request", request.to_string());
        }

        self.send(self.client.post(&url).multipart(form)).await
    }

    /// Fetches and decodes the `records` of a resource list endpoint.
    pub async fn fetch_records<T: DeserializeOwned>(
        &self,
        resource: ResourceType,
    ) -> Result<Vec<T>> {
        let body = self.get(resource.endpoint(), &[]).await?.into_success()?;
        let list: RecordList<T> = serde_json::from_value(body).map_err(|e| {
            PlayurClientError::ServerCommunication(format!(
                "Unexpected {resource} records: {e}"
            ))
        })?;
        Ok(list.records)
    }

    /// Latest build number of a branch, or of the game when `branch` is `None`.
    pub async fn latest_build_id(&self, branch: Option<&str>) -> Result<i64> {
        let extra: Vec<(&str, &str)> = branch.map(|b| ("branch", b)).into_iter().collect();
        let body = self
            .get(LATEST_BUILD_ENDPOINT, &extra)
            .await?
            .into_success()?;
        response::latest_build_id(&body)
    }

    /// Uploads a zipped build together with its descriptor.
    pub async fn upload_build(
        &self,
        archive: &Path,
        descriptor: &BuildDescriptor,
    ) -> Result<ApiResponse> {
        let request = serde_json::to_value(descriptor)
            .map_err(|e| PlayurClientError::ServerCommunication(e.to_string()))?;
        self.upload_file(
            UPLOAD_BUILD_ENDPOINT,
            archive,
            ARCHIVE_FILE_NAME,
            Some(ARCHIVE_MIME),
            Some(&request),
        )
        .await
    }

    /// Page that plays the given build.
    pub fn game_url(&self, build_id: i64) -> String {
        let page = format!(
            "/games.php?/game/{}/buildID/{build_id}",
            self.credentials.client_secret
        );
        if self.base_url.contains("/api/") {
            self.base_url.replacen("/api/", &page, 1)
        } else {
            format!("{}{page}", self.base_url.trim_end_matches("/api").trim_end_matches('/'))
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<ApiResponse> {
        self.post_form(
            LOGIN_ENDPOINT,
            &[("username", username), ("password", password)],
        )
        .await
    }

    pub async fn register(&self, registration: &Registration) -> Result<ApiResponse> {
        self.post_form(
            REGISTER_ENDPOINT,
            &[
                ("username", registration.username.as_str()),
                ("password", registration.password.as_str()),
                ("email", registration.email.as_str()),
                ("firstName", registration.first_name.as_str()),
                ("lastName", registration.last_name.as_str()),
            ],
        )
        .await
    }
}
