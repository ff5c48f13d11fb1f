// The authority port and its HTTP implementation.
//
// Every game decision is made by the remote server; this module only moves
// requests and responses. Interpreting them (which errors are terminal,
// which are retried) is left to the fetcher and the intent submitter.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use cardtable_core::protocol::{
    ErrorBody, LobbyReadyResponse, PlayRequest, ReadyResponse, StateResponse,
};
use reqwest::Url;
use serde::de::{DeserializeOwned, IgnoredAny};
use thiserror::Error;
use tracing::debug;

/// Per-request timeout. A hung request would otherwise stall the poller.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

/// How the authority answered an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Accepted(T),
    /// Refused, with the authority's reason when it gave one.
    Rejected(Option<String>),
    /// The authority answered with a redirect; `location` is the final URL.
    Redirected { location: String },
}

impl<T> Reply<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        match self {
            Reply::Accepted(v) => Reply::Accepted(f(v)),
            Reply::Rejected(reason) => Reply::Rejected(reason),
            Reply::Redirected { location } => Reply::Redirected { location },
        }
    }
}

/// The remote game server, as seen by this client.
#[async_trait]
pub trait Authority: Send + Sync {
    /// `GET /state`. Error bodies are returned as data, not as `Err`.
    async fn fetch_state(&self) -> Result<StateResponse, AuthorityError>;

    /// `POST /play`.
    async fn play(&self, request: &PlayRequest) -> Result<Reply<()>, AuthorityError>;

    /// `POST /end-round`.
    async fn end_round(&self) -> Result<Reply<()>, AuthorityError>;

    /// `POST /ready-next-round`.
    async fn ready_next_round(&self) -> Result<Reply<ReadyResponse>, AuthorityError>;

    /// `POST /delete-room/{room}`. Ends the game for everyone.
    async fn delete_room(&self, room: &str) -> Result<Reply<()>, AuthorityError>;

    /// `POST /join-room` (form). Establishes the session cookie.
    async fn join_room(&self, room: &str, name: &str) -> Result<Reply<()>, AuthorityError>;

    /// `POST /toggle-ready/{room}`, the lobby readiness switch.
    async fn toggle_lobby_ready(
        &self,
        room: &str,
    ) -> Result<Reply<LobbyReadyResponse>, AuthorityError>;
}

// ---------------------------------------------------------------------------
// Raw replies
// ---------------------------------------------------------------------------

/// What came back over the wire, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    /// Set when the final URL differs from the one requested.
    pub redirected_to: Option<String>,
    pub body: String,
}

impl RawReply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classify the reply: redirect, `{error}` body or non-2xx status,
    /// otherwise decode the body as `T`.
    pub fn interpret<T: DeserializeOwned>(self, path: &str) -> Result<Reply<T>, AuthorityError> {
        if let Some(location) = self.redirected_to {
            return Ok(Reply::Redirected { location });
        }

        if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&self.body) {
            return Ok(Reply::Rejected(Some(error)));
        }
        if !self.is_success() {
            return Ok(Reply::Rejected(None));
        }

        serde_json::from_str::<T>(&self.body)
            .map(Reply::Accepted)
            .map_err(|e| AuthorityError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// HttpAuthority
// ---------------------------------------------------------------------------

/// reqwest-backed authority. The cookie store carries the session the
/// server uses to tell players apart.
pub struct HttpAuthority {
    http: reqwest::Client,
    base: Url,
}

impl HttpAuthority {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base })
    }

    fn url(&self, path: &str) -> Result<Url, AuthorityError> {
        self.base.join(path).map_err(|e| AuthorityError::Decode {
            path: path.to_string(),
            message: format!("bad request path: {e}"),
        })
    }

    async fn send(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
        requested: &Url,
    ) -> Result<RawReply, AuthorityError> {
        let response = request.send().await.map_err(|source| AuthorityError::Request {
            path: path.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        let redirected_to = (response.url() != requested).then(|| response.url().to_string());
        let body = response.text().await.map_err(|source| AuthorityError::Request {
            path: path.to_string(),
            source,
        })?;

        debug!(path, status, redirected = redirected_to.is_some(), "authority reply");
        Ok(RawReply {
            status,
            redirected_to,
            body,
        })
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<Reply<T>, AuthorityError> {
        let url = self.url(path)?;
        let raw = self.send(path, self.http.post(url.clone()), &url).await?;
        raw.interpret(path)
    }
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn fetch_state(&self) -> Result<StateResponse, AuthorityError> {
        let path = "/state";
        let url = self.url(path)?;
        // The error bodies arrive with HTTP 400, so the status is ignored.
        let raw = self.send(path, self.http.get(url.clone()), &url).await?;
        serde_json::from_str(&raw.body).map_err(|e| AuthorityError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn play(&self, request: &PlayRequest) -> Result<Reply<()>, AuthorityError> {
        let path = "/play";
        let url = self.url(path)?;
        let raw = self
            .send(path, self.http.post(url.clone()).json(request), &url)
            .await?;
        Ok(raw.interpret::<IgnoredAny>(path)?.map(|_| ()))
    }

    async fn end_round(&self) -> Result<Reply<()>, AuthorityError> {
        Ok(self.post_empty::<IgnoredAny>("/end-round").await?.map(|_| ()))
    }

    async fn ready_next_round(&self) -> Result<Reply<ReadyResponse>, AuthorityError> {
        self.post_empty("/ready-next-round").await
    }

    async fn delete_room(&self, room: &str) -> Result<Reply<()>, AuthorityError> {
        let path = format!("/delete-room/{room}");
        let url = self.url(&path)?;
        let raw = self.send(&path, self.http.post(url.clone()), &url).await?;
        // The only meaningful answer is the redirect; any body is ignored.
        Ok(match raw.redirected_to {
            Some(location) => Reply::Redirected { location },
            None if raw.is_success() => Reply::Accepted(()),
            None => Reply::Rejected(None),
        })
    }

    async fn join_room(&self, room: &str, name: &str) -> Result<Reply<()>, AuthorityError> {
        let path = "/join-room";
        let url = self.url(path)?;
        let form = [("room", room), ("name", name)];
        let raw = self
            .send(path, self.http.post(url.clone()).form(&form), &url)
            .await?;
        Ok(match raw.redirected_to {
            Some(location) => Reply::Redirected { location },
            None if raw.is_success() => Reply::Accepted(()),
            None => Reply::Rejected(None),
        })
    }

    async fn toggle_lobby_ready(
        &self,
        room: &str,
    ) -> Result<Reply<LobbyReadyResponse>, AuthorityError> {
        self.post_empty(&format!("/toggle-ready/{room}")).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
