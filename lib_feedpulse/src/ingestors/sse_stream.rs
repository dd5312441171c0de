//! # SSE Push Connector
//!
//! Opens `GET {base}/{events_path}?token=<credential>` with
//! `Accept: text/event-stream` and pumps decoded frames into the handle.
//!
//! The pump task is bound to the handle: it stops as soon as the handle is
//! closed, and closes the handle itself when the server ends the stream or
//! the transport fails. Nothing is retried here; a new connection is opened
//! only by the next credential transition.

use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Url};

use crate::core::connection::ConnectionHandle;
use crate::core::settings::StreamSettings;
use crate::error::{RetrieveError, StreamError};
use crate::ingestors::sse_codec::SseDecoder;
use crate::models::Credential;
use crate::ports::Connector;

pub struct SseConnector {
    client: Client,
    events_url: Url,
    capacity: usize,
}

impl SseConnector {
    pub fn new(settings: &StreamSettings) -> Result<Self, RetrieveError> {
        let events_url = Url::parse(&settings.base_url)?.join(&settings.events_path)?;
        // No request timeout: the stream is meant to stay open.
        let client = Client::builder()
            .user_agent(concat!("feedpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            events_url,
            capacity: settings.channel_capacity,
        })
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }

    fn url_for(&self, credential: &Credential) -> Url {
        let mut url = self.events_url.clone();
        url.query_pairs_mut().append_pair("token", credential.as_str());
        url
    }
}

impl Connector for SseConnector {
    fn open(&self, credential: &Credential) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(self.events_url.as_str(), self.capacity));

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(pump(self.client.clone(), self.url_for(credential), Arc::clone(&handle)));
            }
            Err(err) => {
                log::error!("Cannot open push connection outside a runtime: {err}");
                handle.close();
            }
        }
        handle
    }
}

async fn pump(client: Client, url: Url, handle: Arc<ConnectionHandle>) {
    let result = tokio::select! {
        biased;
        _ = handle.closed() => return,
        result = stream_events(&client, url, &handle) => result,
    };

    match result {
        Ok(()) => log::info!("Push connection #{} ended by the server.", handle.id()),
        Err(err) => log::error!("Push connection #{} failed: {err}", handle.id()),
    }
    handle.close();
}

async fn stream_events(client: &Client, url: Url, handle: &ConnectionHandle) -> Result<(), StreamError> {
    // reqwest errors carry the URL, and the URL carries the token.
    let transport = |err: reqwest::Error| StreamError::Transport(err.without_url().to_string());

    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::Transport(format!("server answered {status}")));
    }
    log::debug!("Push connection #{} established.", handle.id());

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(transport)?;
        for frame in decoder.feed(&chunk) {
            log::trace!("Connection #{}: '{}' frame ({} bytes).", handle.id(), frame.event, frame.data.len());
            handle.dispatch(frame);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_goes_into_the_query() {
        let settings = StreamSettings {
            base_url: "https://reader.example/app/".into(),
            ..Default::default()
        };
        let connector = SseConnector::new(&settings).unwrap();
        assert_eq!(connector.events_url().as_str(), "https://reader.example/app/api/v2/events");
        assert_eq!(
            connector.url_for(&Credential::from("a b&c")).as_str(),
            "https://reader.example/app/api/v2/events?token=a+b%26c"
        );
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let settings = StreamSettings {
            base_url: "reader.example".into(),
            ..Default::default()
        };
        assert!(matches!(SseConnector::new(&settings), Err(RetrieveError::InvalidBaseUrl(_))));
    }

    #[test]
    fn open_outside_runtime_yields_closed_handle() {
        let connector = SseConnector::new(&StreamSettings::default()).unwrap();
        let handle = connector.open(&Credential::from("abc"));
        assert!(!handle.is_open());
        assert!(!handle.endpoint().contains("abc"));
    }
}
