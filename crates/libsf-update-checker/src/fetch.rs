// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io::{self, Read},
    sync::Arc,
    thread,
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::{
    Config, Error, FeedKind, ParsedFeed, Result,
    config::{CONNECT_TIMEOUT, REQUEST_TIMEOUT},
    feed::{self, FeedDecoder},
};

const CHUNK_SIZE: usize = 16 * 1024;

/// response handed back by a [`Transport`].
pub struct TransportResponse {
    pub status: u16,
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// issues GET requests for feed documents.
///
/// implementations block until response headers are available; the body is
/// read afterwards in chunks.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// blocking reqwest client with the configured user agent and timeouts.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<TransportResponse> {
        log::debug!(target: "fetch", "GET {url}");
        let response = self.client.get(url).send()?;
        Ok(TransportResponse::new(response.status().as_u16(), response))
    }
}

/// notification emitted when a fetch pass ends.
#[derive(Debug)]
pub enum FeedEvent {
    Finished { kind: FeedKind, feed: ParsedFeed },
    Failed { kind: FeedKind, error: Error },
}

impl FeedEvent {
    pub fn kind(&self) -> FeedKind {
        match self {
            Self::Finished { kind, .. } | Self::Failed { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    generation: u64,
    in_flight: bool,
}

/// fetches one feed, keeping at most one request in flight.
///
/// a new [`fetch`](Self::fetch) supersedes the outstanding request; whatever the
/// superseded request receives afterwards is dropped without touching a parser
/// or emitting an event.
pub struct FetchController {
    kind: FeedKind,
    config: Config,
    transport: Arc<dyn Transport>,
    events: Sender<FeedEvent>,
    state: Arc<Mutex<ControllerState>>,
}

impl FetchController {
    pub fn new(
        kind: FeedKind,
        config: Config,
        transport: Arc<dyn Transport>,
        events: Sender<FeedEvent>,
    ) -> Self {
        Self {
            kind,
            config,
            transport,
            events,
            state: Arc::new(Mutex::new(ControllerState::default())),
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// fetches the configured url of this controller's feed.
    pub fn fetch_default(&self) -> bool {
        self.fetch(&self.config.feed_url(self.kind))
    }

    /// cancels any outstanding request and starts fetching `url`.
    ///
    /// returns false without issuing a request when `url` is not an absolute
    /// http(s) url; no event is emitted in that case.
    pub fn fetch(&self, url: &str) -> bool {
        let valid = match validate_url(url) {
            Ok(()) => true,
            Err(e) => {
                log::debug!(target: "fetch", "not fetching {} feed: {e}", self.kind);
                false
            }
        };

        let generation = {
            let mut state = self.state.lock();
            if state.in_flight {
                log::debug!(target: "fetch", "cancelling outstanding {} request", self.kind);
            }
            state.generation += 1;
            state.in_flight = valid;
            state.generation
        };

        if !valid {
            return false;
        }

        let request = Request {
            kind: self.kind,
            url: url.to_string(),
            generation,
            state: Arc::clone(&self.state),
            transport: Arc::clone(&self.transport),
            events: self.events.clone(),
        };
        let decoder = feed::decoder(self.kind, &self.config);

        let spawned = thread::Builder::new()
            .name(format!("fetch-{}", self.kind))
            .spawn(move || request.run(decoder));

        if let Err(e) = spawned {
            log::warn!(target: "fetch", "failed to start {} request: {e}", self.kind);
            let mut state = self.state.lock();
            if state.generation == generation {
                state.in_flight = false;
                let _ = self.events.send(FeedEvent::Failed {
                    kind: self.kind,
                    error: Error::Io(e),
                });
            }
        }

        true
    }

    /// drops the outstanding request, if any, without starting a new one.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }
}

impl Drop for FetchController {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::invalid_url("empty url"));
    }

    let parsed = reqwest::Url::parse(url).map_err(|e| Error::invalid_url(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::invalid_url(format!(
            "{url}: unsupported scheme {scheme}"
        ))),
    }
}

/// one issued request, run on its own thread.
struct Request {
    kind: FeedKind,
    url: String,
    generation: u64,
    state: Arc<Mutex<ControllerState>>,
    transport: Arc<dyn Transport>,
    events: Sender<FeedEvent>,
}

impl Request {
    fn is_current(&self) -> bool {
        self.state.lock().generation == self.generation
    }

    fn run(self, decoder: Box<dyn FeedDecoder>) {
        let Some(outcome) = self.perform(decoder) else {
            log::debug!(target: "fetch", "discarding superseded {} response", self.kind);
            return;
        };

        // checked under the lock so a concurrent fetch() cannot slip in between
        let mut state = self.state.lock();
        if state.generation != self.generation {
            log::debug!(target: "fetch", "discarding superseded {} response", self.kind);
            return;
        }
        state.in_flight = false;

        let event = match outcome {
            Ok(feed) => {
                log::debug!(
                    target: "fetch",
                    "{} feed parsed: {} release(s), {:?}",
                    self.kind,
                    feed.releases.len(),
                    feed.status
                );
                FeedEvent::Finished {
                    kind: self.kind,
                    feed,
                }
            }
            Err(error) => {
                log::warn!(target: "fetch", "{} feed failed: {error}", self.kind);
                FeedEvent::Failed {
                    kind: self.kind,
                    error,
                }
            }
        };

        if self.events.send(event).is_err() {
            log::debug!(target: "fetch", "no receiver for {} feed event", self.kind);
        }
    }

    /// returns `None` once the request has been superseded.
    fn perform(&self, mut decoder: Box<dyn FeedDecoder>) -> Option<Result<ParsedFeed>> {
        let response = match self.transport.get(&self.url) {
            Ok(response) => response,
            Err(e) => return Some(Err(e)),
        };

        if !self.is_current() {
            return None;
        }

        if !response.is_success() {
            return Some(Err(Error::HttpStatus(response.status)));
        }

        let mut body = response.body;
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if !self.is_current() {
                        return None;
                    }
                    decoder.feed(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!(target: "fetch", "{} response ended early: {e}", self.kind);
                    break;
                }
            }
        }

        if !self.is_current() {
            return None;
        }

        Some(decoder.finish())
    }
}
