//! Navigation boundary for all page I/O.
//!
//! The crawl core only talks to a [`PageDriver`]: navigate to a URL,
//! observe the network responses triggered by the load, and read the
//! rendered markup afterwards. Response capture is modeled as a
//! bounded-lifetime subscription: subscribe before navigating, drain
//! after the settle window, drop to unsubscribe. Events arriving after
//! the drop are never delivered.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Response headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type ResponseHeaders = Vec<(String, String)>;

/// One completed network response observed during a page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    pub url: String,
    pub headers: ResponseHeaders,
    pub body: Vec<u8>,
}

impl ResponseEvent {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Decode the body as JSON. The body is kept raw until this point so
    /// that non-JSON responses cost nothing to discard.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a ResponseHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver startup failed: {0}")]
    Startup(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("markup unavailable: {0}")]
    Markup(String),

    #[cfg(test)]
    #[error("no mock page registered for {0}")]
    NoMockPage(String),
}

/// Receiving half of a response-event subscription.
///
/// Dropping it unsubscribes; the driver prunes the closed sender on its
/// next delivery attempt.
pub struct ResponseSubscription {
    receiver: mpsc::UnboundedReceiver<ResponseEvent>,
}

impl ResponseSubscription {
    /// Everything buffered so far, in delivery order.
    pub fn drain(&mut self) -> Vec<ResponseEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Driver boundary: one logical browsing session.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url`, suspending until the page load completes.
    async fn open(&self, url: &str) -> Result<(), DriverError>;

    /// Subscribe to response events delivered by subsequent navigations.
    fn subscribe(&self) -> ResponseSubscription;

    /// Fully rendered markup of the current page.
    async fn markup(&self) -> Result<String, DriverError>;
}

fn subscribe_to(listeners: &mut Vec<mpsc::UnboundedSender<ResponseEvent>>) -> ResponseSubscription {
    let (sender, receiver) = mpsc::unbounded_channel();
    listeners.push(sender);
    ResponseSubscription { receiver }
}

fn broadcast(listeners: &mut Vec<mpsc::UnboundedSender<ResponseEvent>>, event: &ResponseEvent) {
    listeners.retain(|listener| listener.send(event.clone()).is_ok());
}

#[cfg(feature = "http-driver")]
pub mod http_driver {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    /// Plain-HTTP navigation driver backed by reqwest.
    ///
    /// A degraded stand-in for a scripted browser session: `open`
    /// fetches the URL directly, delivers the single resulting response
    /// to subscribers, and keeps the body as the current markup. Against
    /// script-rendered pages the markup fallback carries the run.
    pub struct HttpDriver {
        client: reqwest::Client,
        state: Mutex<HttpDriverState>,
    }

    #[derive(Default)]
    struct HttpDriverState {
        listeners: Vec<mpsc::UnboundedSender<ResponseEvent>>,
        current_markup: String,
    }

    impl HttpDriver {
        #[must_use]
        pub fn new(client: reqwest::Client) -> Self {
            Self {
                client,
                state: Mutex::new(HttpDriverState::default()),
            }
        }

        pub fn with_timeout(timeout: StdDuration, user_agent: &str) -> Result<Self, DriverError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(user_agent)
                .build()
                .map_err(|e| DriverError::Startup(e.to_string()))?;
            Ok(Self::new(client))
        }
    }

    #[async_trait]
    impl PageDriver for HttpDriver {
        async fn open(&self, url: &str) -> Result<(), DriverError> {
            // The previous page's markup must not survive a failed
            // navigation, or the fallback path would re-parse it as
            // this page's content.
            self.state
                .lock()
                .expect("driver state lock should not be poisoned")
                .current_markup
                .clear();

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| DriverError::Navigation(e.to_string()))?;

            let final_url = response.url().to_string();
            let mut headers = ResponseHeaders::new();
            for (name, value) in response.headers() {
                headers.push((
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                ));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| DriverError::Navigation(e.to_string()))?
                .to_vec();

            let event = ResponseEvent {
                url: final_url,
                headers,
                body,
            };

            let mut state = self
                .state
                .lock()
                .expect("driver state lock should not be poisoned");
            state.current_markup = String::from_utf8_lossy(&event.body).to_string();
            broadcast(&mut state.listeners, &event);
            Ok(())
        }

        fn subscribe(&self) -> ResponseSubscription {
            let mut state = self
                .state
                .lock()
                .expect("driver state lock should not be poisoned");
            subscribe_to(&mut state.listeners)
        }

        async fn markup(&self) -> Result<String, DriverError> {
            let state = self
                .state
                .lock()
                .expect("driver state lock should not be poisoned");
            Ok(state.current_markup.clone())
        }
    }
}

// ---------- Test-only mock driver ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// One scripted page load: the responses it triggers and the markup the
/// page renders to.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub responses: Vec<ResponseEvent>,
    pub markup: String,
}

/// In-memory mock driver.
///
/// Designed for unit tests: no sockets, no browser process.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockDriver {
    inner: Arc<Mutex<MockDriverInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockDriverInner {
    pages: HashMap<String, VecDeque<MockPage>>,
    listeners: Vec<mpsc::UnboundedSender<ResponseEvent>>,
    current_markup: String,
    opened: Vec<String>,
}

#[cfg(test)]
impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page load for a URL.
    ///
    /// If multiple pages are registered for the same URL, they are
    /// consumed in FIFO order.
    pub fn push_page(&self, url: impl Into<String>, page: MockPage) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock driver lock should not be poisoned");
        inner.pages.entry(url.into()).or_default().push_back(page);
    }

    /// URLs navigated to, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        let inner = self
            .inner
            .lock()
            .expect("mock driver lock should not be poisoned");
        inner.opened.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl PageDriver for MockDriver {
    async fn open(&self, url: &str) -> Result<(), DriverError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock driver lock should not be poisoned");
        inner.opened.push(url.to_string());

        let Some(page) = inner.pages.get_mut(url).and_then(|q| q.pop_front()) else {
            inner.current_markup.clear();
            return Err(DriverError::NoMockPage(url.to_string()));
        };

        inner.current_markup = page.markup;
        for event in &page.responses {
            broadcast(&mut inner.listeners, event);
        }
        Ok(())
    }

    fn subscribe(&self) -> ResponseSubscription {
        let mut inner = self
            .inner
            .lock()
            .expect("mock driver lock should not be poisoned");
        subscribe_to(&mut inner.listeners)
    }

    async fn markup(&self) -> Result<String, DriverError> {
        let inner = self
            .inner
            .lock()
            .expect("mock driver lock should not be poisoned");
        Ok(inner.current_markup.clone())
    }
}
