//! In-memory fakes for the network edges, used by unit tests.

use crate::http::{FetchError, HttpFetch, Page};
use crate::sink::{MessageId, MessageSink, OutgoingMessage, SendError};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// [`HttpFetch`] serving canned bodies by URL.
///
/// Unknown URLs answer HTTP 404. Every requested URL is recorded.
#[derive(Debug, Default)]
pub struct FakeHttp {
    pages: HashMap<String, Result<Page, u16>>,
    requested: RefCell<Vec<String>>,
}

impl FakeHttp {
    /// Serve `body` for `url` with no redirect.
    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Ok(Page {
                url: url.to_string(),
                body: body.to_string(),
            }),
        );
        self
    }

    /// Serve `body` for `url` as if the request was redirected to `final_url`.
    pub fn redirect(mut self, url: &str, final_url: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Ok(Page {
                url: final_url.to_string(),
                body: body.to_string(),
            }),
        );
        self
    }

    /// Answer `url` with an error status.
    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Err(status));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl HttpFetch for FakeHttp {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        self.requested.borrow_mut().push(url.to_string());
        match self.pages.get(url) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// [`MessageSink`] that records deliveries and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    failures: RefCell<VecDeque<SendError>>,
    fail_containing: RefCell<Option<String>>,
    attempts: Cell<usize>,
    sent: RefCell<Vec<OutgoingMessage>>,
}

impl RecordingSink {
    /// Fail the next attempt with `e`. Calls queue up.
    pub fn fail_next(&self, e: SendError) {
        self.failures.borrow_mut().push_back(e);
    }

    /// Reject every message whose text contains `needle`.
    pub fn fail_containing(&self, needle: &str) {
        *self.fail_containing.borrow_mut() = Some(needle.to_string());
    }

    pub fn attempts(&self) -> usize {
        self.attempts.get()
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.borrow().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.borrow().iter().map(|m| m.text.clone()).collect()
    }
}

impl MessageSink for RecordingSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<MessageId, SendError> {
        self.attempts.set(self.attempts.get() + 1);
        if let Some(e) = self.failures.borrow_mut().pop_front() {
            return Err(e);
        }
        if let Some(needle) = self.fail_containing.borrow().as_deref() {
            if message.text.contains(needle) {
                return Err(SendError::Api {
                    code: 400,
                    description: format!("rejected message containing {needle}"),
                    retry_after: None,
                });
            }
        }
        let mut sent = self.sent.borrow_mut();
        sent.push(message.clone());
        Ok(sent.len() as MessageId)
    }
}
