//! Crate-level tests for the credential lifecycle.

mod behaviour;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::error::CredentialError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Transport that answers token requests and API calls from separate scripts
/// and counts both.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    api_statuses: RefCell<VecDeque<u16>>,
    token_status: Cell<u16>,
    api_calls: Cell<usize>,
    token_calls: Cell<usize>,
}

impl ScriptedTransport {
    pub(crate) fn new(token_status: u16) -> Self {
        let transport = Self::default();
        transport.token_status.set(token_status);
        transport
    }

    pub(crate) fn push_api_status(&self, status: u16) {
        self.api_statuses.borrow_mut().push_back(status);
    }

    pub(crate) fn api_calls(&self) -> usize {
        self.api_calls.get()
    }

    pub(crate) fn token_calls(&self) -> usize {
        self.token_calls.get()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, CredentialError> {
        if request.form_value("grant_type").is_some() {
            self.token_calls.set(self.token_calls.get() + 1);
            let counter = self.token_calls.get();
            return Ok(HttpResponse::new(
                self.token_status.get(),
                format!(r#"{{"access_token":"token-{counter}"}}"#),
            ));
        }
        self.api_calls.set(self.api_calls.get() + 1);
        let status = self.api_statuses.borrow_mut().pop_front().unwrap_or(401);
        Ok(HttpResponse::new(status, format!("status {status}")))
    }
}
