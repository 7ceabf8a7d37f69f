//! Shared fixtures for the template plugin tests.


use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::rc::Rc;

use rise_auth::{
    CredentialError, CredentialManager, HttpRequest, HttpResponse, HttpTransport,
    MemoryCredentialStore, OAuthSettings, PendingAuthorization,
};
use rise_config::PluginPaths;
use rise_plugin::{DiscardPartials, PartialMessage, ResponseEnvelope, Session, ToolCall};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use crate::{CredentialBackend, PLUGIN_NAME, TemplatePlugin, registry};

pub(crate) const PROVIDER: &str = "https://accounts.example.com";

/// Requests seen by the fake API and the responses it still has to give.
#[derive(Debug, Default)]
pub(crate) struct ApiScript {
    pub(crate) responses: VecDeque<HttpResponse>,
    pub(crate) requests: Vec<HttpRequest>,
}

/// Backend whose transport answers from an [`ApiScript`].
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBackend {
    pub(crate) api: Rc<RefCell<ApiScript>>,
}

pub(crate) struct FakeTransport {
    api: Rc<RefCell<ApiScript>>,
}

impl HttpTransport for FakeTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, CredentialError> {
        let mut api = self.api.borrow_mut();
        api.requests.push(request.clone());
        if request.form_value("grant_type").is_some() {
            return Ok(HttpResponse::new(
                200,
                r#"{"access_token":"a1","refresh_token":"r1"}"#,
            ));
        }
        Ok(api
            .responses
            .pop_front()
            .unwrap_or_else(|| HttpResponse::new(200, r#"{"ok":true}"#)))
    }
}

impl CredentialBackend for FakeBackend {
    type Transport = FakeTransport;
    type Store = MemoryCredentialStore;

    fn connect(
        &self,
        settings: OAuthSettings,
        paths: &PluginPaths,
    ) -> Result<CredentialManager<Self::Transport, Self::Store>, CredentialError> {
        let transport = FakeTransport {
            api: Rc::clone(&self.api),
        };
        Ok(
            CredentialManager::new(settings, transport, MemoryCredentialStore::new())
                .with_pending_authorization(PendingAuthorization::new(paths.pending_auth_path())),
        )
    }
}

/// A session over a temporary plugin directory.
pub(crate) struct Harness {
    _dir: TempDir,
    pub(crate) backend: FakeBackend,
    pub(crate) session: Session<TemplatePlugin<FakeBackend>>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let paths = PluginPaths::new(dir.path(), PLUGIN_NAME).expect("valid plugin name");
        let backend = FakeBackend::default();
        let plugin = TemplatePlugin::new(paths, backend.clone());
        let session = Session::new(plugin, registry().expect("handlers register"));
        Self {
            _dir: dir,
            backend,
            session,
        }
    }

    fn paths(&self) -> &PluginPaths {
        self.session.state().paths()
    }

    fn write_json(&self, path: &std::path::Path, value: &Value) {
        fs::create_dir_all(self.paths().plugin_dir()).expect("create plugin dir");
        fs::write(path, value.to_string()).expect("write file");
    }

    pub(crate) fn write_oauth_config(&self) {
        self.write_json(
            self.paths().config_path(),
            &json!({
                "client_id": "client-123",
                "client_secret": "secret-456",
                "authorize_url": format!("{PROVIDER}/authorize"),
                "token_url": format!("{PROVIDER}/api/token"),
                "redirect_uri": "http://localhost:8888/callback",
                "scope": "user-read-private",
                "api_base_url": format!("{PROVIDER}/v1")
            }),
        );
    }

    pub(crate) fn write_pending_callback(&self, url: &str) {
        self.write_json(self.paths().pending_auth_path(), &json!({"auth_url": url}));
    }

    pub(crate) fn queue_api_response(&self, status: u16, body: &str) {
        self.backend
            .api
            .borrow_mut()
            .responses
            .push_back(HttpResponse::new(status, body));
    }

    pub(crate) fn api_requests(&self) -> Vec<HttpRequest> {
        self.backend.api.borrow().requests.clone()
    }

    pub(crate) fn call(&mut self, func: &str, params: Value) -> ResponseEnvelope {
        self.session
            .dispatch_call(&tool_call(func, params), &mut DiscardPartials)
    }

    pub(crate) fn call_streaming(
        &mut self,
        func: &str,
        params: Value,
    ) -> (ResponseEnvelope, Vec<PartialMessage>) {
        let mut partials: Vec<PartialMessage> = Vec::new();
        let response = self
            .session
            .dispatch_call(&tool_call(func, params), &mut partials);
        (response, partials)
    }
}

pub(crate) fn tool_call(func: &str, params: Value) -> ToolCall {
    let object = match params {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ToolCall::new(func).with_params(object)
}
