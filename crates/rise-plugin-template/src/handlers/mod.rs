//! Command handlers registered by the template plugin.

use rise_auth::{Authorization, HttpMethod, HttpRequest, ensure_success};
use rise_plugin::{
    HandlerContext, HandlerError, HandlerRegistry, HandlerResult, RegistryError, ResponseEnvelope,
};
use serde_json::Value;
use tracing::info;

use crate::backend::CredentialBackend;
use crate::plugin::{PLUGIN_TARGET, TemplatePlugin};

/// Lists the parameters it was called with.
pub const ECHO: &str = "echo";
/// Streams the prompt back one word per partial frame.
pub const STREAM_ECHO: &str = "stream_echo";
/// Completes authorisation from a pasted callback URL.
pub const AUTHORIZE: &str = "authorize";
/// Discards stored tokens and asks for fresh consent.
pub const REAUTHORIZE: &str = "reauthorize";
/// Calls the configured API with the bearer token attached.
pub const API_REQUEST: &str = "api_request";

/// Builds the handler registry for the template plugin.
///
/// # Errors
///
/// Returns a [`RegistryError`] when a handler name collides.
pub fn registry<B>() -> Result<HandlerRegistry<TemplatePlugin<B>>, RegistryError>
where
    B: CredentialBackend + 'static,
{
    HandlerRegistry::new()
        .with(ECHO, echo::<B>)?
        .with(STREAM_ECHO, stream_echo::<B>)?
        .with(AUTHORIZE, authorize::<B>)?
        .with(REAUTHORIZE, reauthorize::<B>)?
        .with(API_REQUEST, api_request::<B>)
}

fn echo<B: CredentialBackend>(
    _plugin: &mut TemplatePlugin<B>,
    ctx: &mut HandlerContext<'_>,
) -> HandlerResult {
    let lines: Vec<String> = std::iter::once(String::from("Echo received."))
        .chain(
            ctx.params()
                .iter()
                .map(|(key, value)| format!("params[{key}] = {value}")),
        )
        .collect();
    Ok(ResponseEnvelope::success(lines.join("\n")))
}

fn stream_echo<B: CredentialBackend>(
    _plugin: &mut TemplatePlugin<B>,
    ctx: &mut HandlerContext<'_>,
) -> HandlerResult {
    let prompt = ctx
        .optional_str("prompt")
        .or_else(|| ctx.last_user_message())
        .map(str::to_owned)
        .ok_or_else(|| HandlerError::invalid_params("'prompt' is required"))?;
    for word in prompt.split_whitespace() {
        ctx.stream(word);
    }
    Ok(ResponseEnvelope::success(prompt))
}

fn authorize<B: CredentialBackend>(
    plugin: &mut TemplatePlugin<B>,
    ctx: &mut HandlerContext<'_>,
) -> HandlerResult {
    let callback_url = ctx.required_str("callback_url")?;
    plugin
        .credentials_mut()?
        .complete_authorization(callback_url)?;
    info!(target: PLUGIN_TARGET, "authorized through callback URL");
    Ok(ResponseEnvelope::success("Authorization complete"))
}

fn reauthorize<B: CredentialBackend>(
    plugin: &mut TemplatePlugin<B>,
    _ctx: &mut HandlerContext<'_>,
) -> HandlerResult {
    match plugin.credentials_mut()?.reauthorize()? {
        Authorization::Authorized => Ok(ResponseEnvelope::success("Already authorized")),
        Authorization::NeedsUserAction {
            message,
            authorization_url,
        } => Ok(ResponseEnvelope::success(message)
            .with_extra("authorization_url", Value::String(authorization_url))),
    }
}

fn api_request<B: CredentialBackend>(
    plugin: &mut TemplatePlugin<B>,
    ctx: &mut HandlerContext<'_>,
) -> HandlerResult {
    let method = match ctx.optional_str("method") {
        Some(raw) => raw.parse::<HttpMethod>().map_err(|_| {
            HandlerError::invalid_params(format!(
                "'method' must be one of GET, POST, PUT, PATCH or DELETE, not '{raw}'"
            ))
        })?,
        None => HttpMethod::Get,
    };
    let path = ctx.required_str("path")?;
    let manager = plugin.credentials_mut()?;

    let mut request = HttpRequest::new(method, manager.api_url(path));
    if let Some(body) = ctx.params().get("body").filter(|body| !body.is_null()) {
        request = request.with_json(body.clone());
    }

    let response = ensure_success(manager.call_authenticated(&request)?)?;
    let mut envelope = ResponseEnvelope::success(response.body.clone())
        .with_extra("status", Value::from(response.status));
    if let Ok(data) = response.json::<Value>() {
        envelope = envelope.with_extra("data", data);
    }
    Ok(envelope)
}
