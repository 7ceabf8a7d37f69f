//! Behaviour-driven tests for refresh-and-retry.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use super::ScriptedTransport;
use crate::error::CredentialError;
use crate::manager::{Authorization, CredentialManager};
use crate::settings::sample_settings;
use crate::store::{MemoryCredentialStore, StoredTokens};
use crate::transport::{HttpRequest, HttpResponse};

type Manager = CredentialManager<ScriptedTransport, MemoryCredentialStore>;

#[derive(Default)]
struct TestWorld {
    tokens: StoredTokens,
    token_status: u16,
    api_statuses: Vec<u16>,
    manager: Option<Manager>,
    response: Option<Result<HttpResponse, CredentialError>>,
    authorization: Option<Result<Authorization, CredentialError>>,
}

#[fixture]
fn world() -> TestWorld {
    TestWorld {
        token_status: 200,
        ..TestWorld::default()
    }
}

fn build_manager(world: &mut TestWorld) -> &mut Manager {
    let transport = ScriptedTransport::new(world.token_status);
    for status in &world.api_statuses {
        transport.push_api_status(*status);
    }
    let store = MemoryCredentialStore::with_tokens(world.tokens.clone());
    world.manager.insert(CredentialManager::new(
        sample_settings("https://accounts.example.com"),
        transport,
        store,
    ))
}

fn manager(world: &TestWorld) -> &Manager {
    world.manager.as_ref().expect("manager has not been built")
}

#[given("stored tokens with an expired access token")]
fn given_expired_tokens(world: &mut TestWorld) {
    world.tokens = StoredTokens {
        access_token: Some(String::from("expired")),
        refresh_token: Some(String::from("refresh")),
        issued_at: 1,
    };
}

#[given("no stored tokens")]
fn given_no_tokens(world: &mut TestWorld) {
    world.tokens = StoredTokens::default();
}

#[given("the token endpoint answers {status}")]
fn given_token_status(world: &mut TestWorld, status: u16) {
    world.token_status = status;
}

#[given("the API answers {status}")]
fn given_api_status(world: &mut TestWorld, status: u16) {
    world.api_statuses.push(status);
}

#[when("a protected call is made")]
fn when_protected_call(world: &mut TestWorld) {
    let request = HttpRequest::get("https://accounts.example.com/v1/me/player");
    let result = build_manager(world).call_authenticated(&request);
    world.response = Some(result);
}

#[when("authorization is ensured")]
fn when_ensure(world: &mut TestWorld) {
    let result = build_manager(world).ensure_authorized();
    world.authorization = Some(result);
}

#[then("the call returns status {status}")]
fn then_status(world: &mut TestWorld, status: u16) {
    let response = world
        .response
        .as_ref()
        .expect("no call made")
        .as_ref()
        .expect("call should return a response");
    assert_eq!(response.status, status);
}

#[then("the API was called {count} time(s)")]
fn then_api_calls(world: &mut TestWorld, count: usize) {
    assert_eq!(manager(world).transport().api_calls(), count);
}

#[then("the token endpoint was called {count} time(s)")]
fn then_token_calls(world: &mut TestWorld, count: usize) {
    assert_eq!(manager(world).transport().token_calls(), count);
}

#[then("the stored access token is {token}")]
fn then_stored_token(world: &mut TestWorld, token: String) {
    let expected = token.trim_matches('"');
    assert_eq!(
        manager(world).store().tokens().access_token(),
        Some(expected)
    );
}

#[then("the user is asked to authorize")]
fn then_needs_user(world: &mut TestWorld) {
    let outcome = world
        .authorization
        .as_ref()
        .expect("authorization not ensured")
        .as_ref()
        .expect("ensure should not fail");
    assert!(matches!(outcome, Authorization::NeedsUserAction { .. }));
}

#[scenario(path = "tests/features/credentials.feature")]
fn credential_behaviour(world: TestWorld) {
    let _ = world;
}
