//! Integration tests for the direct-notify adapter.

#[path = "../helpers/mod.rs"]
mod helpers;

use bugsnag_link::config::{LinkSettings, MapEnv, LOGGING_ENV, MIN_LOG_LEVEL_LINK_ENV};
use bugsnag_link::message::{Location, MessageFactory};
use bugsnag_link::notification::test_utils::FakeNotifier;
use bugsnag_link::notification::RequestContext;
use bugsnag_link::{setup, ErrorValue, Meta, NotifierAdapter, Payload, Pipeline};
use helpers::token_settings;
use std::sync::Arc;

fn create_adapter(
    settings: LinkSettings,
    fake: &FakeNotifier,
) -> (NotifierAdapter, Arc<MapEnv>) {
    let env = Arc::new(MapEnv::new());
    let adapter = NotifierAdapter::new(
        &Pipeline::new(),
        settings,
        Arc::new(fake.clone()),
        env.clone(),
    );
    (adapter, env)
}

#[test]
fn test_notify_none_makes_no_call() {
    let fake = FakeNotifier::new();
    let (adapter, _env) = create_adapter(token_settings(Some(true)), &fake);

    adapter.notify(None::<Payload>, [Meta::new().with("user", "u-1")]).unwrap();

    assert_eq!(fake.notify_count(), 0);
}

#[test]
fn test_notify_text_sends_error_level_message() {
    let fake = FakeNotifier::new();
    let (adapter, _env) = create_adapter(token_settings(None), &fake);

    adapter
        .notify(
            Payload::from("payment declined"),
            [
                Meta::new().with("order", "o-17"),
                Meta::new().with("amount", 1200i64),
            ],
        )
        .unwrap();

    let notifications = fake.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0].0,
        Payload::Text("payment declined".to_string())
    );
    let user = &notifications[0].1.user;
    assert_eq!(user.get("order").and_then(|v| v.as_str()), Some("o-17"));
    assert!(user.contains_key("amount"));
}

#[test]
fn test_notify_error_sends_the_error() {
    let fake = FakeNotifier::new();
    let (adapter, _env) = create_adapter(token_settings(Some(true)), &fake);
    let error = ErrorValue::new("socket closed").with_stack("at read");

    adapter.notify(Payload::from(error.clone()), []).unwrap();

    assert_eq!(fake.notifications()[0].0, Payload::Error(error));
}

#[test]
fn test_adapter_respects_enablement() {
    let fake = FakeNotifier::new();
    let (adapter, env) = create_adapter(token_settings(Some(true)), &fake);

    env.set(LOGGING_ENV, "false");
    adapter.notify(Payload::from("x"), []).unwrap();
    assert_eq!(fake.notify_count(), 0);

    env.remove(LOGGING_ENV);
    adapter.notify(Payload::from("x"), []).unwrap();
    assert_eq!(fake.notify_count(), 1);
}

#[test]
fn test_adapter_bypasses_stage_min_level() {
    let fake = FakeNotifier::new();
    let (adapter, env) = create_adapter(token_settings(Some(true)), &fake);
    env.set(MIN_LOG_LEVEL_LINK_ENV, "error");

    adapter.notify(Payload::from("x"), []).unwrap();

    assert_eq!(fake.notify_count(), 1);
}

#[test]
fn test_adapter_without_token_does_nothing() {
    let fake = FakeNotifier::instrumented();
    let (adapter, _env) = create_adapter(LinkSettings::default(), &fake);

    adapter.notify(Payload::from("x"), []).unwrap();

    assert_eq!(fake.notify_count(), 0);
    assert!(adapter.request_handler().is_none());
    assert!(adapter.error_handler().is_none());
}

#[test]
fn test_handlers_require_an_instrumented_client() {
    let plain = FakeNotifier::new();
    let (adapter, _env) = create_adapter(token_settings(None), &plain);
    assert!(adapter.request_handler().is_none());
    assert!(adapter.error_handler().is_none());

    let instrumented = FakeNotifier::instrumented();
    let (adapter, _env) = create_adapter(token_settings(None), &instrumented);
    let request = RequestContext::new("GET", "/orders");

    adapter.request_handler().expect("request handler")(&request);
    adapter.error_handler().expect("error handler")(&request, &ErrorValue::new("boom"));

    assert_eq!(
        instrumented.hook_calls(),
        vec!["request /orders".to_string(), "error /orders boom".to_string()]
    );
}

#[test]
fn test_adapter_uses_pipeline_factory_location() {
    let fake = FakeNotifier::new();
    let pipeline = Pipeline::with_factory(MessageFactory::with_location(Location {
        project: Some("shop".into()),
        module: None,
        function: None,
    }));
    let adapter = NotifierAdapter::new(
        &pipeline,
        token_settings(Some(true)),
        Arc::new(fake.clone()),
        Arc::new(MapEnv::new()),
    );

    adapter.notify(Payload::from("x"), []).unwrap();

    assert_eq!(
        fake.notifications()[0].0,
        Payload::Text("[shop] x".to_string())
    );
}

#[test]
fn test_setup_builds_adapter_from_env_token() {
    let fake = FakeNotifier::new();
    let env = Arc::new(MapEnv::new().with("BUGS_TOKEN", "env-token"));
    let link_setup = setup(LinkSettings::default(), env.as_ref());
    let adapter = link_setup.adapter(&Pipeline::new(), Arc::new(fake.clone()), env.clone());

    assert_eq!(link_setup.adapter_name, NotifierAdapter::NAME);
    assert!(adapter.link().is_ready());
    assert_eq!(fake.registrations()[0].0, "env-token");
}
