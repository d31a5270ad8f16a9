//! Counter coverage for the notification link.

#[path = "../helpers/mod.rs"]
mod helpers;

use bugsnag_link::config::{LinkSettings, LOGGING_ENV};
use bugsnag_link::message::NOTIFY_KEY;
use bugsnag_link::notification::test_utils::FakeNotifier;
use bugsnag_link::{Level, Message, Meta};
use helpers::test_metrics::TestMetrics;
use helpers::{create_link, token_settings};

#[test]
fn test_every_filtered_message_counts_as_skipped() {
    let metrics = TestMetrics::new();
    let (link, fake, env) = create_link(token_settings(Some(true)));
    let (inert, _, _) = create_link(LinkSettings::default());

    metrics::with_local_recorder(&metrics, || {
        // Not ready.
        inert.handle(Some(&Message::new(Level::Error, "x"))).unwrap();
        // Absent message.
        link.handle(None).unwrap();
        // Below error level.
        link.handle(Some(&Message::new(Level::Warn, "x"))).unwrap();
        // Overridden.
        link.handle(Some(
            &Message::new(Level::Error, "x").with_meta(Meta::new().with(NOTIFY_KEY, false)),
        ))
        .unwrap();
        // Disabled.
        env.set(LOGGING_ENV, "false");
        link.handle(Some(&Message::new(Level::Error, "x"))).unwrap();
        env.remove(LOGGING_ENV);

        link.handle(Some(&Message::new(Level::Error, "x"))).unwrap();
    });

    assert_eq!(metrics.counter("notifications_skipped_total"), 5);
    assert_eq!(metrics.counter("notifications_sent_total"), 1);
    assert_eq!(fake.notify_count(), 1);
}

#[test]
fn test_failed_sends_are_counted() {
    let metrics = TestMetrics::new();
    let fake = FakeNotifier::failing("connection reset");
    let link = bugsnag_link::NotificationLink::new(
        token_settings(Some(true)),
        std::sync::Arc::new(fake),
        std::sync::Arc::new(bugsnag_link::config::MapEnv::new()),
    );

    let result = metrics::with_local_recorder(&metrics, || {
        link.handle(Some(&Message::new(Level::Error, "x")))
    });

    assert!(result.is_err());
    assert_eq!(metrics.counter("notifications_failed_total"), 1);
    assert_eq!(metrics.counter("notifications_skipped_total"), 0);
}
