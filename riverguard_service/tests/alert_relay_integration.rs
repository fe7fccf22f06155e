//! Alert relay tests against a mock sheet script.
//!
//! Run with: cargo test --test alert_relay_integration

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use riverguard_service::alert::notifier::{AlertNotifier, DispatchState, RecipientSet};
use riverguard_service::config::RelayMode;
use riverguard_service::model::MonitorError;

fn recipients() -> RecipientSet {
    RecipientSet::from_list(["ops@example.com", "warden@example.com"]).expect("valid recipients")
}

async fn notifier(server: &MockServer, mode: RelayMode) -> AlertNotifier {
    AlertNotifier::new(reqwest::Client::new(), format!("{}/exec", server.uri()), mode)
}

#[tokio::test]
async fn test_one_post_carries_every_recipient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exec"))
        .and(body_json(json!({
            "action": "manual_alert",
            "emails": ["ops@example.com", "warden@example.com"],
            "message": "Water over the bank"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "sentTo": ["ops@example.com", "warden@example.com"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let notifier = notifier(&server, RelayMode::ReadResponse).await;
    let receipt = notifier
        .dispatch(&recipients(), "Water over the bank")
        .await
        .expect("relay accepts");

    assert_eq!(receipt.recipients, 2);
    assert_eq!(
        receipt.confirmed,
        Some(vec!["ops@example.com".to_string(), "warden@example.com".to_string()])
    );
    assert_eq!(notifier.state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_empty_recipient_set_never_reaches_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let notifier = notifier(&server, RelayMode::ReadResponse).await;
    let result = notifier.dispatch(&RecipientSet::new(), "msg").await;
    assert_eq!(result, Err(MonitorError::NoRecipients));
}

#[tokio::test]
async fn test_fire_and_forget_accepts_any_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exec"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = notifier(&server, RelayMode::FireAndForget).await;
    let receipt = notifier.dispatch(&recipients(), "msg").await.expect("any response counts");
    assert_eq!(receipt.confirmed, None);
    assert_eq!(notifier.state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_read_response_rejects_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exec"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let notifier = notifier(&server, RelayMode::ReadResponse).await;
    let result = notifier.dispatch(&recipients(), "msg").await;
    assert!(matches!(result, Err(MonitorError::Dispatch(_))), "got {:?}", result);
    assert_eq!(notifier.state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_unreadable_confirmation_still_counts_as_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exec"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Alerts queued"))
        .mount(&server)
        .await;

    let notifier = notifier(&server, RelayMode::ReadResponse).await;
    let receipt = notifier.dispatch(&recipients(), "msg").await.expect("2xx is accepted");
    assert_eq!(receipt.confirmed, None);
}
