//! Subscription confirmation over real HTTP.
//!
//! A small warp server stands in for the SNS `SubscribeURL` endpoint and
//! counts the GET requests it receives.

use sns_endpoint::{Delivery, NotificationServer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use warp::Filter;

const TOPIC_ARN: &str = "arn:aws:sns:us-west-2:123456789012:MyTopic";

/// Start a fake confirmation endpoint and return its address and hit counter.
fn start_confirm_endpoint() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let route = warp::get()
        .and(warp::path("confirm"))
        .and(warp::query::<std::collections::HashMap<String, String>>())
        .map({
            let hits = hits.clone();
            move |query: std::collections::HashMap<String, String>| {
                assert_eq!(query.get("Action").map(String::as_str), Some("ConfirmSubscription"));
                hits.fetch_add(1, Ordering::SeqCst);
                "<ConfirmSubscriptionResponse/>"
            }
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, hits)
}

fn confirmation_body(subscribe_url: &str) -> String {
    format!(
        r#"{{
  "Type" : "SubscriptionConfirmation",
  "MessageId" : "165545c9-2a5c-472c-8df2-7ff2be2b3b1b",
  "Token" : "2336412f37",
  "TopicArn" : "{TOPIC_ARN}",
  "Message" : "You have chosen to subscribe to the topic {TOPIC_ARN}.",
  "SubscribeURL" : "{subscribe_url}",
  "Timestamp" : "2012-04-26T20:45:04.751Z"
}}"#
    )
}

#[tokio::test]
async fn test_confirmation_visits_subscribe_url_once() {
    let (confirm_addr, hits) = start_confirm_endpoint();

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
    let mut server = NotificationServer::new();
    server.add_topic(TOPIC_ARN, "/hooks/sns", tx);
    let server = server.start("127.0.0.1:0").await.expect("Failed to start server");

    let subscribe_url = format!(
        "http://{confirm_addr}/confirm?Action=ConfirmSubscription&TopicArn={TOPIC_ARN}&Token=2336412f37"
    );
    let response = reqwest::Client::new()
        .post(format!("{}/hooks/sns", server.base_url()))
        .header("x-amz-sns-message-type", "SubscriptionConfirmation")
        .header("x-amz-sns-topic-arn", TOPIC_ARN)
        .body(confirmation_body(&subscribe_url))
        .send()
        .await
        .expect("Failed to send HTTP request");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok\n");

    // The GET completes before the response is written
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let delivery = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for confirmation")
        .expect("No delivery received");
    assert_eq!(delivery, Delivery::Confirmed);

    let extra = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(extra.is_err(), "Confirmation should signal exactly once");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    server.shutdown().await.expect("Failed to shutdown server");
}

#[tokio::test]
async fn test_unreachable_subscribe_url_still_acknowledged() {
    // Bind then drop to get a port with nothing listening
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
    let mut server = NotificationServer::new();
    server.add_topic(TOPIC_ARN, "/hooks/sns", tx);
    let server = server.start("127.0.0.1:0").await.expect("Failed to start server");

    let response = reqwest::Client::new()
        .post(format!("{}/hooks/sns", server.base_url()))
        .header("x-amz-sns-message-type", "SubscriptionConfirmation")
        .header("x-amz-sns-topic-arn", TOPIC_ARN)
        .body(confirmation_body(&format!("http://{closed_addr}/confirm")))
        .send()
        .await
        .expect("Failed to send HTTP request");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok\n");

    let no_delivery = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(no_delivery.is_err(), "Failed confirmation should not signal the handler");

    server.shutdown().await.expect("Failed to shutdown server");
}

#[tokio::test]
async fn test_confirmation_for_wrong_topic_is_rejected() {
    let (confirm_addr, hits) = start_confirm_endpoint();

    let mut server = NotificationServer::new();
    server.add_topic(TOPIC_ARN, "/hooks/sns", |_: Delivery| {});
    let server = server.start("127.0.0.1:0").await.expect("Failed to start server");

    let response = reqwest::Client::new()
        .post(format!("{}/hooks/sns", server.base_url()))
        .header("x-amz-sns-message-type", "SubscriptionConfirmation")
        .header("x-amz-sns-topic-arn", "arn:aws:sns:us-west-2:123456789012:Other")
        .body(confirmation_body(&format!(
            "http://{confirm_addr}/confirm?Action=ConfirmSubscription"
        )))
        .send()
        .await
        .expect("Failed to send HTTP request");

    assert_eq!(response.status(), 400);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    server.shutdown().await.expect("Failed to shutdown server");
}
