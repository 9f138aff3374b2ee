//! Topic registration and delivery dispatch.
//!
//! This module provides the `TopicRouter`, which maps URL paths to SNS topic
//! registrations and turns each inbound delivery into an [`Outcome`] for the
//! sender plus, when the delivery is accepted, a handler invocation.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use warp::http::{HeaderMap, StatusCode};

use crate::confirm::{HttpConfirmer, SubscriptionConfirmer};
use crate::extract::{extract_fields, header_str, MESSAGE_TYPE_HEADER, TOPIC_ARN_HEADER};
use crate::message::{required_str, Delivery, Message};

/// Receives deliveries for one topic.
///
/// Each delivery is handled on its own detached task that the server never
/// awaits, so a slow handler does not delay the acknowledgment sent to SNS.
///
/// Closures and unbounded channel senders implement this trait:
///
/// ```
/// use sns_endpoint::{Delivery, TopicRouter};
/// use tokio::sync::mpsc;
///
/// let mut router = TopicRouter::new();
/// router.add_topic("arn:aws:sns:us-east-1:123456789012:orders", "/orders", |delivery: Delivery| {
///     println!("{delivery:?}");
/// });
///
/// let (tx, _rx) = mpsc::unbounded_channel::<Delivery>();
/// router.add_topic("arn:aws:sns:us-east-1:123456789012:audit", "/audit", tx);
/// ```
#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    async fn on_delivery(&self, delivery: Delivery);

    /// Start handling `delivery` on a detached task.
    ///
    /// The default runs [`on_delivery`](Self::on_delivery) on the async
    /// runtime. A panic is caught and logged on that task.
    fn spawn_delivery(self: Arc<Self>, delivery: Delivery) {
        tokio::spawn(async move {
            let result = AssertUnwindSafe(self.on_delivery(delivery))
                .catch_unwind()
                .await;
            if result.is_err() {
                tracing::error!("Delivery handler panicked");
            }
        });
    }
}

/// Plain closures may block, so they run on the blocking thread pool and
/// never occupy an async worker.
#[async_trait]
impl<F> DeliveryHandler for F
where
    F: Fn(Delivery) + Send + Sync + 'static,
{
    async fn on_delivery(&self, delivery: Delivery) {
        (self)(delivery)
    }

    fn spawn_delivery(self: Arc<Self>, delivery: Delivery) {
        tokio::task::spawn_blocking(move || {
            if panic::catch_unwind(AssertUnwindSafe(|| (*self)(delivery))).is_err() {
                tracing::error!("Delivery handler panicked");
            }
        });
    }
}

#[async_trait]
impl DeliveryHandler for mpsc::UnboundedSender<Delivery> {
    async fn on_delivery(&self, delivery: Delivery) {
        // Ignore errors if receiver is dropped
        let _ = self.send(delivery);
    }
}

/// Delivery types the router acts on, read from `x-amz-sns-message-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    SubscriptionConfirmation,
    Notification,
}

impl MessageType {
    /// Parse a header value. Unknown and empty values yield `None`.
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "SubscriptionConfirmation" => Some(Self::SubscriptionConfirmation),
            "Notification" => Some(Self::Notification),
            _ => None,
        }
    }
}

/// Response decided for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Delivery accepted
    Ok,
    /// No topic is registered on the request path
    NotFound,
    /// The topic ARN header does not match the registration
    BadRequest,
    /// The delivery type is absent or unsupported
    NotImplemented,
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Ok => StatusCode::OK,
            Outcome::NotFound => StatusCode::NOT_FOUND,
            Outcome::BadRequest => StatusCode::BAD_REQUEST,
            Outcome::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Plain-text body, without the trailing newline added on the wire.
    pub fn body(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::NotFound => "not found",
            Outcome::BadRequest => "bad request",
            Outcome::NotImplemented => "not implemented",
        }
    }
}

/// A topic subscribed on one path.
pub struct TopicRegistration {
    topic_arn: String,
    handler: Arc<dyn DeliveryHandler>,
}

impl TopicRegistration {
    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }
}

impl std::fmt::Debug for TopicRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistration")
            .field("topic_arn", &self.topic_arn)
            .finish_non_exhaustive()
    }
}

/// Routes SNS deliveries to topic handlers by request path.
///
/// Topics are added through `&mut self` before serving. The server then
/// shares the router behind an `Arc`, after which the table is read-only and
/// needs no locking.
pub struct TopicRouter {
    /// Registrations keyed by normalized path
    topics: HashMap<String, TopicRegistration>,
    /// Completes subscription handshakes
    confirmer: Arc<dyn SubscriptionConfirmer>,
}

impl TopicRouter {
    /// Create a router that confirms subscriptions over HTTP.
    pub fn new() -> Self {
        Self::with_confirmer(HttpConfirmer::new())
    }

    /// Create a router with a custom confirmer.
    pub fn with_confirmer(confirmer: impl SubscriptionConfirmer + 'static) -> Self {
        Self {
            topics: HashMap::new(),
            confirmer: Arc::new(confirmer),
        }
    }

    /// Register `handler` for deliveries from `topic_arn` on `path`.
    ///
    /// A missing leading `/` is added to `path`. Registering a path again
    /// replaces the earlier registration.
    pub fn add_topic(
        &mut self,
        topic_arn: impl Into<String>,
        path: impl Into<String>,
        handler: impl DeliveryHandler,
    ) {
        let topic_arn = topic_arn.into();
        let path = normalize_path(path.into());

        tracing::info!(path = %path, topic_arn = %topic_arn, "Adding endpoint for topic");

        self.topics.insert(
            path,
            TopicRegistration {
                topic_arn,
                handler: Arc::new(handler),
            },
        );
    }

    /// Look up the registration for a request path.
    pub fn topic(&self, path: &str) -> Option<&TopicRegistration> {
        self.topics.get(path)
    }

    /// Registered paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Classify one delivery and run the matching flow.
    ///
    /// Confirmation completes its GET before this returns. Handlers are
    /// spawned and not awaited. Body problems never change the outcome: a
    /// delivery that passed routing is answered with [`Outcome::Ok`] even if
    /// its body is unusable.
    pub async fn dispatch(&self, path: &str, headers: &HeaderMap, body: &[u8]) -> Outcome {
        let Some(topic) = self.topics.get(path) else {
            tracing::debug!(path, "No topic registered for path");
            return Outcome::NotFound;
        };

        let claimed_arn = header_str(headers, TOPIC_ARN_HEADER);
        if claimed_arn != topic.topic_arn {
            tracing::debug!(path, claimed_arn, "Topic ARN mismatch");
            return Outcome::BadRequest;
        }

        match MessageType::from_header(header_str(headers, MESSAGE_TYPE_HEADER)) {
            Some(MessageType::SubscriptionConfirmation) => {
                self.confirm_subscription(path, topic, headers, body).await;
                Outcome::Ok
            }
            Some(MessageType::Notification) => {
                self.process_message(path, topic, headers, body);
                Outcome::Ok
            }
            None => {
                tracing::debug!(
                    path,
                    message_type = header_str(headers, MESSAGE_TYPE_HEADER),
                    "Unsupported delivery type"
                );
                Outcome::NotImplemented
            }
        }
    }

    async fn confirm_subscription(
        &self,
        path: &str,
        topic: &TopicRegistration,
        headers: &HeaderMap,
        body: &[u8],
    ) {
        let fields = match extract_fields(headers, body) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(path, error = %e, "Dropping subscription confirmation");
                return;
            }
        };
        let subscribe_url = match required_str(&fields, "SubscribeURL") {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(path, error = %e, "Dropping subscription confirmation");
                return;
            }
        };

        if let Err(e) = self.confirmer.confirm(subscribe_url).await {
            tracing::warn!(path, error = %e, "Error confirming subscription");
            return;
        }

        tracing::info!(
            path,
            topic_arn = %topic.topic_arn,
            "Endpoint confirmed subscription for topic"
        );
        topic.handler.clone().spawn_delivery(Delivery::Confirmed);
    }

    fn process_message(
        &self,
        path: &str,
        topic: &TopicRegistration,
        headers: &HeaderMap,
        body: &[u8],
    ) {
        let message = match extract_fields(headers, body)
            .and_then(|fields| Message::from_fields(&fields))
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(path, error = %e, "Dropping notification");
                return;
            }
        };

        tracing::info!(
            path,
            topic_arn = %topic.topic_arn,
            message_id = %message.message_id,
            "Endpoint got message for topic"
        );
        topic.handler.clone().spawn_delivery(Delivery::Message(message));
    }
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TopicRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRouter")
            .field("topics", &self.topics)
            .finish_non_exhaustive()
    }
}

fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}
