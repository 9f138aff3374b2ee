//! HTTP endpoint for Amazon SNS push notifications.
//!
//! This crate turns SNS HTTP/HTTPS deliveries into typed handler calls. It
//! confirms subscriptions automatically and hides the wire format from
//! application code.
//!
//! # Overview
//!
//! - [`NotificationServer`]: HTTP listener that serves a set of topic endpoints.
//! - [`TopicRouter`]: Maps URL paths to topic registrations, validates each
//!   delivery against the registered topic ARN and dispatches it.
//! - [`DeliveryHandler`]: Receives a [`Delivery`] per accepted request, either
//!   [`Delivery::Confirmed`] once the subscription is active or a decoded
//!   [`Message`].
//!
//! # Dispatch
//!
//! For each request the router:
//!
//! 1. Looks up the path. Unknown paths get `404 not found`.
//! 2. Compares `x-amz-sns-topic-arn` with the registered ARN. A mismatch gets
//!    `400 bad request`.
//! 3. Reads `x-amz-sns-message-type`:
//!    - `SubscriptionConfirmation`: visits `SubscribeURL`, then signals
//!      [`Delivery::Confirmed`]. Answers `200 ok`.
//!    - `Notification`: decodes the message and hands it over. Answers `200 ok`.
//!    - anything else: `501 not implemented`.
//!
//! Handlers run on spawned tasks that the server never waits for. A delivery
//! whose body cannot be decoded is still acknowledged with `200 ok` so SNS does
//! not retry it, but no handler runs.
//!
//! The topic ARN check trusts a request header. It is not an authenticity
//! check; put the endpoint behind TLS and a network boundary you control.
//!
//! # Example
//!
//! ```no_run
//! use sns_endpoint::{Delivery, NotificationServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sns_endpoint::ServerError> {
//!     let mut server = NotificationServer::new();
//!
//!     server.add_topic(
//!         "arn:aws:sns:us-east-1:123456789012:orders",
//!         "/sns/orders",
//!         |delivery: Delivery| match delivery {
//!             Delivery::Confirmed => println!("subscription active"),
//!             Delivery::Message(message) => {
//!                 println!("{} {}", message.message_id, message.message)
//!             }
//!         },
//!     );
//!
//!     server.listen_and_serve(":8080").await
//! }
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing` and is silent until a subscriber is
//! installed. [`logging::init_logging`] installs a ready-made one.

pub mod config;
pub mod confirm;
pub mod error;
pub mod extract;
pub mod logging;
pub mod message;
pub mod router;
mod server;

pub use config::ServerConfig;
pub use confirm::{HttpConfirmer, SubscriptionConfirmer};
pub use error::{ConfigError, ConfirmError, ExtractError, Result, ServerError};
pub use extract::Fields;
pub use message::{Delivery, Message};
pub use router::{DeliveryHandler, MessageType, Outcome, TopicRouter};
pub use server::{NotificationServer, RunningServer};
