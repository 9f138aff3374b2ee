use anyhow::{Context, Result};
use clap::Parser;
use sns_endpoint::{Delivery, Message, NotificationServer};
use tracing::{error, info};

/// Listen for Amazon SNS notifications on one topic
///
/// Subscribes an HTTP endpoint for the given topic ARN, confirms the
/// subscription when SNS asks, and prints every notification it receives.
#[derive(Parser, Debug)]
#[command(name = "sns-listen")]
#[command(about = "Receive Amazon SNS notifications for one topic and print them")]
#[command(version)]
pub struct Args {
    /// Topic ARN the endpoint accepts deliveries from
    pub topic_arn: String,

    /// URL path of the endpoint, e.g. /web/endpoint
    pub path: String,

    /// Address to listen on (host:port, or :port for all interfaces)
    #[arg(short, long, default_value = ":8080")]
    pub address: String,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.topic_arn.trim().is_empty() {
            return Err(anyhow::anyhow!("Topic ARN must not be empty"));
        }

        if self.address.trim().is_empty() {
            return Err(anyhow::anyhow!("Listen address must not be empty"));
        }

        match self.log_level.to_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}'. Valid levels: off, error, warn, info, debug, trace",
                    self.log_level
                ));
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(address) = var("SNS_LISTEN_ADDRESS") {
            self.address = address;
        }

        if let Some(log_level) = var("SNS_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Parse command line arguments, apply environment overrides and validate
    pub fn from_env() -> Result<Self> {
        let mut args = Args::parse();
        args.apply_env(|name| std::env::var(name).ok());
        args.validate()?;
        Ok(args)
    }
}

/// Render a delivery the way it is printed to stdout
fn render(delivery: &Delivery) -> String {
    match delivery {
        Delivery::Confirmed => "Topic subscription confirmed.".to_string(),
        Delivery::Message(Message {
            subject,
            message,
            message_id,
            timestamp,
        }) => format!(
            "-----\n\
             timestamp:  {timestamp}\n\
             message-id: {message_id}\n\
             subject:    '{subject}'\n\
             \n\
             {message}\n\
             -----"
        ),
    }
}

fn print_delivery(delivery: Delivery) {
    println!("{}", render(&delivery));
}

async fn run(args: Args) -> Result<()> {
    let mut server = NotificationServer::new();
    server.add_topic(args.topic_arn.as_str(), args.path.as_str(), print_delivery);

    info!("Waiting for deliveries for topic '{}'", args.topic_arn);
    server
        .listen_and_serve(&args.address)
        .await
        .with_context(|| format!("Listener on '{}' failed", args.address))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::from_env().context("Failed to parse configuration")?;

    sns_endpoint::logging::init_with_level(&args.log_level)
        .context("Failed to initialize logging")?;

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
