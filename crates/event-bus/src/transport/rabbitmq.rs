//! Transport backed by the RabbitMQ management HTTP API.

use std::time::Duration;

use common::Event;
use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use super::Transport;
use crate::error::TransportError;

/// Exchange used when none is configured.
pub const DEFAULT_EXCHANGE: &str = "saga.events";

/// Virtual host used when none is configured.
pub const DEFAULT_VHOST: &str = "/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`RabbitMqTransport`].
#[derive(Debug, Clone)]
pub struct RabbitMqConfig {
    /// Base URL of the management API, e.g. `http://localhost:15672`.
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub vhost: String,
    pub exchange: String,
    pub timeout: Duration,
}

impl RabbitMqConfig {
    /// Creates a config for `endpoint` with the default vhost and exchange.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
            vhost: DEFAULT_VHOST.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the virtual host. An empty value keeps the default.
    pub fn with_vhost(mut self, vhost: impl Into<String>) -> Self {
        let vhost = vhost.into();
        if !vhost.is_empty() {
            self.vhost = vhost;
        }
        self
    }

    /// Sets the exchange. An empty value keeps the default.
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        let exchange = exchange.into();
        if !exchange.is_empty() {
            self.exchange = exchange;
        }
        self
    }
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    properties: serde_json::Map<String, serde_json::Value>,
    routing_key: &'a str,
    payload: String,
    payload_encoding: &'static str,
}

#[derive(Deserialize)]
struct PublishResponse {
    routed: bool,
}

/// Publishes events to a topic exchange through the management HTTP API.
///
/// The exchange is declared when the transport connects. Each event is sent
/// with its name as the routing key and its wire envelope as the message
/// body. A message the broker reports as unroutable is an error.
#[derive(Debug)]
pub struct RabbitMqTransport {
    client: Client,
    declare_url: Url,
    publish_url: Url,
    exchange: String,
    username: Option<String>,
    password: Option<String>,
}

impl RabbitMqTransport {
    /// Builds the transport and declares the exchange.
    pub fn connect(config: RabbitMqConfig) -> Result<Self, TransportError> {
        if config.endpoint.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "rabbitmq endpoint is required".to_string(),
            ));
        }
        let vhost = if config.vhost.is_empty() {
            DEFAULT_VHOST
        } else {
            config.vhost.as_str()
        };
        let exchange = if config.exchange.is_empty() {
            DEFAULT_EXCHANGE
        } else {
            config.exchange.as_str()
        };

        let base = Url::parse(config.endpoint.trim()).map_err(|e| {
            TransportError::InvalidConfig(format!("invalid rabbitmq endpoint: {e}"))
        })?;
        let declare_url = exchange_url(&base, vhost, exchange, None)?;
        let publish_url = exchange_url(&base, vhost, exchange, Some("publish"))?;
        let client = Client::builder().timeout(config.timeout).build()?;

        let transport = Self {
            client,
            declare_url,
            publish_url,
            exchange: exchange.to_string(),
            username: config.username.filter(|u| !u.is_empty()),
            password: config.password,
        };
        transport.ensure_exchange()?;

        tracing::info!(exchange = %transport.exchange, "rabbitmq transport ready");
        Ok(transport)
    }

    /// Returns the exchange events are published to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    fn ensure_exchange(&self) -> Result<(), TransportError> {
        let body = serde_json::json!({
            "type": "topic",
            "durable": true,
            "auto_delete": false,
            "internal": false,
            "arguments": {}
        });
        let response = self
            .request(Method::PUT, self.declare_url.clone())
            .json(&body)
            .send()?;
        check_status(response, "declare exchange")?;
        Ok(())
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(username) => builder.basic_auth(username, self.password.as_deref()),
            None => builder,
        }
    }
}

impl Transport for RabbitMqTransport {
    fn publish(&self, event: &Event) -> Result<(), TransportError> {
        let request = PublishRequest {
            properties: serde_json::Map::new(),
            routing_key: &event.name,
            payload: serde_json::to_string(event)?,
            payload_encoding: "string",
        };

        let response = self
            .request(Method::POST, self.publish_url.clone())
            .json(&request)
            .send()?;
        let parsed: PublishResponse = check_status(response, "publish")?.json()?;
        if !parsed.routed {
            return Err(TransportError::Unroutable {
                event: event.name.clone(),
            });
        }

        tracing::debug!(event = %event.name, saga_id = %event.saga_id, "event mirrored to rabbitmq");
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn check_status(response: Response, context: &'static str) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status {
            context,
            status: status.as_u16(),
        })
    }
}

/// Builds `{base}/api/exchanges/{vhost}/{exchange}[/{suffix}]`.
///
/// Segments are percent-encoded, so the default vhost `/` becomes `%2F`.
fn exchange_url(
    base: &Url,
    vhost: &str,
    exchange: &str,
    suffix: Option<&str>,
) -> Result<Url, TransportError> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            TransportError::InvalidConfig(format!("rabbitmq endpoint cannot be a base URL: {base}"))
        })?;
        segments
            .pop_if_empty()
            .extend(["api", "exchanges", vhost, exchange]);
        if let Some(suffix) = suffix {
            segments.push(suffix);
        }
    }
    Ok(url)
}
