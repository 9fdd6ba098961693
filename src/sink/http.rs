//! HTTP ingestion endpoint sink
//!
//! Each pooled handle owns its own `reqwest::Client` (and therefore its own
//! connection pool and TLS state). Records are POSTed one per request with
//! the partition key carried in a `BrokerProperties` header.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use url::Url;

use super::Sink;
use crate::error::{Error, Result};
use crate::pool::ConnectionFactory;
use crate::types::PayloadFormat;

/// Header carrying routing metadata
pub const BROKER_PROPERTIES_HEADER: &str = "BrokerProperties";

/// Longest response body kept in a sink error
const MAX_ERROR_BODY: usize = 512;

/// Creates [`HttpSink`] handles for one endpoint
#[derive(Clone, Debug)]
pub struct HttpConnector {
    endpoint: Url,
    auth_token: Option<String>,
    format: PayloadFormat,
    timeout: Duration,
}

impl HttpConnector {
    /// Connector for `endpoint`; fails if it is not an absolute http(s) URL.
    pub fn new(
        endpoint: &str,
        auth_token: Option<String>,
        format: PayloadFormat,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        Ok(Self {
            endpoint,
            auth_token,
            format,
            timeout,
        })
    }

    /// Endpoint every handle posts to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Parse and check a sink endpoint.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint.trim()).map_err(|e| {
        Error::config("endpoint", format!("invalid endpoint '{}': {}", endpoint, e))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::config(
            "endpoint",
            format!("endpoint '{}' must use http or https, not {}", endpoint, other),
        )),
    }
}

#[async_trait]
impl ConnectionFactory for HttpConnector {
    type Connection = HttpSink;

    async fn connect(&self) -> Result<HttpSink> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        Ok(HttpSink {
            client,
            endpoint: self.endpoint.clone(),
            auth_token: self.auth_token.clone(),
            content_type: self.format.content_type(),
        })
    }
}

/// One HTTP client bound to an endpoint
#[derive(Debug)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: Url,
    auth_token: Option<String>,
    content_type: &'static str,
}

#[async_trait]
impl Sink for HttpSink {
    async fn publish(&self, partition_key: &str, payload: String) -> Result<()> {
        let properties = serde_json::json!({ "PartitionKey": partition_key }).to_string();

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(BROKER_PROPERTIES_HEADER, properties)
            .header(CONTENT_TYPE, self.content_type)
            .body(payload);

        if let Some(token) = &self.auth_token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Err(Error::Sink {
            endpoint: self.endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector(server: &MockServer, token: Option<&str>, format: PayloadFormat) -> HttpConnector {
        HttpConnector::new(
            &format!("{}/rides/messages", server.uri()),
            token.map(String::from),
            format,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_payload_with_partition_key_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rides/messages"))
            .and(header(BROKER_PROPERTIES_HEADER, r#"{"PartitionKey":"1_2_VTS"}"#))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "SharedAccessSignature sr=test"))
            .and(body_string(r#"{"medallion":1}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let sink = connector(
            &server,
            Some("SharedAccessSignature sr=test"),
            PayloadFormat::Json,
        )
        .connect()
        .await
        .unwrap();

        sink.publish("1_2_VTS", r#"{"medallion":1}"#.to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn csv_payload_uses_text_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "text/csv"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = connector(&server, None, PayloadFormat::Csv)
            .connect()
            .await
            .unwrap();

        sink.publish("k", "h1,h2\r\n1,2".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn rejection_is_sink_error_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("server busy"))
            .mount(&server)
            .await;

        let sink = connector(&server, None, PayloadFormat::Json)
            .connect()
            .await
            .unwrap();
        let err = sink.publish("k", "{}".to_string()).await.unwrap_err();

        match err {
            Error::Sink { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "server busy");
            }
            other => panic!("expected Sink error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let connector = HttpConnector::new(
            "http://127.0.0.1:9/messages",
            None,
            PayloadFormat::Json,
            Duration::from_secs(2),
        )
        .unwrap();
        let sink = connector.connect().await.unwrap();

        let err = sink.publish("k", "{}".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)), "got {err:?}");
    }

    #[test]
    fn endpoint_must_be_http() {
        assert!(parse_endpoint("https://hub.servicebus.windows.net/rides/messages").is_ok());

        let err = parse_endpoint("sb://hub.servicebus.windows.net/").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(parse_endpoint("not a url").is_err());
    }
}
