//! ZATCA e-invoicing API client.
//!
//! Each stage is a single POST. The gateway reports what came back and leaves
//! the success decision to the pipeline; it never retries.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use service_core::observability::trace_headers;
use thiserror::Error;

use crate::config::{AuthScheme, PayloadFormat, ZatcaApiConfig};
use crate::services::signing::SignedInvoice;

pub const SIGNATURE_HEADER: &str = "x-invoice-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compliance,
    Reporting,
    Clearance,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Compliance => "compliance",
            Stage::Reporting => "reporting",
            Stage::Clearance => "clearance",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResponse {
    pub status: u16,
    pub body: String,
}

impl StageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("ZATCA API credentials not configured")]
    NotConfigured,
    #[error("request to ZATCA failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-request values forwarded to ZATCA.
#[derive(Debug, Clone, Default)]
pub struct SubmissionContext {
    pub request_id: Option<String>,
}

#[async_trait]
pub trait ZatcaGateway: Send + Sync {
    async fn submit(
        &self,
        stage: Stage,
        invoice: &SignedInvoice,
        ctx: &SubmissionContext,
    ) -> Result<StageResponse, GatewayError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSubmission<'a> {
    invoice_hash: &'a str,
    uuid: String,
    invoice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
}

#[derive(Clone)]
pub struct HttpZatcaGateway {
    client: Client,
    config: ZatcaApiConfig,
}

impl HttpZatcaGateway {
    pub fn new(config: ZatcaApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn endpoint(&self, stage: Stage) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if self.config.use_versioned_paths {
            format!("{}/{}/{}", base, self.config.api_version, stage)
        } else {
            format!("{}/{}", base, stage)
        }
    }
}

#[async_trait]
impl ZatcaGateway for HttpZatcaGateway {
    async fn submit(
        &self,
        stage: Stage,
        invoice: &SignedInvoice,
        ctx: &SubmissionContext,
    ) -> Result<StageResponse, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let url = self.endpoint(stage);
        let mut request = self
            .client
            .post(&url)
            .headers(trace_headers(ctx.request_id.as_deref()));

        request = match self.config.auth_scheme {
            AuthScheme::Bearer => request.bearer_auth(self.config.api_token.expose_secret()),
            AuthScheme::Basic => request.basic_auth(
                &self.config.username,
                Some(self.config.api_token.expose_secret()),
            ),
        };

        request = match self.config.payload_format {
            PayloadFormat::Xml => {
                let mut request = request
                    .header(reqwest::header::CONTENT_TYPE, "application/xml")
                    .body(invoice.document.xml.clone());
                if let Some(signature) = &invoice.signature {
                    request = request.header(SIGNATURE_HEADER, signature);
                }
                request
            }
            PayloadFormat::Json => {
                let body = JsonSubmission {
                    invoice_hash: &invoice.document.invoice_hash,
                    uuid: invoice.document.uuid.to_string(),
                    invoice: STANDARD.encode(invoice.document.xml.as_bytes()),
                    signature: invoice.signature.as_deref(),
                };
                request
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(serde_json::to_vec(&body)?)
            }
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            stage = %stage,
            uuid = %invoice.document.uuid,
            status,
            "ZATCA stage response"
        );

        Ok(StageResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InvoiceDefaults;
    use crate::models::InvoiceRecord;
    use crate::services::document_builder::DocumentBuilder;
    use crate::services::signing::{InvoiceSigner, NullSigner};
    use secrecy::Secret;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ZatcaApiConfig {
        ZatcaApiConfig {
            base_url: base_url.to_string(),
            api_version: "v2".to_string(),
            use_versioned_paths: false,
            auth_scheme: AuthScheme::Bearer,
            username: String::new(),
            api_token: Secret::new("token-123".to_string()),
            payload_format: PayloadFormat::Xml,
            testing_mode: false,
        }
    }

    fn signed() -> SignedInvoice {
        let invoice = InvoiceRecord::from_json(
            json!({ "no": 5, "customer": "B", "items": [{ "name": "x", "price": 10 }] }),
            &InvoiceDefaults::default(),
        )
        .unwrap();
        let doc = DocumentBuilder::new().build(&invoice, "hash-5").unwrap();
        NullSigner.sign(doc).unwrap()
    }

    #[test]
    fn builds_plain_and_versioned_endpoints() {
        let mut cfg = config("https://zatca.example/api/");
        assert_eq!(
            HttpZatcaGateway::new(cfg.clone()).endpoint(Stage::Reporting),
            "https://zatca.example/api/reporting"
        );

        cfg.use_versioned_paths = true;
        assert_eq!(
            HttpZatcaGateway::new(cfg).endpoint(Stage::Clearance),
            "https://zatca.example/api/v2/clearance"
        );
    }

    #[tokio::test]
    async fn posts_xml_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compliance"))
            .and(header("authorization", "Bearer token-123"))
            .and(header("content-type", "application/xml"))
            .and(header("x-request-id", "req-1"))
            .and(body_string_contains("<cbc:ID>5</cbc:ID>"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpZatcaGateway::new(config(&server.uri()));
        let ctx = SubmissionContext {
            request_id: Some("req-1".to_string()),
        };

        let response = gateway
            .submit(Stage::Compliance, &signed(), &ctx)
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.body, "ok");
    }

    #[tokio::test]
    async fn json_payload_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/clearance"))
            .and(header_exists("authorization"))
            .and(header("content-type", "application/json"))
            .and(body_string_contains("\"invoiceHash\":\"hash-5\""))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad invoice"))
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.use_versioned_paths = true;
        cfg.auth_scheme = AuthScheme::Basic;
        cfg.username = "binary-token".to_string();
        cfg.payload_format = PayloadFormat::Json;

        let response = HttpZatcaGateway::new(cfg)
            .submit(Stage::Clearance, &signed(), &SubmissionContext::default())
            .await
            .unwrap();

        assert_eq!(response.status, 400);
        assert!(!response.is_success());
        assert_eq!(response.body, "bad invoice");
    }

    #[tokio::test]
    async fn refuses_without_credentials() {
        let mut cfg = config("http://127.0.0.1:9");
        cfg.api_token = Secret::new(String::new());

        let err = HttpZatcaGateway::new(cfg)
            .submit(Stage::Compliance, &signed(), &SubmissionContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NotConfigured));
    }
}
