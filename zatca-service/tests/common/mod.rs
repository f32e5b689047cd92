#![allow(dead_code)]

use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use wiremock::MockServer;
use zatca_service::config::{
    AuthScheme, InvoiceDefaults, PayloadFormat, SigningConfig, StoreBackend, StoreConfig,
    WebhookConfig, ZatcaApiConfig, ZatcaServiceConfig,
};
use zatca_service::services::{HttpZatcaGateway, InMemorySyncStore};
use zatca_service::Application;

pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<InMemorySyncStore>,
    pub zatca: MockServer,
    pub client: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct TestOptions {
    pub webhook_secret: Option<String>,
    pub testing_mode: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            testing_mode: false,
        }
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        let zatca = MockServer::start().await;

        let config = ZatcaServiceConfig {
            common: CoreConfig {
                port: 0, // Random port
                environment: "test".to_string(),
                log_level: "debug".to_string(),
            },
            zatca: ZatcaApiConfig {
                base_url: zatca.uri(),
                api_version: "v2".to_string(),
                use_versioned_paths: false,
                auth_scheme: AuthScheme::Bearer,
                username: String::new(),
                api_token: Secret::new("test-token".to_string()),
                payload_format: PayloadFormat::Xml,
                testing_mode: options.testing_mode,
            },
            webhook: WebhookConfig {
                secret: options.webhook_secret.map(Secret::new),
            },
            signing: SigningConfig { ed25519_seed: None },
            invoice: InvoiceDefaults::default(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                mongodb_uri: String::new(),
                mongodb_database: String::new(),
            },
            otlp_endpoint: None,
        };

        let store = Arc::new(InMemorySyncStore::new());
        let gateway = Arc::new(HttpZatcaGateway::new(config.zatca.clone()));

        let app = Application::build_with(config, store.clone(), gateway)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            store,
            zatca,
            client,
        }
    }

    pub async fn submit(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/invoices/submit", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Post a webhook body, signing it with `secret` when given.
    pub async fn webhook(&self, body: &str, secret: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/webhooks/zatca", self.address))
            .header("content-type", "application/json")
            .body(body.to_string());

        if let Some(secret) = secret {
            let signature = service_core::utils::signature::sign_body(secret, body.as_bytes())
                .expect("Failed to sign body");
            request = request.header("x-zatca-signature", signature);
        }

        request.send().await.expect("Failed to execute request")
    }
}

pub fn valid_invoice() -> serde_json::Value {
    serde_json::json!({
        "no": 1001,
        "date": "2024-03-01 – 10:15",
        "customer": "Al Noor Trading",
        "salesman": "Omar",
        "vatNo": "310122393500003",
        "total": 115.0,
        "vatAmount": 15.0,
        "items": [{ "name": "Widget", "quantity": 2, "price": 50 }],
        "company": { "vatNo": "300000000000003", "ownerName1": "Acme LLC" }
    })
}
