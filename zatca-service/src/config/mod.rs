use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Developer-portal sandbox; only used outside production.
const SANDBOX_BASE_URL: &str = "https://gw-fatoora.zatca.gov.sa/e-invoicing/developer-portal";

#[derive(Debug, Clone)]
pub struct ZatcaServiceConfig {
    pub common: core_config::Config,
    pub zatca: ZatcaApiConfig,
    pub webhook: WebhookConfig,
    pub signing: SigningConfig,
    pub invoice: InvoiceDefaults,
    pub store: StoreConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ZatcaApiConfig {
    pub base_url: String,
    pub api_version: String,
    /// Use `{base}/{version}/{stage}` instead of `{base}/{stage}`.
    pub use_versioned_paths: bool,
    pub auth_scheme: AuthScheme,
    /// Basic auth user (the binary security token for ZATCA). Unused for bearer.
    pub username: String,
    /// Bearer token, or the basic auth secret.
    pub api_token: Secret<String>,
    pub payload_format: PayloadFormat,
    /// Skip every remote call and synthesize a cleared result.
    pub testing_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Xml,
    Json,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared HMAC secret. Signature checks are skipped when unset.
    pub secret: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Base64 Ed25519 seed. Documents go out unsigned when unset.
    pub ed25519_seed: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct InvoiceDefaults {
    /// Percentage applied when the invoice carries no rate of its own.
    pub tax_rate_percent: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongodb,
    Memory,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self {
            tax_rate_percent: Decimal::from(15),
            currency: "SAR".to_string(),
        }
    }
}

impl ZatcaApiConfig {
    pub fn is_configured(&self) -> bool {
        let has_token = !self.api_token.expose_secret().is_empty();
        match self.auth_scheme {
            AuthScheme::Bearer => has_token,
            AuthScheme::Basic => has_token && !self.username.is_empty(),
        }
    }
}

impl ZatcaServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production()
            || env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let tax_rate_percent = get_env("ZATCA_TAX_RATE", Some("15"), is_prod)?
            .parse::<Decimal>()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("ZATCA_TAX_RATE: {}", e)))?;

        Ok(ZatcaServiceConfig {
            common,
            zatca: ZatcaApiConfig {
                base_url: get_env("ZATCA_BASE_URL", Some(SANDBOX_BASE_URL), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
                api_version: get_env("ZATCA_API_VERSION", Some("v2"), is_prod)?,
                use_versioned_paths: get_flag("ZATCA_USE_VERSIONED_PATHS"),
                auth_scheme: match get_env("ZATCA_AUTH_SCHEME", Some("bearer"), is_prod)?
                    .to_lowercase()
                    .as_str()
                {
                    "basic" => AuthScheme::Basic,
                    _ => AuthScheme::Bearer,
                },
                username: env::var("ZATCA_API_USERNAME").unwrap_or_default(),
                api_token: Secret::new(get_env("ZATCA_API_TOKEN", Some(""), is_prod)?),
                payload_format: match env::var("ZATCA_PAYLOAD_FORMAT")
                    .unwrap_or_else(|_| "xml".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "json" => PayloadFormat::Json,
                    _ => PayloadFormat::Xml,
                },
                testing_mode: get_flag("ZATCA_TESTING_MODE"),
            },
            webhook: WebhookConfig {
                secret: non_empty_secret("ZATCA_WEBHOOK_SECRET"),
            },
            signing: SigningConfig {
                ed25519_seed: non_empty_secret("ZATCA_SIGNING_KEY"),
            },
            invoice: InvoiceDefaults {
                tax_rate_percent,
                currency: get_env("ZATCA_CURRENCY", Some("SAR"), is_prod)?,
            },
            store: StoreConfig {
                backend: match env::var("ZATCA_STORE")
                    .unwrap_or_else(|_| "mongodb".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "memory" => StoreBackend::Memory,
                    _ => StoreBackend::Mongodb,
                },
                mongodb_uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                mongodb_database: get_env("MONGODB_DATABASE", Some("zatca_db"), is_prod)?,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }
}

fn get_flag(key: &str) -> bool {
    env::var(key)
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false)
}

fn non_empty_secret(key: &str) -> Option<Secret<String>> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(Secret::new)
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_config(scheme: AuthScheme, username: &str, token: &str) -> ZatcaApiConfig {
        ZatcaApiConfig {
            base_url: SANDBOX_BASE_URL.to_string(),
            api_version: "v2".to_string(),
            use_versioned_paths: false,
            auth_scheme: scheme,
            username: username.to_string(),
            api_token: Secret::new(token.to_string()),
            payload_format: PayloadFormat::Xml,
            testing_mode: false,
        }
    }

    #[test]
    fn bearer_needs_only_a_token() {
        assert!(api_config(AuthScheme::Bearer, "", "tok").is_configured());
        assert!(!api_config(AuthScheme::Bearer, "user", "").is_configured());
    }

    #[test]
    fn basic_needs_username_and_secret() {
        assert!(api_config(AuthScheme::Basic, "user", "secret").is_configured());
        assert!(!api_config(AuthScheme::Basic, "", "secret").is_configured());
    }

    #[test]
    fn missing_required_value_fails_in_production() {
        let err = get_env("ZATCA_TEST_DEFINITELY_UNSET", Some("x"), true).unwrap_err();
        assert!(err.to_string().contains("required in production"));
        assert_eq!(
            get_env("ZATCA_TEST_DEFINITELY_UNSET", Some("x"), false).unwrap(),
            "x"
        );
    }
}
