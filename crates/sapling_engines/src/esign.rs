#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sapling_kernel_contracts::esign::{
    EmbeddedSignUrlResponse, EmbeddedSignatureRequest, EmbeddedSignatureResponse, SignatureId,
};
use sapling_kernel_contracts::provider_secrets::ProviderSecretId;
use serde_json::Value;
use tracing::debug;

const PROVIDER: &str = "dropbox_sign";
const DEFAULT_API_BASE_URL: &str = "https://api.hellosign.com/v3/";
const DEFAULT_USER_AGENT: &str = "sapling/0.1";

/// External e-signature provider. Both calls are blocking and unretried.
pub trait EsignProvider {
    fn create_embedded_signature_request(
        &self,
        req: &EmbeddedSignatureRequest,
    ) -> Result<EmbeddedSignatureResponse, EsignProviderError>;

    fn mint_embedded_sign_url(
        &self,
        signature_id: &SignatureId,
    ) -> Result<EmbeddedSignUrlResponse, EsignProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.safe_detail())]
pub struct EsignProviderError {
    pub provider: &'static str,
    pub error_kind: &'static str,
    pub http_status: Option<u16>,
}

impl EsignProviderError {
    pub fn new(provider: &'static str, error_kind: &'static str, http_status: Option<u16>) -> Self {
        Self {
            provider,
            error_kind,
            http_status,
        }
    }

    /// Log-safe description; never includes credentials or response bodies.
    pub fn safe_detail(&self) -> String {
        match self.http_status {
            Some(status) => format!(
                "provider={} error={} status={}",
                self.provider, self.error_kind, status
            ),
            None => format!("provider={} error={}", self.provider, self.error_kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsignProviderConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub test_mode: bool,
    pub timeout_ms: Option<u32>,
    pub user_agent: String,
}

impl EsignProviderConfig {
    pub fn from_env() -> Self {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    pub fn from_env_var_map<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            api_base_url: non_empty("SAPLING_ESIGN_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_key: non_empty(ProviderSecretId::EsignApiKey.env_var()),
            client_id: non_empty(ProviderSecretId::EsignClientId.env_var()),
            test_mode: !matches!(
                non_empty("SAPLING_ESIGN_TEST_MODE")
                    .map(|v| v.to_ascii_lowercase())
                    .as_deref(),
                Some("0" | "false" | "off" | "no")
            ),
            timeout_ms: non_empty("SAPLING_ESIGN_TIMEOUT_MS")
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn missing_secrets(&self) -> Vec<ProviderSecretId> {
        let mut out = Vec::new();
        if self.api_key.is_none() {
            out.push(ProviderSecretId::EsignApiKey);
        }
        if self.client_id.is_none() {
            out.push(ProviderSecretId::EsignClientId);
        }
        out
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), path)
    }
}

/// Dropbox Sign (HelloSign) v3 client for embedded template signing.
#[derive(Clone)]
pub struct DropboxSignClient {
    config: EsignProviderConfig,
    agent: ureq::Agent,
}

impl DropboxSignClient {
    pub fn new(config: EsignProviderConfig) -> Self {
        let agent = build_http_agent(config.timeout_ms, &config.user_agent);
        Self { config, agent }
    }

    fn credentials(&self) -> Result<(&str, &str), EsignProviderError> {
        match (self.config.api_key.as_deref(), self.config.client_id.as_deref()) {
            (Some(api_key), Some(client_id)) => Ok((api_key, client_id)),
            _ => Err(EsignProviderError::new(PROVIDER, "config_missing", None)),
        }
    }
}

impl EsignProvider for DropboxSignClient {
    fn create_embedded_signature_request(
        &self,
        req: &EmbeddedSignatureRequest,
    ) -> Result<EmbeddedSignatureResponse, EsignProviderError> {
        let (api_key, client_id) = self.credentials()?;
        let payload = build_create_embedded_with_template_payload(
            client_id,
            self.config.test_mode,
            req,
        );
        let endpoint = self
            .config
            .endpoint("signature_request/create_embedded_with_template");
        debug!(
            provider = PROVIDER,
            template_id = req.template_id.as_str(),
            "creating embedded signature request"
        );
        let response = self
            .agent
            .post(&endpoint)
            .set("Authorization", &basic_auth_header(api_key))
            .set("Accept", "application/json")
            .send_json(payload)
            .map_err(provider_error_from_ureq)?;
        let body = read_json(response)?;
        Ok(parse_signature_request_response(&body))
    }

    fn mint_embedded_sign_url(
        &self,
        signature_id: &SignatureId,
    ) -> Result<EmbeddedSignUrlResponse, EsignProviderError> {
        let (api_key, _) = self.credentials()?;
        if !is_path_safe_id(signature_id.as_str()) {
            return Err(EsignProviderError::new(PROVIDER, "invalid_signature_id", None));
        }
        let endpoint = self
            .config
            .endpoint(&format!("embedded/sign_url/{}", signature_id.as_str()));
        debug!(provider = PROVIDER, "minting embedded sign url");
        let response = self
            .agent
            .get(&endpoint)
            .set("Authorization", &basic_auth_header(api_key))
            .set("Accept", "application/json")
            .call()
            .map_err(provider_error_from_ureq)?;
        let body = read_json(response)?;
        Ok(parse_sign_url_response(&body))
    }
}

pub fn build_create_embedded_with_template_payload(
    client_id: &str,
    test_mode: bool,
    req: &EmbeddedSignatureRequest,
) -> Value {
    let custom_fields: Vec<Value> = req
        .custom_fields
        .iter()
        .map(|f| serde_json::json!({ "name": f.name, "value": f.value }))
        .collect();
    serde_json::json!({
        "client_id": client_id,
        "template_ids": [req.template_id.as_str()],
        "signers": [{
            "role": req.signer.role,
            "name": req.signer.name,
            "email_address": req.signer.email_address,
        }],
        "custom_fields": custom_fields,
        "test_mode": test_mode,
    })
}

pub fn parse_signature_request_response(root: &Value) -> EmbeddedSignatureResponse {
    let signature_request_id = root
        .pointer("/signature_request/signature_request_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let signature_ids = root
        .pointer("/signature_request/signatures")
        .and_then(Value::as_array)
        .map(|signatures| {
            signatures
                .iter()
                .map(|s| {
                    s.get("signature_id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default();
    EmbeddedSignatureResponse {
        signature_request_id,
        signature_ids,
    }
}

pub fn parse_sign_url_response(root: &Value) -> EmbeddedSignUrlResponse {
    EmbeddedSignUrlResponse {
        sign_url: root
            .pointer("/embedded/sign_url")
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string),
        expires_at: root.pointer("/embedded/expires_at").and_then(Value::as_u64),
    }
}

fn basic_auth_header(api_key: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{api_key}:")))
}

fn is_path_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn read_json(response: ureq::Response) -> Result<Value, EsignProviderError> {
    serde_json::from_reader(response.into_reader())
        .map_err(|_| EsignProviderError::new(PROVIDER, "json_parse", None))
}

fn build_http_agent(timeout_ms: Option<u32>, user_agent: &str) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new().user_agent(user_agent);
    if let Some(ms) = timeout_ms {
        let timeout = Duration::from_millis(u64::from(ms).max(100));
        builder = builder
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout);
    }
    builder.build()
}

fn provider_error_from_ureq(err: ureq::Error) -> EsignProviderError {
    let out = match err {
        ureq::Error::Status(status, _) => {
            EsignProviderError::new(PROVIDER, "http_non_200", Some(status))
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            EsignProviderError::new(PROVIDER, classify_transport_error_kind(&combined), None)
        }
    };
    debug!(detail = %out.safe_detail(), "e-sign provider call failed");
    out
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}
