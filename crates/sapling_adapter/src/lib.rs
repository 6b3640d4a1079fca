#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use sapling_engines::esign::{DropboxSignClient, EsignProvider, EsignProviderConfig};
use sapling_kernel_contracts::petition::{
    PetitionCreateRequest, PetitionImageView, PetitionPrivilegedView, PetitionView, Principal,
    UserId,
};
use sapling_kernel_contracts::MonotonicTimeNs;
use sapling_os::petition_access::{parse_slug, PetitionAccessRuntime};
use sapling_os::petition_create::PetitionCreateRuntime;
use sapling_os::petition_images::PetitionImageRuntime;
use sapling_os::signature::{SignatureConfig, SignatureOrchestrator};
use sapling_os::PetitionError;
use sapling_storage::petition_store::PetitionStore;
use tracing::{info, warn};

pub mod http;

pub const PRINCIPAL_USER_ID_HEADER: &str = "x-sapling-user-id";
pub const PRINCIPAL_EMAIL_HEADER: &str = "x-sapling-user-email";
pub const PRINCIPAL_NAME_HEADER: &str = "x-sapling-user-name";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreatePetitionAdapterRequest {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CreatePetitionAdapterResponse {
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PetitionImageAdapterView {
    pub src: String,
    pub alt: Option<String>,
    pub position: u32,
}

impl From<&PetitionImageView> for PetitionImageAdapterView {
    fn from(v: &PetitionImageView) -> Self {
        Self {
            src: v.src.clone(),
            alt: v.alt.clone(),
            position: v.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PetitionAdapterResponse {
    pub slug: String,
    pub title: String,
    pub images: Vec<PetitionImageAdapterView>,
    pub main_image: Option<PetitionImageAdapterView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl From<&PetitionView> for PetitionAdapterResponse {
    fn from(v: &PetitionView) -> Self {
        Self {
            slug: v.slug().to_string(),
            title: v.title().to_string(),
            images: v.images().iter().map(PetitionImageAdapterView::from).collect(),
            main_image: v.main_image().map(PetitionImageAdapterView::from),
            body: v.body().map(str::to_string),
        }
    }
}

impl From<&PetitionPrivilegedView> for PetitionAdapterResponse {
    fn from(v: &PetitionPrivilegedView) -> Self {
        Self {
            slug: v.slug.to_string(),
            title: v.title.clone(),
            images: v.images.iter().map(PetitionImageAdapterView::from).collect(),
            main_image: v.main_image().map(PetitionImageAdapterView::from),
            body: v.body.clone(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LinkImageAdapterRequest {
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinkImageAdapterResponse {
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignatureAdapterResponse {
    pub embedded_sign_url: String,
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MyPetitionsAdapterResponse {
    pub petitions: Vec<PetitionAdapterResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub petition_count: u64,
    pub esign_template_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdapterErrorResponse {
    pub status: String,
    pub outcome: String,
    pub reason: String,
}

/// HTTP status for each failure class. Authorization misses are already folded into
/// `NotFound`, so nothing here produces 403.
pub fn http_status_for(err: &PetitionError) -> u16 {
    match err {
        PetitionError::Validation(_) => 400,
        PetitionError::Unauthenticated => 401,
        PetitionError::NotFound => 404,
        PetitionError::ConflictExhausted { .. } => 409,
        PetitionError::Integration { .. } => 502,
        PetitionError::Internal(_) | PetitionError::Store(_) => 500,
    }
}

pub fn error_response(err: &PetitionError) -> AdapterErrorResponse {
    let (outcome, reason) = match err {
        PetitionError::Validation(_) => ("INVALID", err.to_string()),
        PetitionError::Unauthenticated => ("UNAUTHENTICATED", err.to_string()),
        PetitionError::NotFound => ("NOT_FOUND", err.to_string()),
        PetitionError::ConflictExhausted { .. } => ("CONFLICT", err.to_string()),
        PetitionError::Integration { message, .. } => ("UPSTREAM_FAILED", message.to_string()),
        PetitionError::Internal(_) | PetitionError::Store(_) => {
            ("INTERNAL", "internal error".to_string())
        }
    };
    AdapterErrorResponse {
        status: "error".to_string(),
        outcome: outcome.to_string(),
        reason,
    }
}

/// Builds the caller principal from the trusted identity headers. No user id header
/// means an anonymous caller.
pub fn principal_from_headers<F>(get: F) -> Result<Option<Principal>, PetitionError>
where
    F: Fn(&str) -> Option<String>,
{
    let header = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let Some(user_id) = header(PRINCIPAL_USER_ID_HEADER) else {
        return Ok(None);
    };
    Ok(Some(Principal::new(
        UserId::new(user_id)?,
        header(PRINCIPAL_EMAIL_HEADER),
        header(PRINCIPAL_NAME_HEADER),
    )))
}

fn require_principal(principal: Option<&Principal>) -> Result<&Principal, PetitionError> {
    principal.ok_or(PetitionError::Unauthenticated)
}

pub struct AdapterRuntime {
    store: Arc<Mutex<PetitionStore>>,
    provider: Arc<dyn EsignProvider + Send + Sync>,
    create: PetitionCreateRuntime,
    access: PetitionAccessRuntime,
    images: PetitionImageRuntime,
    signature: SignatureOrchestrator,
}

impl AdapterRuntime {
    pub fn new(
        store: Arc<Mutex<PetitionStore>>,
        provider: Arc<dyn EsignProvider + Send + Sync>,
        signature_config: SignatureConfig,
    ) -> Self {
        Self {
            store,
            provider,
            create: PetitionCreateRuntime,
            access: PetitionAccessRuntime,
            images: PetitionImageRuntime,
            signature: SignatureOrchestrator::new(signature_config),
        }
    }

    pub fn default_from_env() -> Result<Self, String> {
        let esign_config = EsignProviderConfig::from_env();
        let missing = esign_config.missing_secrets();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|s| s.env_var()).collect();
            warn!(missing = ?names, "e-sign credentials not configured, signing will fail");
        }
        let signature_config = SignatureConfig::from_env()
            .map_err(|err| format!("invalid signature config: {err}"))?;
        if signature_config.template_id.is_none() {
            warn!("SAPLING_ESIGN_TEMPLATE_ID not set, signing will fail");
        }
        Ok(Self::new(
            Arc::new(Mutex::new(PetitionStore::new_in_memory())),
            Arc::new(DropboxSignClient::new(esign_config)),
            signature_config,
        ))
    }

    fn lock_store(&self) -> Result<std::sync::MutexGuard<'_, PetitionStore>, PetitionError> {
        self.store
            .lock()
            .map_err(|_| PetitionError::Internal("adapter store lock poisoned"))
    }

    pub fn create_petition(
        &self,
        principal: Option<&Principal>,
        request: CreatePetitionAdapterRequest,
    ) -> Result<CreatePetitionAdapterResponse, PetitionError> {
        let owner = require_principal(principal)?;
        let req = PetitionCreateRequest {
            title: request.title,
            body: request.body,
        };
        let mut store = self.lock_store()?;
        let out = self.create.create_petition(
            &mut *store,
            &mut rand::thread_rng(),
            MonotonicTimeNs(system_time_now_ns()),
            owner,
            &req,
        )?;
        Ok(CreatePetitionAdapterResponse {
            slug: out.slug.to_string(),
        })
    }

    pub fn get_petition(
        &self,
        slug: Option<&str>,
        principal: Option<&Principal>,
    ) -> Result<PetitionAdapterResponse, PetitionError> {
        let store = self.lock_store()?;
        let view = self.access.get_petition(&*store, slug, principal)?;
        Ok(PetitionAdapterResponse::from(&view))
    }

    pub fn my_petitions(
        &self,
        principal: Option<&Principal>,
    ) -> Result<MyPetitionsAdapterResponse, PetitionError> {
        let principal = require_principal(principal)?;
        let store = self.lock_store()?;
        let petitions = self
            .access
            .list_my_petitions(&*store, principal)
            .iter()
            .map(PetitionAdapterResponse::from)
            .collect();
        Ok(MyPetitionsAdapterResponse { petitions })
    }

    pub fn link_image(
        &self,
        principal: Option<&Principal>,
        slug: &str,
        request: LinkImageAdapterRequest,
    ) -> Result<LinkImageAdapterResponse, PetitionError> {
        let principal = require_principal(principal)?;
        let slug = parse_slug(Some(slug))?;
        let mut store = self.lock_store()?;
        let record = self.images.link_image(
            &mut *store,
            MonotonicTimeNs(system_time_now_ns()),
            principal,
            &slug,
            &request.src,
            request.alt.as_deref(),
        )?;
        Ok(LinkImageAdapterResponse {
            position: record.position,
        })
    }

    /// Blocks on two provider round trips. Async callers should run it on a blocking
    /// thread.
    pub fn request_signature(
        &self,
        principal: Option<&Principal>,
        slug: &str,
    ) -> Result<SignatureAdapterResponse, PetitionError> {
        let principal = require_principal(principal)?;
        let slug = parse_slug(Some(slug))?;
        let session = self.signature.request_embedded_signature(
            &*self.store,
            &*self.provider,
            MonotonicTimeNs(system_time_now_ns()),
            principal,
            &slug,
        )?;
        Ok(SignatureAdapterResponse {
            embedded_sign_url: session.embedded_sign_url,
            expires_at: session.expires_at,
        })
    }

    pub fn health_report(&self) -> Result<AdapterHealthResponse, PetitionError> {
        let store = self.lock_store()?;
        Ok(AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            petition_count: store.petition_count() as u64,
            esign_template_configured: self.signature.config().template_id.is_some(),
        })
    }
}

/// Logs a failed request at a level matching its class.
pub fn log_request_failure(route: &'static str, err: &PetitionError) {
    match err {
        PetitionError::Internal(_) | PetitionError::Store(_) | PetitionError::Integration { .. } => {
            warn!(route, error = %err, "request failed");
        }
        _ => info!(route, error = %err, "request rejected"),
    }
}

fn system_time_now_ns() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    if nanos > u64::MAX as u128 {
        u64::MAX
    } else {
        (nanos as u64).max(1)
    }
}
