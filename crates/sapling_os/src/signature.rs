#![forbid(unsafe_code)]

use std::env;
use std::sync::Mutex;

use sapling_engines::esign::EsignProvider;
use sapling_kernel_contracts::esign::{
    EmbeddedSignatureRequest, EsignCustomField, EsignSigner, SignatureId, SignatureTemplateId,
    ESIGN_PETITION_URL_FIELD, ESIGN_SIGNER_ROLE,
};
use sapling_kernel_contracts::petition::{Principal, Slug};
use sapling_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use sapling_storage::repo::{PetitionRepo, SignatureRequestRepo};
use tracing::{info, warn};
use url::Url;

use crate::PetitionError;

const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000/";
const CREATE_REQUEST_FAILED: &str = "unable to create signature request";
const CREATE_SIGN_URL_FAILED: &str = "unable to create sign url";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub template_id: Option<SignatureTemplateId>,
    pub public_base_url: Url,
}

impl SignatureConfig {
    pub fn from_env() -> Result<Self, ContractViolation> {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    pub fn from_env_var_map<F>(get: F) -> Result<Self, ContractViolation>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let template_id = non_empty("SAPLING_ESIGN_TEMPLATE_ID")
            .map(SignatureTemplateId::new)
            .transpose()?;
        let raw_base = non_empty("SAPLING_PUBLIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());
        let public_base_url = Url::parse(&raw_base)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or(ContractViolation::InvalidValue {
                field: "SAPLING_PUBLIC_BASE_URL",
                reason: "must be an absolute http(s) URL",
            })?;
        Ok(Self {
            template_id,
            public_base_url,
        })
    }

    /// Canonical public address of a petition: `{public_base_url}/s/{slug}`.
    pub fn petition_public_url(&self, slug: &Slug) -> Result<Url, PetitionError> {
        let mut base = self.public_base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(&format!("s/{}", slug.as_str()))
            .map_err(|_| PetitionError::Internal("unable to build petition url"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSignSession {
    pub embedded_sign_url: String,
    pub signature_id: SignatureId,
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SignatureOrchestrator {
    config: SignatureConfig,
}

impl SignatureOrchestrator {
    pub fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Opens a fresh embedded signing session for `principal` on the petition at `slug`.
    /// The store lock is only held for the lookup and the ref append, never across a
    /// provider call. Every invocation creates a new provider request.
    pub fn request_embedded_signature<S, P>(
        &self,
        store: &Mutex<S>,
        provider: &P,
        now: MonotonicTimeNs,
        principal: &Principal,
        slug: &Slug,
    ) -> Result<EmbeddedSignSession, PetitionError>
    where
        S: PetitionRepo + SignatureRequestRepo,
        P: EsignProvider + ?Sized,
    {
        let (email, name) = principal
            .signer_identity()
            .ok_or(PetitionError::Internal("principal is missing email or name"))?;

        let petition_id = {
            let guard = store
                .lock()
                .map_err(|_| PetitionError::Internal("petition store lock poisoned"))?;
            guard
                .petition_row_by_slug(slug)
                .map(|p| p.petition_id)
                .ok_or(PetitionError::NotFound)?
        };

        let template_id = self
            .config
            .template_id
            .clone()
            .ok_or(PetitionError::Internal("signature template is not configured"))?;
        let petition_url = self.config.petition_public_url(slug)?;
        let request = EmbeddedSignatureRequest::v1(
            template_id,
            EsignSigner {
                email_address: email.to_string(),
                name: name.to_string(),
                role: ESIGN_SIGNER_ROLE.to_string(),
            },
            vec![EsignCustomField {
                name: ESIGN_PETITION_URL_FIELD.to_string(),
                value: petition_url.to_string(),
            }],
        )?;

        let created = provider
            .create_embedded_signature_request(&request)
            .map_err(|e| {
                warn!(slug = %slug, detail = %e.safe_detail(), "signature request failed");
                PetitionError::integration(CREATE_REQUEST_FAILED, Some(e.safe_detail()))
            })?;
        let signature_id = created
            .first_signature_id()
            .and_then(|id| SignatureId::new(id).ok())
            .ok_or_else(|| {
                warn!(slug = %slug, "signature request response carried no signature id");
                PetitionError::integration(CREATE_REQUEST_FAILED, None)
            })?;

        {
            let mut guard = store
                .lock()
                .map_err(|_| PetitionError::Internal("petition store lock poisoned"))?;
            guard.append_signature_request_ref_row(
                now,
                petition_id,
                principal.user_id.clone(),
                created
                    .signature_request_id
                    .clone()
                    .filter(|id| !id.trim().is_empty()),
                signature_id.clone(),
            )?;
        }

        let minted = provider.mint_embedded_sign_url(&signature_id).map_err(|e| {
            warn!(slug = %slug, detail = %e.safe_detail(), "sign url request failed");
            PetitionError::integration(CREATE_SIGN_URL_FAILED, Some(e.safe_detail()))
        })?;
        let embedded_sign_url = minted
            .sign_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                warn!(slug = %slug, "sign url response carried no url");
                PetitionError::integration(CREATE_SIGN_URL_FAILED, None)
            })?;

        info!(
            slug = %slug,
            user = principal.user_id.as_str(),
            signature_id = signature_id.as_str(),
            "embedded signature session opened"
        );
        Ok(EmbeddedSignSession {
            embedded_sign_url,
            signature_id,
            expires_at: minted.expires_at,
        })
    }
}
