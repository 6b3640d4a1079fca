#![forbid(unsafe_code)]

use crate::common::{validate_id, validate_text};
use crate::petition::{PetitionId, UserId};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const ESIGN_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Role label every petition template declares for its single signer.
pub const ESIGN_SIGNER_ROLE: &str = "Signer";
/// Template custom field that carries the petition's public URL.
pub const ESIGN_PETITION_URL_FIELD: &str = "petition_url";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureTemplateId(String);

impl SignatureTemplateId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SignatureTemplateId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("signature_template_id", &self.0, 128)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureId(String);

impl SignatureId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SignatureId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("signature_id", &self.0, 128)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsignSigner {
    pub email_address: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsignCustomField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSignatureRequest {
    pub schema_version: SchemaVersion,
    pub template_id: SignatureTemplateId,
    pub signer: EsignSigner,
    pub custom_fields: Vec<EsignCustomField>,
}

impl EmbeddedSignatureRequest {
    pub fn v1(
        template_id: SignatureTemplateId,
        signer: EsignSigner,
        custom_fields: Vec<EsignCustomField>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ESIGN_CONTRACT_VERSION,
            template_id,
            signer,
            custom_fields,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for EmbeddedSignatureRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ESIGN_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "embedded_signature_request.schema_version",
                reason: "must match ESIGN_CONTRACT_VERSION",
            });
        }
        self.template_id.validate()?;
        validate_text(
            "embedded_signature_request.signer.email_address",
            &self.signer.email_address,
            320,
        )?;
        validate_text("embedded_signature_request.signer.name", &self.signer.name, 256)?;
        validate_text("embedded_signature_request.signer.role", &self.signer.role, 64)?;
        for field in &self.custom_fields {
            validate_text("embedded_signature_request.custom_fields.name", &field.name, 64)?;
            validate_text(
                "embedded_signature_request.custom_fields.value",
                &field.value,
                2_048,
            )?;
        }
        Ok(())
    }
}

/// Provider answer to a create call. Entries mirror the provider's signer list; any of
/// them may lack an id when the provider response is partial.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmbeddedSignatureResponse {
    pub signature_request_id: Option<String>,
    pub signature_ids: Vec<Option<String>>,
}

impl EmbeddedSignatureResponse {
    pub fn first_signature_id(&self) -> Option<&str> {
        self.signature_ids
            .first()
            .and_then(|id| id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmbeddedSignUrlResponse {
    pub sign_url: Option<String>,
    pub expires_at: Option<u64>,
}

/// Persistence-hook row: one per signature id handed out by the provider. The request
/// id is kept when the provider returned one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRequestRefRecord {
    pub schema_version: SchemaVersion,
    pub ref_id: u64,
    pub petition_id: PetitionId,
    pub user_id: UserId,
    pub signature_request_id: Option<String>,
    pub signature_id: SignatureId,
    pub created_at: MonotonicTimeNs,
}

impl SignatureRequestRefRecord {
    pub fn v1(
        ref_id: u64,
        petition_id: PetitionId,
        user_id: UserId,
        signature_request_id: Option<String>,
        signature_id: SignatureId,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ESIGN_CONTRACT_VERSION,
            ref_id,
            petition_id,
            user_id,
            signature_request_id,
            signature_id,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SignatureRequestRefRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ESIGN_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "signature_request_ref_record.schema_version",
                reason: "must match ESIGN_CONTRACT_VERSION",
            });
        }
        self.user_id.validate()?;
        self.signature_id.validate()?;
        if let Some(request_id) = &self.signature_request_id {
            validate_id(
                "signature_request_ref_record.signature_request_id",
                request_id,
                128,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> EsignSigner {
        EsignSigner {
            email_address: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            role: ESIGN_SIGNER_ROLE.to_string(),
        }
    }

    #[test]
    fn request_rejects_blank_signer_email() {
        let mut s = signer();
        s.email_address = " ".to_string();
        let res = EmbeddedSignatureRequest::v1(
            SignatureTemplateId::new("tpl_1").unwrap(),
            s,
            Vec::new(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn first_signature_id_ignores_later_entries() {
        let resp = EmbeddedSignatureResponse {
            signature_request_id: Some("req_1".to_string()),
            signature_ids: vec![None, Some("sig_2".to_string())],
        };
        assert_eq!(resp.first_signature_id(), None);

        let resp = EmbeddedSignatureResponse {
            signature_request_id: None,
            signature_ids: vec![Some("sig_1".to_string()), Some("sig_2".to_string())],
        };
        assert_eq!(resp.first_signature_id(), Some("sig_1"));
    }

    #[test]
    fn signature_ref_rejects_blank_request_id() {
        let ok = SignatureRequestRefRecord::v1(
            1,
            PetitionId(1),
            UserId::new("u1").unwrap(),
            Some("req_1".to_string()),
            SignatureId::new("sig_1").unwrap(),
            MonotonicTimeNs(1),
        );
        assert!(ok.is_ok());
        let blank = SignatureRequestRefRecord::v1(
            1,
            PetitionId(1),
            UserId::new("u1").unwrap(),
            Some("  ".to_string()),
            SignatureId::new("sig_1").unwrap(),
            MonotonicTimeNs(1),
        );
        assert!(blank.is_err());
    }
}
