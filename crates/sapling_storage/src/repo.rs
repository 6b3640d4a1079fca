#![forbid(unsafe_code)]

use sapling_kernel_contracts::esign::{SignatureId, SignatureRequestRefRecord};
use sapling_kernel_contracts::petition::{
    MembershipRecord, PetitionId, PetitionImageRecord, PetitionRecord, RoleId, RoleName, Slug,
    UserId, UserRecord,
};
use sapling_kernel_contracts::MonotonicTimeNs;

use crate::petition_store::{PetitionStore, StorageError};

/// Typed repository interface for petition, image, user and membership tables.
pub trait PetitionRepo {
    fn upsert_user_row(&mut self, record: UserRecord) -> Result<(), StorageError>;
    fn ensure_role_row(&mut self, name: RoleName) -> RoleId;

    fn create_petition_with_owner_row(
        &mut self,
        now: MonotonicTimeNs,
        slug: Slug,
        title: String,
        body: Option<String>,
        owner_user_id: &UserId,
    ) -> Result<PetitionRecord, StorageError>;

    fn append_petition_image_row(
        &mut self,
        now: MonotonicTimeNs,
        slug: &Slug,
        src: String,
        alt: Option<String>,
    ) -> Result<PetitionImageRecord, StorageError>;

    fn petition_row_by_slug(&self, slug: &Slug) -> Option<&PetitionRecord>;
    fn petition_row_by_slug_for_member(
        &self,
        slug: &Slug,
        user_id: &UserId,
        role: RoleName,
    ) -> Option<&PetitionRecord>;
    fn petition_image_rows(&self, petition_id: PetitionId) -> Vec<&PetitionImageRecord>;
    fn membership_rows_for_user(&self, user_id: &UserId) -> Vec<&MembershipRecord>;
    fn petition_rows_for_member(&self, user_id: &UserId, role: RoleName) -> Vec<&PetitionRecord>;
}

/// Typed repository interface for the append-only signature request reference ledger.
pub trait SignatureRequestRepo {
    fn append_signature_request_ref_row(
        &mut self,
        now: MonotonicTimeNs,
        petition_id: PetitionId,
        user_id: UserId,
        signature_request_id: Option<String>,
        signature_id: SignatureId,
    ) -> Result<u64, StorageError>;
    fn signature_request_ref_rows(&self) -> &[SignatureRequestRefRecord];
}

impl PetitionRepo for PetitionStore {
    fn upsert_user_row(&mut self, record: UserRecord) -> Result<(), StorageError> {
        self.upsert_user(record)
    }

    fn ensure_role_row(&mut self, name: RoleName) -> RoleId {
        self.ensure_role(name)
    }

    fn create_petition_with_owner_row(
        &mut self,
        now: MonotonicTimeNs,
        slug: Slug,
        title: String,
        body: Option<String>,
        owner_user_id: &UserId,
    ) -> Result<PetitionRecord, StorageError> {
        self.create_petition_with_owner(now, slug, title, body, owner_user_id)
    }

    fn append_petition_image_row(
        &mut self,
        now: MonotonicTimeNs,
        slug: &Slug,
        src: String,
        alt: Option<String>,
    ) -> Result<PetitionImageRecord, StorageError> {
        self.append_petition_image(now, slug, src, alt)
    }

    fn petition_row_by_slug(&self, slug: &Slug) -> Option<&PetitionRecord> {
        self.petition_by_slug(slug)
    }

    fn petition_row_by_slug_for_member(
        &self,
        slug: &Slug,
        user_id: &UserId,
        role: RoleName,
    ) -> Option<&PetitionRecord> {
        self.petition_by_slug_for_member(slug, user_id, role)
    }

    fn petition_image_rows(&self, petition_id: PetitionId) -> Vec<&PetitionImageRecord> {
        self.petition_images(petition_id)
    }

    fn membership_rows_for_user(&self, user_id: &UserId) -> Vec<&MembershipRecord> {
        self.memberships_for_user(user_id)
    }

    fn petition_rows_for_member(&self, user_id: &UserId, role: RoleName) -> Vec<&PetitionRecord> {
        self.petitions_for_member(user_id, role)
    }
}

impl SignatureRequestRepo for PetitionStore {
    fn append_signature_request_ref_row(
        &mut self,
        now: MonotonicTimeNs,
        petition_id: PetitionId,
        user_id: UserId,
        signature_request_id: Option<String>,
        signature_id: SignatureId,
    ) -> Result<u64, StorageError> {
        self.append_signature_request_ref(
            now,
            petition_id,
            user_id,
            signature_request_id,
            signature_id,
        )
    }

    fn signature_request_ref_rows(&self) -> &[SignatureRequestRefRecord] {
        self.signature_request_refs()
    }
}
