#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use sapling_kernel_contracts::esign::{SignatureId, SignatureRequestRefRecord};
use sapling_kernel_contracts::petition::{
    has_role, MembershipRecord, PetitionId, PetitionImageRecord, PetitionRecord, RoleId,
    RoleName, RoleRecord, Slug, UserId, UserRecord,
};
use sapling_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};

/// Unique key guarding petition addresses. A `DuplicateKey` on this table is the only
/// storage failure the slug allocator treats as retryable.
pub const PETITIONS_SLUG_KEY: &str = "petitions.slug";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("foreign key violation on {table}: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },
    #[error("duplicate key on {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
}

impl StorageError {
    pub fn is_duplicate_slug(&self) -> bool {
        matches!(
            self,
            StorageError::DuplicateKey { table, .. } if *table == PETITIONS_SLUG_KEY
        )
    }
}

/// In-memory petition store. Every write is a single `&mut self` call, so each one is
/// an atomic unit against concurrent callers sharing the store behind a lock.
#[derive(Debug, Clone)]
pub struct PetitionStore {
    users: BTreeMap<UserId, UserRecord>,
    roles: BTreeMap<RoleName, RoleRecord>,

    petitions: BTreeMap<PetitionId, PetitionRecord>,
    // Unique index: slug -> petition. Source of truth for address collisions.
    petition_by_slug: BTreeMap<Slug, PetitionId>,

    // (petition_id, position) -> image. Key order doubles as position order.
    petition_images: BTreeMap<(PetitionId, u32), PetitionImageRecord>,

    // Append-only; no revoke path exists.
    memberships: Vec<MembershipRecord>,
    membership_index: BTreeSet<(UserId, PetitionId, RoleId)>,

    signature_request_refs: Vec<SignatureRequestRefRecord>,

    next_petition_id: u64,
    next_role_id: u64,
    next_signature_request_ref_id: u64,
}

impl Default for PetitionStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl PetitionStore {
    pub fn new_in_memory() -> Self {
        Self {
            users: BTreeMap::new(),
            roles: BTreeMap::new(),
            petitions: BTreeMap::new(),
            petition_by_slug: BTreeMap::new(),
            petition_images: BTreeMap::new(),
            memberships: Vec::new(),
            membership_index: BTreeSet::new(),
            signature_request_refs: Vec::new(),
            next_petition_id: 1,
            next_role_id: 1,
            next_signature_request_ref_id: 1,
        }
    }

    /// Mirrors the identity collaborator's user record. Later calls refresh email/name.
    pub fn upsert_user(&mut self, record: UserRecord) -> Result<(), StorageError> {
        record.validate()?;
        self.users.insert(record.user_id.clone(), record);
        Ok(())
    }

    /// Create-or-reuse the role row. Safe to call any number of times: the first call
    /// allocates the id, every later call returns the same id and writes nothing.
    pub fn ensure_role(&mut self, name: RoleName) -> RoleId {
        if let Some(existing) = self.roles.get(&name) {
            return existing.role_id;
        }
        let role_id = RoleId(self.next_role_id);
        self.next_role_id = self.next_role_id.saturating_add(1);
        self.roles.insert(name, RoleRecord { role_id, name });
        role_id
    }

    pub fn role(&self, name: RoleName) -> Option<&RoleRecord> {
        self.roles.get(&name)
    }

    /// Inserts the petition and its owner's admin membership together. Fails with
    /// `DuplicateKey { table: PETITIONS_SLUG_KEY }` when the slug is taken; nothing is
    /// written on any failure.
    pub fn create_petition_with_owner(
        &mut self,
        now: MonotonicTimeNs,
        slug: Slug,
        title: String,
        body: Option<String>,
        owner_user_id: &UserId,
    ) -> Result<PetitionRecord, StorageError> {
        let petition_id = PetitionId(self.next_petition_id);
        let record = PetitionRecord::v1(petition_id, slug, title, body, now)?;

        if self.petition_by_slug.contains_key(&record.slug) {
            return Err(StorageError::DuplicateKey {
                table: PETITIONS_SLUG_KEY,
                key: record.slug.as_str().to_string(),
            });
        }
        if !self.users.contains_key(owner_user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "user_petition_roles.user_id",
                key: owner_user_id.as_str().to_string(),
            });
        }

        let role = RoleRecord {
            role_id: self.ensure_role(RoleName::Admin),
            name: RoleName::Admin,
        };
        let membership = MembershipRecord::v1(owner_user_id.clone(), petition_id, &role, now)?;

        self.next_petition_id = self.next_petition_id.saturating_add(1);
        self.petition_by_slug
            .insert(record.slug.clone(), petition_id);
        self.petitions.insert(petition_id, record.clone());
        self.membership_index
            .insert((owner_user_id.clone(), petition_id, role.role_id));
        self.memberships.push(membership);
        Ok(record)
    }

    pub fn petition_by_slug(&self, slug: &Slug) -> Option<&PetitionRecord> {
        self.petition_by_slug
            .get(slug)
            .and_then(|id| self.petitions.get(id))
    }

    /// Same lookup as `petition_by_slug`, filtered by a membership join.
    pub fn petition_by_slug_for_member(
        &self,
        slug: &Slug,
        user_id: &UserId,
        role: RoleName,
    ) -> Option<&PetitionRecord> {
        let petition = self.petition_by_slug(slug)?;
        has_role(
            user_id,
            petition,
            role,
            self.memberships_for_petition(petition.petition_id),
        )
        .then_some(petition)
    }

    pub fn petition_count(&self) -> usize {
        self.petitions.len()
    }

    pub fn petition_images(&self, petition_id: PetitionId) -> Vec<&PetitionImageRecord> {
        self.petition_images
            .range((petition_id, 0)..=(petition_id, u32::MAX))
            .map(|(_, r)| r)
            .collect()
    }

    /// Reads the petition's last image position and inserts at `last + 1` in the same
    /// call. The first image gets position 1.
    pub fn append_petition_image(
        &mut self,
        now: MonotonicTimeNs,
        slug: &Slug,
        src: String,
        alt: Option<String>,
    ) -> Result<PetitionImageRecord, StorageError> {
        let petition_id = self
            .petition_by_slug
            .get(slug)
            .copied()
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "petition_images.petition_slug",
                key: slug.as_str().to_string(),
            })?;

        let last_position = self
            .petition_images
            .range((petition_id, 0)..=(petition_id, u32::MAX))
            .next_back()
            .map(|((_, position), _)| *position)
            .unwrap_or(0);
        let position = last_position.checked_add(1).ok_or(
            StorageError::ContractViolation(ContractViolation::InvalidValue {
                field: "petition_images.position",
                reason: "position space exhausted",
            }),
        )?;

        let record = PetitionImageRecord::v1(petition_id, position, src, alt, now)?;
        if self.petition_images.contains_key(&(petition_id, position)) {
            return Err(StorageError::DuplicateKey {
                table: "petition_images.position",
                key: format!("{}:{}", petition_id.0, position),
            });
        }
        self.petition_images
            .insert((petition_id, position), record.clone());
        Ok(record)
    }

    pub fn memberships_for_petition(&self, petition_id: PetitionId) -> Vec<&MembershipRecord> {
        self.memberships
            .iter()
            .filter(|m| m.petition_id == petition_id)
            .collect()
    }

    pub fn memberships_for_user(&self, user_id: &UserId) -> Vec<&MembershipRecord> {
        self.memberships
            .iter()
            .filter(|m| &m.user_id == user_id)
            .collect()
    }

    /// Petitions where `user_id` holds `role`, in creation order.
    pub fn petitions_for_member(&self, user_id: &UserId, role: RoleName) -> Vec<&PetitionRecord> {
        let role_id = match self.roles.get(&role) {
            Some(r) => r.role_id,
            None => return Vec::new(),
        };
        self.petitions
            .values()
            .filter(|p| {
                self.membership_index
                    .contains(&(user_id.clone(), p.petition_id, role_id))
            })
            .collect()
    }

    pub fn append_signature_request_ref(
        &mut self,
        now: MonotonicTimeNs,
        petition_id: PetitionId,
        user_id: UserId,
        signature_request_id: Option<String>,
        signature_id: SignatureId,
    ) -> Result<u64, StorageError> {
        if !self.petitions.contains_key(&petition_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "signature_request_refs.petition_id",
                key: petition_id.0.to_string(),
            });
        }
        let ref_id = self.next_signature_request_ref_id;
        let record = SignatureRequestRefRecord::v1(
            ref_id,
            petition_id,
            user_id,
            signature_request_id,
            signature_id,
            now,
        )?;
        self.next_signature_request_ref_id = self.next_signature_request_ref_id.saturating_add(1);
        self.signature_request_refs.push(record);
        Ok(ref_id)
    }

    pub fn signature_request_refs(&self) -> &[SignatureRequestRefRecord] {
        &self.signature_request_refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store(user: &str) -> (PetitionStore, UserId) {
        let mut s = PetitionStore::new_in_memory();
        let user_id = UserId::new(user).unwrap();
        s.upsert_user(UserRecord::v1(user_id.clone(), None, None).unwrap())
            .unwrap();
        (s, user_id)
    }

    #[test]
    fn ensure_role_is_idempotent() {
        let mut s = PetitionStore::new_in_memory();
        let first = s.ensure_role(RoleName::Admin);
        let second = s.ensure_role(RoleName::Admin);
        assert_eq!(first, second);
        assert_eq!(s.roles.len(), 1);
    }

    #[test]
    fn duplicate_slug_reports_petitions_slug_key() {
        let (mut s, owner) = seeded_store("owner");
        let slug = Slug::new("save-the-park").unwrap();
        s.create_petition_with_owner(MonotonicTimeNs(1), slug.clone(), "t".into(), None, &owner)
            .unwrap();
        let err = s
            .create_petition_with_owner(MonotonicTimeNs(2), slug, "t".into(), None, &owner)
            .unwrap_err();
        assert!(err.is_duplicate_slug());
        assert_eq!(s.petition_count(), 1);
        assert_eq!(s.memberships.len(), 1);
    }

    #[test]
    fn unknown_owner_writes_nothing() {
        let mut s = PetitionStore::new_in_memory();
        let ghost = UserId::new("ghost").unwrap();
        let err = s
            .create_petition_with_owner(
                MonotonicTimeNs(1),
                Slug::new("a").unwrap(),
                "A".into(),
                None,
                &ghost,
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::ForeignKeyViolation { .. }));
        assert!(!err.is_duplicate_slug());
        assert_eq!(s.petition_count(), 0);
        assert!(s.memberships.is_empty());
    }
}
