#![forbid(unsafe_code)]

use rand::Rng;
use sapling_engines::slug::{allocate_slug, CreateOutcome};
use sapling_kernel_contracts::petition::{
    PetitionCreateRequest, PetitionId, Principal, Slug, UserRecord,
};
use sapling_kernel_contracts::{MonotonicTimeNs, Validate};
use sapling_storage::repo::PetitionRepo;
use tracing::info;

use crate::PetitionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionCreateResult {
    pub petition_id: PetitionId,
    pub slug: Slug,
}

#[derive(Debug, Default, Clone)]
pub struct PetitionCreateRuntime;

impl PetitionCreateRuntime {
    /// Creates the petition and the owner's admin membership. The slug comes from the
    /// title; collisions are detected only by the store's unique insert.
    pub fn create_petition<S, R>(
        &self,
        store: &mut S,
        rng: &mut R,
        now: MonotonicTimeNs,
        owner: &Principal,
        req: &PetitionCreateRequest,
    ) -> Result<PetitionCreateResult, PetitionError>
    where
        S: PetitionRepo + ?Sized,
        R: Rng + ?Sized,
    {
        req.validate()?;
        store.upsert_user_row(UserRecord::from_principal(owner)?)?;

        let (slug, record) = allocate_slug(&req.title, rng, |candidate| {
            match store.create_petition_with_owner_row(
                now,
                candidate.clone(),
                req.title.clone(),
                req.body.clone(),
                &owner.user_id,
            ) {
                Ok(record) => CreateOutcome::Created(record),
                Err(err) if err.is_duplicate_slug() => CreateOutcome::Conflict,
                Err(err) => CreateOutcome::Failed(err),
            }
        })?;

        info!(
            slug = %slug,
            petition_id = record.petition_id.0,
            owner = owner.user_id.as_str(),
            "petition created"
        );
        Ok(PetitionCreateResult {
            petition_id: record.petition_id,
            slug,
        })
    }
}
