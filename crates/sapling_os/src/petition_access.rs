#![forbid(unsafe_code)]

use sapling_kernel_contracts::petition::{
    PetitionImageView, PetitionPrivilegedView, PetitionPublicView, PetitionRecord, PetitionView,
    Principal, RoleName, Slug,
};
use sapling_kernel_contracts::ContractViolation;
use sapling_storage::repo::PetitionRepo;
use tracing::debug;

use crate::PetitionError;

fn image_views<S: PetitionRepo + ?Sized>(
    store: &S,
    petition: &PetitionRecord,
) -> Vec<PetitionImageView> {
    store
        .petition_image_rows(petition.petition_id)
        .into_iter()
        .map(PetitionImageView::from)
        .collect()
}

/// Parses a caller-supplied slug. A missing slug is a validation failure, not a miss.
pub fn parse_slug(raw: Option<&str>) -> Result<Slug, PetitionError> {
    let raw = raw.ok_or(PetitionError::Validation(ContractViolation::InvalidValue {
        field: "slug",
        reason: "must be present",
    }))?;
    Ok(Slug::new(raw)?)
}

#[derive(Debug, Default, Clone)]
pub struct PetitionAccessRuntime;

impl PetitionAccessRuntime {
    pub fn get_public<S: PetitionRepo + ?Sized>(
        &self,
        store: &S,
        slug: &Slug,
    ) -> Result<PetitionPublicView, PetitionError> {
        let petition = store
            .petition_row_by_slug(slug)
            .ok_or(PetitionError::NotFound)?;
        Ok(PetitionPublicView::new(petition, image_views(store, petition)))
    }

    /// Privileged projection for admins of the petition. A petition the caller may not
    /// administer is reported exactly like a missing one.
    pub fn get_for_principal<S: PetitionRepo + ?Sized>(
        &self,
        store: &S,
        principal: &Principal,
        slug: &Slug,
    ) -> Result<PetitionPrivilegedView, PetitionError> {
        let petition = store
            .petition_row_by_slug_for_member(slug, &principal.user_id, RoleName::Admin)
            .ok_or(PetitionError::NotFound)?;
        Ok(PetitionPrivilegedView::new(
            petition,
            image_views(store, petition),
        ))
    }

    pub fn get_petition<S: PetitionRepo + ?Sized>(
        &self,
        store: &S,
        slug: Option<&str>,
        principal: Option<&Principal>,
    ) -> Result<PetitionView, PetitionError> {
        let slug = parse_slug(slug)?;
        if let Some(principal) = principal {
            match self.get_for_principal(store, principal, &slug) {
                Ok(view) => return Ok(PetitionView::Privileged(view)),
                Err(PetitionError::NotFound) => {
                    debug!(slug = %slug, "no admin membership, serving public projection");
                }
                Err(err) => return Err(err),
            }
        }
        self.get_public(store, &slug).map(PetitionView::Public)
    }

    /// Every petition the caller administers, oldest first.
    pub fn list_my_petitions<S: PetitionRepo + ?Sized>(
        &self,
        store: &S,
        principal: &Principal,
    ) -> Vec<PetitionPrivilegedView> {
        store
            .petition_rows_for_member(&principal.user_id, RoleName::Admin)
            .into_iter()
            .map(|p| PetitionPrivilegedView::new(p, image_views(store, p)))
            .collect()
    }
}
