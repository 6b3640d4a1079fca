#![forbid(unsafe_code)]

use sapling_kernel_contracts::petition::{has_role, PetitionImageRecord, Principal, RoleName, Slug};
use sapling_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use sapling_storage::repo::PetitionRepo;
use tracing::info;
use url::Url;

use crate::PetitionError;

fn validate_image_src(src: &str) -> Result<Url, PetitionError> {
    let invalid = PetitionError::Validation(ContractViolation::InvalidValue {
        field: "petition_image.src",
        reason: "must be an absolute http(s) URL",
    });
    let url = Url::parse(src.trim()).map_err(|_| invalid.clone())?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(invalid),
    }
}

#[derive(Debug, Default, Clone)]
pub struct PetitionImageRuntime;

impl PetitionImageRuntime {
    /// Appends an already-uploaded image to the petition. Only admins may link images;
    /// everyone else gets `NotFound`.
    pub fn link_image<S: PetitionRepo + ?Sized>(
        &self,
        store: &mut S,
        now: MonotonicTimeNs,
        principal: &Principal,
        slug: &Slug,
        src: &str,
        alt: Option<&str>,
    ) -> Result<PetitionImageRecord, PetitionError> {
        let src = validate_image_src(src)?;
        let petition = store
            .petition_row_by_slug(slug)
            .ok_or(PetitionError::NotFound)?;
        let authorized = has_role(
            &principal.user_id,
            petition,
            RoleName::Admin,
            store.membership_rows_for_user(&principal.user_id),
        );
        if !authorized {
            return Err(PetitionError::NotFound);
        }

        let alt = alt
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let record = store.append_petition_image_row(now, slug, src.into(), alt)?;
        info!(slug = %slug, position = record.position, "petition image linked");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use sapling_kernel_contracts::petition::{PetitionPublicView, UserId, UserRecord};
    use sapling_storage::petition_store::PetitionStore;

    use super::*;
    use crate::petition_access::PetitionAccessRuntime;

    fn principal(id: &str) -> Principal {
        Principal::new(UserId::new(id).unwrap(), None, None)
    }

    fn store_with_petition(owner: &Principal, slug: &str) -> PetitionStore {
        let mut store = PetitionStore::new_in_memory();
        store
            .upsert_user(UserRecord::from_principal(owner).unwrap())
            .unwrap();
        store
            .create_petition_with_owner(
                MonotonicTimeNs(1),
                Slug::new(slug).unwrap(),
                "Parks".to_string(),
                None,
                &owner.user_id,
            )
            .unwrap();
        store
    }

    #[test]
    fn at_images_01_three_uploads_get_positions_one_two_three() {
        let alice = principal("alice");
        let mut store = store_with_petition(&alice, "parks");
        let slug = Slug::new("parks").unwrap();
        let rt = PetitionImageRuntime;

        let positions: Vec<u32> = (1..=3)
            .map(|i| {
                rt.link_image(
                    &mut store,
                    MonotonicTimeNs(10 + i),
                    &alice,
                    &slug,
                    &format!("https://cdn.example.com/img/{i}.png"),
                    Some("a photo"),
                )
                .unwrap()
                .position
            })
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);

        let view: PetitionPublicView = PetitionAccessRuntime.get_public(&store, &slug).unwrap();
        let main = view.main_image().unwrap();
        assert_eq!(main.position, 3);
        assert_eq!(main.src, "https://cdn.example.com/img/3.png");
    }

    #[test]
    fn at_images_02_non_admin_gets_not_found_and_nothing_is_written() {
        let alice = principal("alice");
        let mut store = store_with_petition(&alice, "parks");
        let slug = Slug::new("parks").unwrap();

        let out = PetitionImageRuntime.link_image(
            &mut store,
            MonotonicTimeNs(2),
            &principal("bob"),
            &slug,
            "https://cdn.example.com/x.png",
            None,
        );
        assert_eq!(out, Err(PetitionError::NotFound));
        assert!(store.petition_images(store.petition_by_slug(&slug).unwrap().petition_id).is_empty());
    }

    #[test]
    fn at_images_03_rejects_non_http_sources() {
        let alice = principal("alice");
        let mut store = store_with_petition(&alice, "parks");
        let slug = Slug::new("parks").unwrap();
        for src in ["not a url", "ftp://cdn.example.com/x.png", "javascript:alert(1)"] {
            let out = PetitionImageRuntime.link_image(
                &mut store,
                MonotonicTimeNs(2),
                &alice,
                &slug,
                src,
                None,
            );
            assert!(matches!(out, Err(PetitionError::Validation(_))), "{src}");
        }
    }

    #[test]
    fn at_images_04_blank_alt_is_dropped() {
        let alice = principal("alice");
        let mut store = store_with_petition(&alice, "parks");
        let record = PetitionImageRuntime
            .link_image(
                &mut store,
                MonotonicTimeNs(2),
                &alice,
                &Slug::new("parks").unwrap(),
                "https://cdn.example.com/x.png",
                Some("   "),
            )
            .unwrap();
        assert_eq!(record.alt, None);
    }
}
