#![forbid(unsafe_code)]

use sapling_kernel_contracts::petition::{RoleName, Slug, UserId, UserRecord};
use sapling_kernel_contracts::MonotonicTimeNs;
use sapling_storage::petition_store::{PetitionStore, StorageError, PETITIONS_SLUG_KEY};
use sapling_storage::repo::PetitionRepo;

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn slug(s: &str) -> Slug {
    Slug::new(s).unwrap()
}

fn seed_user(store: &mut PetitionStore, user_id: &UserId) {
    store
        .upsert_user_row(
            UserRecord::v1(
                user_id.clone(),
                Some(format!("{}@example.com", user_id.as_str())),
                Some(user_id.as_str().to_string()),
            )
            .unwrap(),
        )
        .unwrap();
}

#[test]
fn at_petition_db_01_slug_unique_key_enforced() {
    let mut s = PetitionStore::new_in_memory();
    let owner = user("owner_1");
    seed_user(&mut s, &owner);

    s.create_petition_with_owner_row(
        MonotonicTimeNs(10),
        slug("save-the-park"),
        "Save the Park!!".to_string(),
        None,
        &owner,
    )
    .unwrap();

    let dup = s.create_petition_with_owner_row(
        MonotonicTimeNs(11),
        slug("save-the-park"),
        "Save the Park".to_string(),
        None,
        &owner,
    );
    assert!(matches!(
        dup,
        Err(StorageError::DuplicateKey { table, .. }) if table == PETITIONS_SLUG_KEY
    ));
    assert_eq!(s.petition_count(), 1);
}

#[test]
fn at_petition_db_02_petition_and_admin_membership_created_together() {
    let mut s = PetitionStore::new_in_memory();
    let owner = user("owner_1");
    seed_user(&mut s, &owner);

    let rec = s
        .create_petition_with_owner_row(
            MonotonicTimeNs(10),
            slug("clean-rivers"),
            "Clean Rivers".to_string(),
            Some("First paragraph.\n\nSecond paragraph.".to_string()),
            &owner,
        )
        .unwrap();

    let memberships = s.membership_rows_for_user(&owner);
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].petition_id, rec.petition_id);
    assert_eq!(memberships[0].role_name, RoleName::Admin);
    assert_eq!(
        Some(memberships[0].role_id),
        s.role(RoleName::Admin).map(|r| r.role_id)
    );
}

#[test]
fn at_petition_db_03_member_lookup_is_scoped_to_petition_and_user() {
    let mut s = PetitionStore::new_in_memory();
    let alice = user("alice");
    let bob = user("bob");
    seed_user(&mut s, &alice);
    seed_user(&mut s, &bob);

    s.create_petition_with_owner_row(
        MonotonicTimeNs(1),
        slug("alice-petition"),
        "Alice Petition".to_string(),
        None,
        &alice,
    )
    .unwrap();
    s.create_petition_with_owner_row(
        MonotonicTimeNs(2),
        slug("bob-petition"),
        "Bob Petition".to_string(),
        None,
        &bob,
    )
    .unwrap();

    assert!(s
        .petition_row_by_slug_for_member(&slug("alice-petition"), &alice, RoleName::Admin)
        .is_some());
    assert!(s
        .petition_row_by_slug_for_member(&slug("bob-petition"), &alice, RoleName::Admin)
        .is_none());
    assert!(s
        .petition_row_by_slug_for_member(&slug("missing"), &alice, RoleName::Admin)
        .is_none());
    assert!(s.petition_row_by_slug(&slug("bob-petition")).is_some());
}

#[test]
fn at_petition_db_04_image_positions_are_sequential_per_petition() {
    let mut s = PetitionStore::new_in_memory();
    let owner = user("owner_1");
    seed_user(&mut s, &owner);
    let a = s
        .create_petition_with_owner_row(MonotonicTimeNs(1), slug("a"), "A".into(), None, &owner)
        .unwrap();
    let b = s
        .create_petition_with_owner_row(MonotonicTimeNs(2), slug("b"), "B".into(), None, &owner)
        .unwrap();

    for (i, src) in ["https://img/a1", "https://img/a2", "https://img/a3"]
        .iter()
        .enumerate()
    {
        let img = s
            .append_petition_image_row(
                MonotonicTimeNs(10 + i as u64),
                &slug("a"),
                src.to_string(),
                None,
            )
            .unwrap();
        assert_eq!(img.position, i as u32 + 1);
    }
    let first_b = s
        .append_petition_image_row(MonotonicTimeNs(20), &slug("b"), "https://img/b1".into(), None)
        .unwrap();
    assert_eq!(first_b.position, 1);

    let positions: Vec<u32> = s
        .petition_image_rows(a.petition_id)
        .iter()
        .map(|r| r.position)
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);
    assert_eq!(s.petition_image_rows(b.petition_id).len(), 1);
}

#[test]
fn at_petition_db_05_image_for_unknown_petition_is_rejected() {
    let mut s = PetitionStore::new_in_memory();
    let out = s.append_petition_image_row(
        MonotonicTimeNs(1),
        &slug("nope"),
        "https://img/1".into(),
        None,
    );
    assert!(matches!(out, Err(StorageError::ForeignKeyViolation { .. })));
}

#[test]
fn at_petition_db_06_member_petitions_listed_in_creation_order() {
    let mut s = PetitionStore::new_in_memory();
    let alice = user("alice");
    let bob = user("bob");
    seed_user(&mut s, &alice);
    seed_user(&mut s, &bob);
    for (i, name) in ["first", "second", "third"].iter().enumerate() {
        s.create_petition_with_owner_row(
            MonotonicTimeNs(i as u64 + 1),
            slug(name),
            name.to_string(),
            None,
            &alice,
        )
        .unwrap();
    }
    s.create_petition_with_owner_row(MonotonicTimeNs(9), slug("other"), "x".into(), None, &bob)
        .unwrap();

    let mine: Vec<&str> = s
        .petition_rows_for_member(&alice, RoleName::Admin)
        .iter()
        .map(|p| p.slug.as_str())
        .collect();
    assert_eq!(mine, vec!["first", "second", "third"]);
}

#[test]
fn at_petition_db_07_ensure_role_reuses_existing_row() {
    let mut s = PetitionStore::new_in_memory();
    let owner = user("owner_1");
    seed_user(&mut s, &owner);
    let pre = s.ensure_role_row(RoleName::Admin);
    s.create_petition_with_owner_row(MonotonicTimeNs(1), slug("x"), "X".into(), None, &owner)
        .unwrap();
    assert_eq!(s.ensure_role_row(RoleName::Admin), pre);
    assert_eq!(s.membership_rows_for_user(&owner)[0].role_id, pre);
}
