#![forbid(unsafe_code)]

use sapling_kernel_contracts::esign::SignatureId;
use sapling_kernel_contracts::petition::{PetitionId, Slug, UserId, UserRecord};
use sapling_kernel_contracts::MonotonicTimeNs;
use sapling_storage::petition_store::{PetitionStore, StorageError};
use sapling_storage::repo::{PetitionRepo, SignatureRequestRepo};

#[test]
fn at_signature_request_db_01_refs_are_append_only_and_keep_every_request() {
    let mut s = PetitionStore::new_in_memory();
    let owner = UserId::new("owner_1").unwrap();
    s.upsert_user_row(UserRecord::v1(owner.clone(), None, None).unwrap())
        .unwrap();
    let p = s
        .create_petition_with_owner_row(
            MonotonicTimeNs(1),
            Slug::new("p").unwrap(),
            "P".into(),
            None,
            &owner,
        )
        .unwrap();

    let first = s
        .append_signature_request_ref_row(
            MonotonicTimeNs(2),
            p.petition_id,
            owner.clone(),
            Some("req_1".to_string()),
            SignatureId::new("sig_1").unwrap(),
        )
        .unwrap();
    let second = s
        .append_signature_request_ref_row(
            MonotonicTimeNs(3),
            p.petition_id,
            owner,
            None,
            SignatureId::new("sig_2").unwrap(),
        )
        .unwrap();
    assert!(second > first);

    let ids: Vec<&str> = s
        .signature_request_ref_rows()
        .iter()
        .map(|r| r.signature_id.as_str())
        .collect();
    assert_eq!(ids, vec!["sig_1", "sig_2"]);
    let request_ids: Vec<Option<&str>> = s
        .signature_request_ref_rows()
        .iter()
        .map(|r| r.signature_request_id.as_deref())
        .collect();
    assert_eq!(request_ids, vec![Some("req_1"), None]);
}

#[test]
fn at_signature_request_db_02_unknown_petition_rejected() {
    let mut s = PetitionStore::new_in_memory();
    let out = s.append_signature_request_ref_row(
        MonotonicTimeNs(1),
        PetitionId(42),
        UserId::new("u").unwrap(),
        None,
        SignatureId::new("sig_1").unwrap(),
    );
    assert!(matches!(out, Err(StorageError::ForeignKeyViolation { .. })));
    assert!(s.signature_request_ref_rows().is_empty());
}
