#![forbid(unsafe_code)]

use crate::common::{validate_id, validate_max_len, validate_text};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const PETITION_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const PETITION_TITLE_MAX_LEN: usize = 256;
pub const PETITION_BODY_MAX_LEN: usize = 65_536;
pub const PETITION_IMAGE_SRC_MAX_LEN: usize = 2_048;
pub const PETITION_IMAGE_ALT_MAX_LEN: usize = 512;
/// Longest ideal slug plus the `-xxxxx` collision suffix.
pub const SLUG_MAX_LEN: usize = PETITION_TITLE_MAX_LEN + 6;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for UserId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("user_id", &self.0, 128)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PetitionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleId(pub u64);

/// URL-safe petition address. The empty slug is a legal value: it is what an
/// all-punctuation title normalizes to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slug(String);

impl Slug {
    pub fn new(slug: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(slug.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Validate for Slug {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_max_len("slug", &self.0, SLUG_MAX_LEN)?;
        if !self
            .0
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(ContractViolation::InvalidValue {
                field: "slug",
                reason: "must contain only [a-z0-9-]",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoleName {
    Admin,
}

impl RoleName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
        }
    }
}

/// Caller identity handed over by the identity collaborator. `email` and `name` may be
/// absent when the provider did not release them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Principal {
    pub fn new(user_id: UserId, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            email,
            name,
        }
    }

    /// `(email, name)` when both are present and non-blank.
    pub fn signer_identity(&self) -> Option<(&str, &str)> {
        let email = self.email.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let name = self.name.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        Some((email, name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub schema_version: SchemaVersion,
    pub user_id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl UserRecord {
    pub fn v1(
        user_id: UserId,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: PETITION_CONTRACT_VERSION,
            user_id,
            email,
            name,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn from_principal(principal: &Principal) -> Result<Self, ContractViolation> {
        Self::v1(
            principal.user_id.clone(),
            principal.email.clone(),
            principal.name.clone(),
        )
    }
}

impl Validate for UserRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PETITION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.schema_version",
                reason: "must match PETITION_CONTRACT_VERSION",
            });
        }
        self.user_id.validate()?;
        if let Some(email) = &self.email {
            validate_max_len("user_record.email", email, 320)?;
        }
        if let Some(name) = &self.name {
            validate_max_len("user_record.name", name, 256)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionRecord {
    pub schema_version: SchemaVersion,
    pub petition_id: PetitionId,
    pub slug: Slug,
    pub title: String,
    pub body: Option<String>,
    pub created_at: MonotonicTimeNs,
}

impl PetitionRecord {
    pub fn v1(
        petition_id: PetitionId,
        slug: Slug,
        title: String,
        body: Option<String>,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: PETITION_CONTRACT_VERSION,
            petition_id,
            slug,
            title,
            body,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for PetitionRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PETITION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "petition_record.schema_version",
                reason: "must match PETITION_CONTRACT_VERSION",
            });
        }
        self.slug.validate()?;
        validate_max_len("petition_record.title", &self.title, PETITION_TITLE_MAX_LEN)?;
        if let Some(body) = &self.body {
            validate_max_len("petition_record.body", body, PETITION_BODY_MAX_LEN)?;
        }
        Ok(())
    }
}

/// Creation input. An empty or all-punctuation title is allowed; it yields the empty
/// ideal slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionCreateRequest {
    pub title: String,
    pub body: Option<String>,
}

impl Validate for PetitionCreateRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_max_len(
            "petition_create_request.title",
            &self.title,
            PETITION_TITLE_MAX_LEN,
        )?;
        if let Some(body) = &self.body {
            validate_max_len("petition_create_request.body", body, PETITION_BODY_MAX_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionImageRecord {
    pub schema_version: SchemaVersion,
    pub petition_id: PetitionId,
    pub position: u32,
    pub src: String,
    pub alt: Option<String>,
    pub created_at: MonotonicTimeNs,
}

impl PetitionImageRecord {
    pub fn v1(
        petition_id: PetitionId,
        position: u32,
        src: String,
        alt: Option<String>,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: PETITION_CONTRACT_VERSION,
            petition_id,
            position,
            src,
            alt,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for PetitionImageRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PETITION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "petition_image_record.schema_version",
                reason: "must match PETITION_CONTRACT_VERSION",
            });
        }
        if self.position == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "petition_image_record.position",
                reason: "must be > 0",
            });
        }
        validate_text(
            "petition_image_record.src",
            &self.src,
            PETITION_IMAGE_SRC_MAX_LEN,
        )?;
        if let Some(alt) = &self.alt {
            validate_max_len("petition_image_record.alt", alt, PETITION_IMAGE_ALT_MAX_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub role_id: RoleId,
    pub name: RoleName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub schema_version: SchemaVersion,
    pub user_id: UserId,
    pub petition_id: PetitionId,
    pub role_id: RoleId,
    pub role_name: RoleName,
    pub created_at: MonotonicTimeNs,
}

impl MembershipRecord {
    pub fn v1(
        user_id: UserId,
        petition_id: PetitionId,
        role: &RoleRecord,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: PETITION_CONTRACT_VERSION,
            user_id,
            petition_id,
            role_id: role.role_id,
            role_name: role.name,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for MembershipRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PETITION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "membership_record.schema_version",
                reason: "must match PETITION_CONTRACT_VERSION",
            });
        }
        self.user_id.validate()
    }
}

/// True when `memberships` grants `user_id` the `role` on `petition`.
pub fn has_role<'a>(
    user_id: &UserId,
    petition: &PetitionRecord,
    role: RoleName,
    memberships: impl IntoIterator<Item = &'a MembershipRecord>,
) -> bool {
    memberships.into_iter().any(|m| {
        m.user_id == *user_id && m.petition_id == petition.petition_id && m.role_name == role
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionImageView {
    pub src: String,
    pub alt: Option<String>,
    pub position: u32,
}

impl From<&PetitionImageRecord> for PetitionImageView {
    fn from(r: &PetitionImageRecord) -> Self {
        Self {
            src: r.src.clone(),
            alt: r.alt.clone(),
            position: r.position,
        }
    }
}

fn sorted_images(mut images: Vec<PetitionImageView>) -> Vec<PetitionImageView> {
    images.sort_by_key(|i| i.position);
    images
}

/// Reduced field set, safe to serve to anyone and to cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionPublicView {
    pub slug: Slug,
    pub title: String,
    pub images: Vec<PetitionImageView>,
}

impl PetitionPublicView {
    pub fn new(petition: &PetitionRecord, images: Vec<PetitionImageView>) -> Self {
        Self {
            slug: petition.slug.clone(),
            title: petition.title.clone(),
            images: sorted_images(images),
        }
    }

    pub fn main_image(&self) -> Option<&PetitionImageView> {
        self.images.last()
    }
}

/// Full field set, only for admins of the petition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionPrivilegedView {
    pub slug: Slug,
    pub title: String,
    pub images: Vec<PetitionImageView>,
    pub body: Option<String>,
}

impl PetitionPrivilegedView {
    pub fn new(petition: &PetitionRecord, images: Vec<PetitionImageView>) -> Self {
        Self {
            slug: petition.slug.clone(),
            title: petition.title.clone(),
            images: sorted_images(images),
            body: petition.body.clone(),
        }
    }

    pub fn main_image(&self) -> Option<&PetitionImageView> {
        self.images.last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PetitionView {
    Public(PetitionPublicView),
    Privileged(PetitionPrivilegedView),
}

impl PetitionView {
    pub fn slug(&self) -> &Slug {
        match self {
            PetitionView::Public(v) => &v.slug,
            PetitionView::Privileged(v) => &v.slug,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PetitionView::Public(v) => &v.title,
            PetitionView::Privileged(v) => &v.title,
        }
    }

    pub fn images(&self) -> &[PetitionImageView] {
        match self {
            PetitionView::Public(v) => &v.images,
            PetitionView::Privileged(v) => &v.images,
        }
    }

    pub fn main_image(&self) -> Option<&PetitionImageView> {
        self.images().last()
    }

    /// `None` for the public projection, and for admins of a petition without a body.
    pub fn body(&self) -> Option<&str> {
        match self {
            PetitionView::Public(_) => None,
            PetitionView::Privileged(v) => v.body.as_deref(),
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, PetitionView::Privileged(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn petition(id: u64, slug: &str) -> PetitionRecord {
        PetitionRecord::v1(
            PetitionId(id),
            Slug::new(slug).unwrap(),
            "Title".to_string(),
            Some("Body".to_string()),
            MonotonicTimeNs(1),
        )
        .unwrap()
    }

    fn admin_role() -> RoleRecord {
        RoleRecord {
            role_id: RoleId(1),
            name: RoleName::Admin,
        }
    }

    #[test]
    fn slug_accepts_empty_and_rejects_uppercase() {
        assert!(Slug::new("").is_ok());
        assert!(Slug::new("save-the-park-a1b2c").is_ok());
        assert!(Slug::new("Save-the-park").is_err());
        assert!(Slug::new("save the park").is_err());
    }

    #[test]
    fn has_role_requires_matching_user_petition_and_role() {
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        let p1 = petition(1, "p1");
        let p2 = petition(2, "p2");
        let memberships = vec![MembershipRecord::v1(
            alice.clone(),
            p1.petition_id,
            &admin_role(),
            MonotonicTimeNs(1),
        )
        .unwrap()];

        assert!(has_role(&alice, &p1, RoleName::Admin, &memberships));
        assert!(!has_role(&alice, &p2, RoleName::Admin, &memberships));
        assert!(!has_role(&bob, &p1, RoleName::Admin, &memberships));
        assert!(!has_role(
            &alice,
            &p1,
            RoleName::Admin,
            &Vec::<MembershipRecord>::new()
        ));
    }

    #[test]
    fn main_image_is_highest_position() {
        let p = petition(1, "p1");
        let view = PetitionPublicView::new(
            &p,
            vec![
                PetitionImageView {
                    src: "https://img/3".to_string(),
                    alt: None,
                    position: 3,
                },
                PetitionImageView {
                    src: "https://img/1".to_string(),
                    alt: None,
                    position: 1,
                },
            ],
        );
        assert_eq!(view.images[0].position, 1);
        assert_eq!(view.main_image().map(|i| i.position), Some(3));
    }

    #[test]
    fn public_view_never_carries_body() {
        let p = petition(1, "p1");
        let view = PetitionView::Public(PetitionPublicView::new(&p, Vec::new()));
        assert_eq!(view.body(), None);
        let view = PetitionView::Privileged(PetitionPrivilegedView::new(&p, Vec::new()));
        assert_eq!(view.body(), Some("Body"));
    }

    #[test]
    fn signer_identity_requires_non_blank_email_and_name() {
        let user = UserId::new("u1").unwrap();
        let full = Principal::new(
            user.clone(),
            Some("a@example.com".to_string()),
            Some("Ada".to_string()),
        );
        assert_eq!(full.signer_identity(), Some(("a@example.com", "Ada")));
        let blank_email = Principal::new(
            user.clone(),
            Some("  ".to_string()),
            Some("Ada".to_string()),
        );
        assert_eq!(blank_email.signer_identity(), None);
        let no_name = Principal::new(user, Some("a@example.com".to_string()), None);
        assert_eq!(no_name.signer_identity(), None);
    }

    #[test]
    fn image_record_position_must_be_positive() {
        let res = PetitionImageRecord::v1(
            PetitionId(1),
            0,
            "https://img/0".to_string(),
            None,
            MonotonicTimeNs(1),
        );
        assert!(res.is_err());
    }
}
