#![forbid(unsafe_code)]

//! Title normalization and collision-driven slug allocation.
//!
//! Allocation never checks whether a slug is free before trying it. The caller's
//! `create` closure performs the store's atomic insert and reports back a tagged
//! outcome; only `CreateOutcome::Conflict` leads to another attempt.

use rand::Rng;
use sapling_kernel_contracts::petition::Slug;
use sapling_kernel_contracts::ContractViolation;
use tracing::{debug, warn};

/// Total attempts, the ideal slug included.
pub const MAX_SLUG_ATTEMPTS: u32 = 30;
pub const SLUG_SUFFIX_LEN: usize = 5;
const SLUG_SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<T, E> {
    Created(T),
    Conflict,
    Failed(E),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugAllocError<E> {
    #[error("slug conflicts exhausted after {attempts} attempts")]
    ConflictExhausted { attempts: u32 },
    #[error("invalid slug candidate: {0}")]
    InvalidCandidate(ContractViolation),
    #[error("store failure: {0}")]
    Store(E),
}

/// Keeps ASCII letters and digits (lower-cased). Each run of spaces and dashes becomes
/// one dash; every other character is dropped without breaking a run.
///
/// Dashes count as separators so that normalizing an already-normalized slug returns it
/// unchanged: `"a-b"` stays `"a-b"` instead of collapsing to `"ab"`.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_separator_run = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            in_separator_run = false;
        } else if (c == ' ' || c == '-') && !in_separator_run {
            out.push('-');
            in_separator_run = true;
        }
    }
    out
}

pub fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SLUG_SUFFIX_LEN)
        .map(|_| SLUG_SUFFIX_ALPHABET[rng.gen_range(0..SLUG_SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Tries the normalized title first, then `{ideal}-{suffix}` with a fresh random suffix
/// per attempt, up to `MAX_SLUG_ATTEMPTS` in total.
pub fn allocate_slug<T, E, R, F>(
    title: &str,
    rng: &mut R,
    mut create: F,
) -> Result<(Slug, T), SlugAllocError<E>>
where
    R: Rng + ?Sized,
    F: FnMut(&Slug) -> CreateOutcome<T, E>,
{
    let ideal = normalize_title(title);
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = if attempt == 1 {
            ideal.clone()
        } else {
            format!("{ideal}-{}", random_suffix(rng))
        };
        let slug = Slug::new(candidate).map_err(SlugAllocError::InvalidCandidate)?;
        match create(&slug) {
            CreateOutcome::Created(value) => {
                debug!(slug = %slug, attempt, "slug allocated");
                return Ok((slug, value));
            }
            CreateOutcome::Conflict => {
                debug!(slug = %slug, attempt, "slug taken, retrying with suffix");
            }
            CreateOutcome::Failed(err) => return Err(SlugAllocError::Store(err)),
        }
    }
    warn!(ideal = %ideal, attempts = MAX_SLUG_ATTEMPTS, "slug allocation exhausted");
    Err(SlugAllocError::ConflictExhausted {
        attempts: MAX_SLUG_ATTEMPTS,
    })
}
