use rand::Rng;

use crate::backend::MetadataStore;
use crate::error::{Result, StoreError};
use crate::store::Namespace;

pub const DEFAULT_SLUG_LENGTH: usize = 8;
pub const MAX_ALLOCATE_ATTEMPTS: usize = 5;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz_-";

fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

/// Lowercases `input` and collapses every run of characters outside
/// `[a-z0-9_-]` into a single `-`. Returns `None` when nothing is left.
pub fn sanitize(input: &str) -> Option<String> {
    let mut slug = String::with_capacity(input.len());
    let mut in_run = false;
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        if is_slug_char(c) {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('-');
            in_run = true;
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

pub fn is_valid(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(is_slug_char)
}

pub fn ensure_valid(slug: &str) -> Result<()> {
    if is_valid(slug) {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!("invalid slug: {:?}", slug)))
    }
}

pub fn generate(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Picks the slug for a new record in `namespace`.
///
/// A requested slug is sanitized and must be free. Without one, random
/// slugs are tried until a free one is found; after
/// [`MAX_ALLOCATE_ATTEMPTS`] collisions a fresh slug is returned unchecked.
pub async fn allocate<M>(
    metadata: &M,
    namespace: Namespace,
    requested: Option<&str>,
    length: usize,
) -> Result<String>
where
    M: MetadataStore + ?Sized,
{
    if let Some(slug) = requested.and_then(sanitize) {
        if metadata.exists(&namespace.key(&slug)).await? {
            return Err(StoreError::Conflict { namespace, slug });
        }
        return Ok(slug);
    }

    for attempt in 1..=MAX_ALLOCATE_ATTEMPTS {
        let slug = generate(length);
        if !metadata.exists(&namespace.key(&slug)).await? {
            return Ok(slug);
        }
        debug!("Slug collision in {} (attempt {}): {}", namespace, attempt, slug);
    }

    warn!(
        "{} slug collisions in {}, using an unchecked slug",
        MAX_ALLOCATE_ATTEMPTS, namespace
    );
    Ok(generate(length))
}
