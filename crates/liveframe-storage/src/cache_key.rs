//! Cache key derivation.
//!
//! The primary rule (the "later rule" of the design notes): `sha256` of
//! either `"album:" + album_identity` when the caller supplied a stable
//! upstream identity, or the raw album-art bytes otherwise, followed by the
//! workflow version and render preset strings. The identity branch is also
//! reachable standalone via [`identity_cache_key`] so a caller can probe for
//! a cache hit before paying for an artwork download — it is the same
//! digest the primary rule produces for that request, not a second key
//! space.

use sha2::{Digest, Sha256};

/// Compute the primary cache key for a render.
///
/// When `album_identity` is `Some`, `album_art_bytes` is ignored entirely:
/// different crops/encodings of the same upstream artwork collapse to one
/// cache entry. When `album_identity` is `None`, the image bytes themselves
/// are the identity.
pub fn compute_cache_key(
    album_art_bytes: &[u8],
    workflow_version: &str,
    render_preset: &str,
    album_identity: Option<&str>,
) -> String {
    let mut digest = Sha256::new();
    match album_identity {
        Some(identity) if !identity.is_empty() => {
            digest.update(format!("album:{identity}").as_bytes());
        }
        _ => digest.update(album_art_bytes),
    }
    digest.update(workflow_version.as_bytes());
    digest.update(render_preset.as_bytes());
    hex(digest.finalize().as_slice())
}

/// Compute the identity-only branch of [`compute_cache_key`], without any
/// album-art bytes in hand. Used by `create_job` to probe for a cache hit
/// before fetching artwork.
pub fn identity_cache_key(album_identity: &str, workflow_version: &str, render_preset: &str) -> String {
    compute_cache_key(&[], workflow_version, render_preset, Some(album_identity))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_equal_inputs() {
        let a = compute_cache_key(b"bytes", "wv1", "rp1", None);
        let b = compute_cache_key(b"bytes", "wv1", "rp1", None);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_workflow_version_or_preset() {
        let base = compute_cache_key(b"bytes", "wv1", "rp1", None);
        assert_ne!(base, compute_cache_key(b"bytes", "wv2", "rp1", None));
        assert_ne!(base, compute_cache_key(b"bytes", "wv1", "rp2", None));
    }

    #[test]
    fn identity_branch_ignores_bytes() {
        let a = compute_cache_key(b"bytes-a", "wv1", "rp1", Some("album-42"));
        let b = compute_cache_key(b"bytes-b-totally-different", "wv1", "rp1", Some("album-42"));
        assert_eq!(a, b);
    }

    #[test]
    fn identity_branch_changes_with_identity() {
        let a = compute_cache_key(b"bytes", "wv1", "rp1", Some("album-42"));
        let b = compute_cache_key(b"bytes", "wv1", "rp1", Some("album-43"));
        assert_ne!(a, b);
    }

    #[test]
    fn identity_cache_key_agrees_with_primary_rule() {
        let standalone = identity_cache_key("album-42", "wv1", "rp1");
        let via_bytes = compute_cache_key(b"irrelevant bytes", "wv1", "rp1", Some("album-42"));
        assert_eq!(standalone, via_bytes);
    }
}
