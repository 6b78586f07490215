//! Deterministic object names that fit Kubernetes length limits.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// RFC 1123 label, used for most object names and all label values
pub const DNS_LABEL_MAX: usize = 63;
/// RFC 1123 subdomain
pub const DNS_SUBDOMAIN_MAX: usize = 253;

/// First four bytes of the SHA-256 of `input`, as eight hex digits
pub fn hash_suffix(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut first_4 = [0u8; 4];
    first_4.copy_from_slice(&digest[..4]);
    format!("{:08x}", u32::from_be_bytes(first_4))
}

/// Lowercase, replace anything outside `[a-z0-9-]` with `-`, trim dashes
pub fn sanitize(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_owned()
}

fn truncate(input: &str, max_len: usize) -> &str {
    // sanitized names are ascii
    match input.char_indices().nth(max_len) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// `base` shortened so that `<base>-<suffix>` fits in `max_len`.
pub fn suffixed_short_name(base: &str, suffix: &str, max_len: usize) -> Result<String> {
    let max_base = max_len
        .checked_sub(suffix.len() + 1)
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            Error::Internal(format!(
                "suffix {suffix:?} leaves no room for a name within {max_len} characters"
            ))
        })?;
    let base = sanitize(base);
    let base = truncate(&base, max_base).trim_end_matches('-');
    Ok(format!("{base}-{suffix}"))
}

/// A valid name no longer than `max_len`.
///
/// Names that already fit are only sanitized. Longer names are truncated and
/// get a hash of the full input appended, so inputs sharing a long prefix
/// still end up with different names.
pub fn short_name(base: &str, max_len: usize) -> Result<String> {
    let sanitized = sanitize(base);
    if sanitized.len() <= max_len {
        return Ok(sanitized);
    }
    suffixed_short_name(&sanitized, &hash_suffix(base), max_len)
}

/// A name unique per (name, namespace) that fits a GCP service account id.
pub fn app_namespace_hash(name: &str, namespace: &str) -> String {
    let name_part = truncate(name, 11).trim_end_matches('-');
    let namespace_part = truncate(namespace, 9).trim_end_matches('-');
    let suffix = hash_suffix(&format!("{name}/{namespace}"));
    format!("{name_part}-{namespace_part}-{suffix}")
}

pub fn is_dns_label(name: &str) -> bool {
    static DNS_LABEL: OnceLock<Regex> = OnceLock::new();
    let re = DNS_LABEL.get_or_init(|| {
        Regex::new("^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex to compile")
    });
    name.len() <= DNS_LABEL_MAX && re.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_left_alone() {
        assert_eq!(short_name("myapp", DNS_LABEL_MAX).unwrap(), "myapp");
        assert_eq!(
            short_name("My_App.v2", DNS_LABEL_MAX).unwrap(),
            "my-app-v2"
        );
    }

    #[test]
    fn long_names_are_truncated_and_hashed() {
        let base = "a".repeat(80);
        let name = short_name(&base, DNS_LABEL_MAX).unwrap();
        assert_eq!(name.len(), DNS_LABEL_MAX);
        assert!(name.ends_with(&hash_suffix(&base)));
        assert!(is_dns_label(&name));
        // deterministic
        assert_eq!(name, short_name(&base, DNS_LABEL_MAX).unwrap());
    }

    #[test]
    fn shared_prefixes_do_not_collide() {
        let prefix = "x".repeat(70);
        let a = short_name(&format!("{prefix}-first"), DNS_LABEL_MAX).unwrap();
        let b = short_name(&format!("{prefix}-second"), DNS_LABEL_MAX).unwrap();
        assert_ne!(a, b);
        assert!(a.len() <= DNS_LABEL_MAX && b.len() <= DNS_LABEL_MAX);
    }

    #[test]
    fn suffix_trims_dangling_dashes() {
        let name = suffixed_short_name("azure-my-very-long-application", "abcd1234", 18).unwrap();
        assert_eq!(name, "azure-my-abcd1234");
        let name = suffixed_short_name("azure-myapp", "abcd1234", 19).unwrap();
        assert_eq!(name, "azure-myap-abcd1234");
        assert_eq!(name.len(), 19);
    }

    #[test]
    fn suffix_must_leave_room() {
        assert!(suffixed_short_name("app", "abcd1234", 9).is_err());
    }

    #[test]
    fn app_namespace_hash_fits_gcp_limits() {
        let short = app_namespace_hash("a", "b");
        assert_eq!(short.len(), 12);
        assert!(short.starts_with("a-b-"));

        let long = app_namespace_hash("a-very-long-application-name", "a-very-long-namespace");
        assert!(long.len() <= 30);
        assert!(long.starts_with("a-very-long-a-very-lo-"));

        // trailing dash of the truncated namespace is removed
        let dashed = app_namespace_hash("myapplication", "abcdefgh-ijk");
        assert!(dashed.starts_with("myapplicati-abcdefgh-"));

        assert_ne!(
            app_namespace_hash("app", "team-a"),
            app_namespace_hash("app", "team-b")
        );
        // truncation to the same prefixes still differs
        assert_ne!(
            app_namespace_hash("application-one", "namespace"),
            app_namespace_hash("application-two", "namespace")
        );
    }

    #[test]
    fn dns_labels() {
        assert!(is_dns_label("myapp-1"));
        assert!(!is_dns_label("-myapp"));
        assert!(!is_dns_label("MyApp"));
        assert!(!is_dns_label(&"a".repeat(64)));
    }
}
