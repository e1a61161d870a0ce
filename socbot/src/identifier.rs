//! SOC identifiers: validation, normalization and expansion of short ids.

use crate::outcome::{Failure, OperationResult};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

static FULL_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{7,8}$").expect("valid regex"));
static PARTIAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4,8}$").expect("valid regex"));

/// Resolves the tail of an id to the full id, e.g. from a reporting database.
#[async_trait]
pub trait SocIdLookup: Send + Sync {
    /// Every full id ending with `partial`.
    async fn ids_ending_with(&self, partial: &str) -> Result<Vec<String>, String>;
}

/// Whether `raw` is an acceptable id. Short ids only pass when they can be expanded.
pub fn is_valid(raw: &str, allow_partial: bool) -> bool {
    let raw = raw.trim();
    if allow_partial {
        PARTIAL_ID.is_match(raw)
    } else {
        FULL_ID.is_match(raw)
    }
}

/// An eight-digit id with a leading zero is the same SOC as its seven-digit tail.
pub fn strip_leading_zero(id: &str) -> &str {
    let id = id.trim();
    if id.len() == 8 && id.starts_with('0') {
        &id[1..]
    } else {
        id
    }
}

/// Validates and normalizes `raw`, expanding a short id through `lookup` when one is given.
pub async fn resolve_soc_id(raw: &str, lookup: Option<&dyn SocIdLookup>) -> OperationResult<String> {
    let raw = raw.trim();
    if !is_valid(raw, lookup.is_some()) {
        return Err(Failure::fatal(
            "soc_id",
            format!("'{raw}' is not a valid SOC id"),
        ));
    }
    if FULL_ID.is_match(raw) {
        let id = strip_leading_zero(raw).to_string();
        debug!(raw, id = %id, "SOC id accepted");
        return Ok(id);
    }

    let Some(lookup) = lookup else {
        return Err(Failure::fatal("soc_id", format!("'{raw}' is too short")));
    };
    let found = lookup
        .ids_ending_with(raw)
        .await
        .map_err(|e| Failure::fatal("soc_id", format!("lookup of '{raw}' failed: {e}")))?;
    match found.as_slice() {
        [one] if FULL_ID.is_match(one.trim()) => {
            let id = strip_leading_zero(one).to_string();
            info!("🔎 SOC id {} expanded to {}", raw, id);
            Ok(id)
        }
        [one] => Err(Failure::fatal(
            "soc_id",
            format!("lookup of '{raw}' returned malformed id '{one}'"),
        )),
        [] => Err(Failure::fatal("soc_id", format!("no SOC ends with '{raw}'"))),
        many => Err(Failure::fatal(
            "soc_id",
            format!("'{raw}' is ambiguous: {} SOCs match", many.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl SocIdLookup for Fixed {
        async fn ids_ending_with(&self, partial: &str) -> Result<Vec<String>, String> {
            Ok(self
                .0
                .iter()
                .filter(|id| id.ends_with(partial))
                .map(|id| id.to_string())
                .collect())
        }
    }

    #[test]
    fn validation_rules() {
        assert!(is_valid("1234567", false));
        assert!(is_valid("01234567", false));
        assert!(!is_valid("12345", false));
        assert!(is_valid("12345", true));
        assert!(!is_valid("123", true));
        assert!(!is_valid("12a4567", false));
    }

    #[test]
    fn leading_zero_is_dropped_only_from_eight_digits() {
        assert_eq!(strip_leading_zero("01234567"), "1234567");
        assert_eq!(strip_leading_zero("0123456"), "0123456");
        assert_eq!(strip_leading_zero("11234567"), "11234567");
    }

    #[tokio::test]
    async fn full_id_needs_no_lookup() {
        assert_eq!(resolve_soc_id(" 01234567 ", None).await.unwrap(), "1234567");
        assert!(resolve_soc_id("4567", None).await.is_err());
    }

    #[tokio::test]
    async fn short_id_expands_to_exactly_one_match() {
        let lookup = Fixed(vec!["1234567", "7650321", "1110321"]);
        assert_eq!(resolve_soc_id("4567", Some(&lookup)).await.unwrap(), "1234567");

        let failure = resolve_soc_id("0321", Some(&lookup)).await.unwrap_err();
        assert!(failure.message.contains("ambiguous"));

        let failure = resolve_soc_id("9999", Some(&lookup)).await.unwrap_err();
        assert!(failure.message.contains("no SOC"));
    }
}
