//! Auxiliary dedup-group collection lifecycle (spec §3, §4.7 step 2, §9).
//!
//! The collection name binds the aux table to both the filter that produced
//! it and the freshness of the record collection at build time, so a stale
//! aux collection (one whose suffix no longer matches) is safe to garbage
//! collect and a fresh one can be reused across runs without rebuilding.

use md5::{Digest, Md5};

pub const AUX_COLLECTION_PREFIX: &str = "mr_record_";

/// Name the auxiliary collection for one dedup-group pass. `filter_json`
/// should be a canonical (stable key order) JSON rendering of the query
/// driving the map/reduce; `from_date` is the pass's `fromDate` argument
/// when explicitly given; `last_record_epoch` is the `updated` unix
/// timestamp of the newest record in the store at build time.
pub fn aux_collection_name(
    filter_json: &str,
    from_date: Option<&str>,
    last_record_epoch: i64,
) -> String {
    let mut hasher = Md5::new();
    hasher.update(filter_json.as_bytes());
    let digest = hasher.finalize();
    let hash = hex_encode(&digest);

    match from_date {
        Some(date) if !date.is_empty() => {
            format!("{AUX_COLLECTION_PREFIX}{hash}_{date}_{last_record_epoch}")
        }
        _ => format!("{AUX_COLLECTION_PREFIX}{hash}_{last_record_epoch}"),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Collections that share the `mr_record_` prefix but not the exact name
/// just computed are stale and should be dropped (spec §9).
pub fn stale_aux_collections<'a>(
    all_collections: impl Iterator<Item = &'a str>,
    current_name: &str,
) -> Vec<String> {
    all_collections
        .filter(|name| name.starts_with(AUX_COLLECTION_PREFIX) && *name != current_name)
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_filter_and_epoch_produce_same_name() {
        let a = aux_collection_name("{}", None, 42);
        let b = aux_collection_name("{}", None, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn different_epoch_changes_name() {
        let a = aux_collection_name("{}", None, 1);
        let b = aux_collection_name("{}", None, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn identifies_stale_collections() {
        let current = aux_collection_name("{}", None, 2);
        let all = vec![current.as_str(), "mr_record_deadbeef_1", "state", "record"];
        let stale = stale_aux_collections(all.into_iter(), &current);
        assert_eq!(stale, vec!["mr_record_deadbeef_1".to_string()]);
    }
}
