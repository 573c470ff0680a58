use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use ulid::Ulid;

pub const RUN_ID_PREFIX: &str = "wr_";

/// `wr_` + ULID. Sortable by creation time, unique per run.
pub fn run_id_ulid() -> String {
    format!("{}{}", RUN_ID_PREFIX, Ulid::new())
}

pub fn call_id_ulid() -> String {
    format!("gc_{}", Ulid::new())
}

pub fn is_run_id(s: &str) -> bool {
    s.strip_prefix(RUN_ID_PREFIX)
        .map(|rest| rest.parse::<Ulid>().is_ok())
        .unwrap_or(false)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

pub fn now_rfc3339_utc() -> String {
    // Rfc3339 formatting only fails for years outside 0..=9999.
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_prefixed_ulids() {
        let a = run_id_ulid();
        let b = run_id_ulid();
        assert!(a.starts_with("wr_"));
        assert_eq!(a.len(), 3 + 26);
        assert_ne!(a, b);
        assert!(is_run_id(&a));
        assert!(!is_run_id("r_01HZZZ"));
        assert!(!is_run_id("../../etc/passwd"));
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn timestamps_parse_back() {
        let ts = now_rfc3339_utc();
        assert!(OffsetDateTime::parse(&ts, &Rfc3339).is_ok());
    }
}
