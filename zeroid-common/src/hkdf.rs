//! HKDF-SHA-256 store-key derivation, one invocation per named store (§4.2).

use hkdf::Hkdf;
use sha2::Sha256;

/// Derive a 32-byte store key from `master_key` with empty salt and
/// `info = "zeroid-store-" + name`, as required by the store-key schedule.
pub fn derive_store_key(master_key: &[u8], name: &str) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, master_key);
    let info = format!("zeroid-store-{name}");
    let mut okm = [0u8; 32];
    hk.expand(info.as_bytes(), &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_name() {
        let master = b"some master secret bytes................";
        assert_eq!(
            derive_store_key(master, "escrow"),
            derive_store_key(master, "escrow")
        );
    }

    #[test]
    fn distinct_stores_get_distinct_keys() {
        let master = b"some master secret bytes................";
        assert_ne!(
            derive_store_key(master, "escrow"),
            derive_store_key(master, "credentials")
        );
    }

    #[test]
    fn distinct_master_keys_give_distinct_store_keys() {
        let a = derive_store_key(b"master-a", "cache");
        let b = derive_store_key(b"master-b", "cache");
        assert_ne!(a, b);
    }
}
