//! Default display names
//!
//! A device without an admin-assigned name gets a deterministic one derived
//! from its MAC address and slot. Applied only while the name is absent;
//! an existing name is never overwritten by this policy.

/// Derive the default display name for a device
pub fn default_name(mac_address: &str, order: i64) -> String {
    let digits: String = mac_address
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();
    let tail = &digits[digits.len().saturating_sub(6)..];
    format!("Device-{}-O{}", tail, order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_last_six_hex_digits_and_order() {
        assert_eq!(
            default_name("AA:BB:CC:11:22:33", 1),
            "Device-112233-O1"
        );
        assert_eq!(
            default_name("aa:bb:cc:dd:ee:ff", 42),
            "Device-ddeeff-O42"
        );
    }

    #[test]
    fn is_deterministic() {
        let a = default_name("DE:AD:BE:EF:00:01", 3);
        let b = default_name("DE:AD:BE:EF:00:01", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn short_identifiers_do_not_panic() {
        assert_eq!(default_name("AB", 2), "Device-AB-O2");
        assert_eq!(default_name("", 2), "Device--O2");
    }
}
