/**
 * @brief Derive the subnet base from a CIDR subnet string.
 * @param subnet Subnet in `a.b.c.d/n` form.
 * @return The first three octets joined with dots (`a.b.c`).
 */
pub fn subnet_base(subnet: &str) -> Result<String, Box<dyn std::error::Error>> {
    let addr = subnet.split('/').next().unwrap_or(subnet);
    let octets: Vec<&str> = addr.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("invalid subnet '{}': expected a.b.c.d/n", subnet).into());
    }
    Ok(octets[..3].join("."))
}

/**
 * @brief Server address for a subnet base.
 * @param base Subnet base (`a.b.c`).
 * @return The `.1` host of the subnet.
 */
pub fn server_ip(base: &str) -> String {
    format!("{}.1", base)
}

/**
 * @brief Allocate the next client address from the monotonic counter.
 * @param base Subnet base (`a.b.c`).
 * @param counter Last allocated index; the counter is the single source
 *        of truth for the next free address.
 * @return The next client address and the incremented counter.
 *
 * Addresses are never reclaimed and no exhaustion check is applied; a
 * counter past 254 produces an out-of-range host string.
 */
pub fn next_client_ip(base: &str, counter: u32) -> (String, u32) {
    let next = counter + 1;
    (format!("{}.{}", base, next), next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_strips_last_octet_and_mask() {
        assert_eq!(subnet_base("10.0.0.0/24").unwrap(), "10.0.0");
        assert_eq!(subnet_base("10.1.0.0/24").unwrap(), "10.1.0");
        assert_eq!(subnet_base("192.168.77.0/24").unwrap(), "192.168.77");
    }

    #[test]
    fn base_rejects_malformed_subnets() {
        assert!(subnet_base("10.0.0/24").is_err());
        assert!(subnet_base("not-a-subnet").is_err());
    }

    #[test]
    fn server_is_host_one() {
        assert_eq!(server_ip("10.0.0"), "10.0.0.1");
    }

    #[test]
    fn allocation_is_sequential_from_counter() {
        let (ip, n) = next_client_ip("10.0.0", 1);
        assert_eq!((ip.as_str(), n), ("10.0.0.2", 2));
        let (ip, n) = next_client_ip("10.0.0", n);
        assert_eq!((ip.as_str(), n), ("10.0.0.3", 3));
    }

    #[test]
    fn allocation_is_monotonic_and_unbounded() {
        // No exhaustion check: the counter runs straight past .254.
        let (ip, n) = next_client_ip("10.0.0", 255);
        assert_eq!(ip, "10.0.0.256");
        assert_eq!(n, 256);
    }
}
