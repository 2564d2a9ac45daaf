//! The free address pool.
//!
//! An ordered collection of unassigned addresses expanded from the configured
//! inclusive range. Addresses leave the pool when a binding is confirmed
//! ([`AddressPool::reserve`]) and come back when the expiry sweep reclaims a
//! lease ([`AddressPool::release`]). Reclaimed addresses are appended at the
//! end, so reuse order is FIFO after the initial ascending range; no stronger
//! fairness is promised.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Ordered pool of free addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressPool {
    free: Vec<Ipv4Addr>,
}

impl AddressPool {
    /// Expands the inclusive range `start..=end` into an ascending pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `start > end`.
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self> {
        let start_num = u32::from(start);
        let end_num = u32::from(end);

        if start_num > end_num {
            return Err(Error::InvalidConfig(format!(
                "pool range start {} is above range end {}",
                start, end
            )));
        }

        let free = (start_num..=end_num).map(Ipv4Addr::from).collect();
        Ok(Self { free })
    }

    /// Removes `address` from the pool.
    ///
    /// Idempotent: an address already reserved (e.g. via a lease reloaded
    /// from disk before the pool was built) is a no-op, not an error.
    pub fn reserve(&mut self, address: Ipv4Addr) {
        if let Some(index) = self.free.iter().position(|ip| *ip == address) {
            self.free.remove(index);
        }
    }

    /// Returns `address` to the back of the pool.
    ///
    /// A release of an address already present is a state no-op; the pool
    /// never holds duplicates.
    pub fn release(&mut self, address: Ipv4Addr) {
        if !self.free.contains(&address) {
            self.free.push(address);
        }
    }

    /// The next address a fresh allocation would hand out.
    pub fn first_free(&self) -> Option<Ipv4Addr> {
        self.free.first().copied()
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.free.contains(&address)
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.free.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    #[test]
    fn test_range_expansion_inclusive_ascending() {
        let pool = AddressPool::new(ip(10), ip(14)).unwrap();
        assert_eq!(pool.len(), 5);
        let ips: Vec<Ipv4Addr> = pool.iter().collect();
        assert_eq!(ips, vec![ip(10), ip(11), ip(12), ip(13), ip(14)]);
    }

    #[test]
    fn test_single_address_range() {
        let pool = AddressPool::new(ip(10), ip(10)).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.first_free(), Some(ip(10)));
    }

    #[test]
    fn test_range_spanning_octet_boundary() {
        let pool = AddressPool::new(
            Ipv4Addr::new(10, 0, 0, 254),
            Ipv4Addr::new(10, 0, 1, 1),
        )
        .unwrap();
        let ips: Vec<Ipv4Addr> = pool.iter().collect();
        assert_eq!(
            ips,
            vec![
                Ipv4Addr::new(10, 0, 0, 254),
                Ipv4Addr::new(10, 0, 0, 255),
                Ipv4Addr::new(10, 0, 1, 0),
                Ipv4Addr::new(10, 0, 1, 1),
            ]
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = AddressPool::new(ip(14), ip(10));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_reserve_is_idempotent() {
        let mut pool = AddressPool::new(ip(10), ip(12)).unwrap();
        pool.reserve(ip(11));
        let after_once = pool.clone();
        pool.reserve(ip(11));
        assert_eq!(pool, after_once);
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(ip(11)));
    }

    #[test]
    fn test_reserve_absent_address_is_noop() {
        let mut pool = AddressPool::new(ip(10), ip(12)).unwrap();
        pool.reserve(ip(99));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_release_appends_at_end() {
        let mut pool = AddressPool::new(ip(10), ip(12)).unwrap();
        pool.reserve(ip(10));
        pool.release(ip(10));
        let ips: Vec<Ipv4Addr> = pool.iter().collect();
        assert_eq!(ips, vec![ip(11), ip(12), ip(10)]);
    }

    #[test]
    fn test_release_duplicate_prevented() {
        let mut pool = AddressPool::new(ip(10), ip(12)).unwrap();
        pool.release(ip(11));
        assert_eq!(pool.len(), 3);
        let ips: Vec<Ipv4Addr> = pool.iter().collect();
        assert_eq!(ips, vec![ip(10), ip(11), ip(12)]);
    }

    #[test]
    fn test_first_free_and_exhaustion() {
        let mut pool = AddressPool::new(ip(10), ip(11)).unwrap();
        assert_eq!(pool.first_free(), Some(ip(10)));
        pool.reserve(ip(10));
        assert_eq!(pool.first_free(), Some(ip(11)));
        pool.reserve(ip(11));
        assert_eq!(pool.first_free(), None);
        assert!(pool.is_empty());
    }
}
