//! 256-bit unsigned integer arithmetic on big-endian byte arrays.
//!
//! EVM balances, storage slots and gas quantities are all 256-bit words.
//! Rather than pull in a bignum crate, the core keeps the representation as
//! a plain `[u8; 32]` and implements the handful of operations the runtime
//! actually needs (add, sub, schoolbook mul, byte-granularity left shift)
//! with explicit carry/borrow bytes, following the original host's
//! `uint256be` arithmetic helpers.
//!
//! Division is intentionally not implemented; nothing in the core needs it.

use std::cmp::Ordering;
use std::fmt;

pub const LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct U256([u8; LEN]);

impl U256 {
    pub const ZERO: U256 = U256([0u8; LEN]);

    pub fn from_be_bytes(bytes: [u8; LEN]) -> Self {
        Self(bytes)
    }

    pub fn to_be_bytes(self) -> [u8; LEN] {
        self.0
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; LEN];
        bytes[LEN - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Saturating truncation to `u64`: if any of the high 24 bytes are
    /// nonzero the result saturates to `u64::MAX` rather than wrapping,
    /// since this is primarily used for gas accounting where silent
    /// wraparound would under-charge.
    pub fn to_u64_saturating(&self) -> u64 {
        if self.0[..LEN - 8].iter().any(|&b| b != 0) {
            return u64::MAX;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[LEN - 8..]);
        u64::from_be_bytes(buf)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn checked_add(&self, other: &U256) -> (U256, bool) {
        let mut ret = [0u8; LEN];
        let mut carry: u16 = 0;
        for i in (0..LEN).rev() {
            let tmp = self.0[i] as u16 + other.0[i] as u16 + carry;
            carry = (tmp > u8::MAX as u16) as u16;
            ret[i] = (tmp & u8::MAX as u16) as u8;
        }
        (U256(ret), carry != 0)
    }

    pub fn checked_sub(&self, other: &U256) -> (U256, bool) {
        let mut ret = [0u8; LEN];
        let mut borrow: u16 = 0;
        for i in (0..LEN).rev() {
            let minuend = self.0[i] as u16 + (u8::MAX as u16 + 1);
            let subtrahend = other.0[i] as u16 + borrow;
            let res = minuend - subtrahend;
            ret[i] = (res & u8::MAX as u16) as u8;
            borrow = (res <= u8::MAX as u16) as u16;
        }
        (U256(ret), borrow != 0)
    }

    /// Wrapping addition (the core never needs over/underflow signalling
    /// beyond what `checked_add`/`checked_sub` already expose; this is the
    /// ergonomic entry point used by arithmetic call sites).
    pub fn wrapping_add(&self, other: &U256) -> U256 {
        self.checked_add(other).0
    }

    pub fn wrapping_sub(&self, other: &U256) -> U256 {
        self.checked_sub(other).0
    }

    /// Schoolbook multiplication over bytes: for every pair of nonzero
    /// source bytes, form their (at most 16-bit) product, position it at
    /// the right byte offset, and accumulate via the carry-propagating
    /// adder above. Overflow beyond 256 bits is silently discarded, as in
    /// native wrapping multiplication.
    pub fn wrapping_mul(&self, other: &U256) -> U256 {
        let mut acc = U256::ZERO;
        for i in 0..LEN {
            if self.0[i] == 0 {
                continue;
            }
            let mut row = U256::ZERO;
            for j in 0..LEN {
                if other.0[j] == 0 {
                    continue;
                }
                let shift = (LEN - i - 1) + (LEN - j - 1);
                if shift >= LEN {
                    continue;
                }
                let product = self.0[i] as u64 * other.0[j] as u64;
                let positioned = U256::from_u64(product).shl_bytes(shift);
                row = row.wrapping_add(&positioned);
            }
            acc = acc.wrapping_add(&row);
        }
        acc
    }

    /// Left-shifts by `count` whole bytes (not bits): `count >= 32` yields
    /// zero. This byte-granular shift is what the multiplication routine
    /// above uses to position partial products, and is exposed directly
    /// since spec's algebra laws are phrased in terms of it (`a << k` for
    /// `k >= 32` is zero, 32 being the byte width of the word).
    pub fn shl_bytes(&self, count: usize) -> U256 {
        let mut ret = [0u8; LEN];
        if count >= LEN {
            return U256(ret);
        }
        for i in 0..(LEN - count) {
            ret[i] = self.0[i + count];
        }
        U256(ret)
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Default for U256 {
    fn default() -> Self {
        U256::ZERO
    }
}
