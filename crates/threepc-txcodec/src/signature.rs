//! secp256k1 recoverable-signature signing and verification, mirroring the
//! `eth_sign` / `check_signature` pair from the system this crate's
//! transaction codec descends from.

use crate::address::Address;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),

    #[error("signature does not recover to a valid public key")]
    RecoveryFailed,
}

/// An (r, s, recovery id) secp256k1 signature over a 32-byte digest. Carries
/// the bare recovery id (0 or 1); EIP-155 `v` encoding is the transaction
/// codec's concern, not this module's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id;
        out
    }
}

/// Signs a 32-byte digest (typically a transaction sighash) with a raw
/// secp256k1 private key.
pub fn eth_sign(privkey: &[u8; 32], digest: &[u8; 32]) -> Result<Signature, SignatureError> {
    let secret_key =
        libsecp256k1::SecretKey::parse(privkey).map_err(|_| SignatureError::InvalidPrivateKey)?;
    let message = libsecp256k1::Message::parse(digest);
    let (sig, recovery_id) = libsecp256k1::sign(&message, &secret_key);
    let raw = sig.serialize();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&raw[..32]);
    s.copy_from_slice(&raw[32..]);
    Ok(Signature {
        r,
        s,
        recovery_id: recovery_id.serialize(),
    })
}

/// Recovers the signing address from a digest and signature, verifying the
/// signature is well-formed in the process. Ill-formed or non-recoverable
/// signatures are rejected rather than silently accepted.
pub fn check_signature(digest: &[u8; 32], signature: &Signature) -> Result<Address, SignatureError> {
    let message = libsecp256k1::Message::parse(digest);
    let mut raw = [0u8; 64];
    raw[..32].copy_from_slice(&signature.r);
    raw[32..].copy_from_slice(&signature.s);
    let sig = libsecp256k1::Signature::parse_standard(&raw)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    let recovery_id = libsecp256k1::RecoveryId::parse(signature.recovery_id)
        .map_err(|_| SignatureError::InvalidRecoveryId(signature.recovery_id))?;
    let pubkey = libsecp256k1::recover(&message, &sig, &recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(Address::from_uncompressed_public_key(&pubkey.serialize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut k = [0x01u8; 32];
        k[31] = 0x42;
        k
    }

    #[test]
    fn sign_then_recover_yields_signer_address() {
        let privkey = test_key();
        let secret_key = libsecp256k1::SecretKey::parse(&privkey).unwrap();
        let pubkey = libsecp256k1::PublicKey::from_secret_key(&secret_key);
        let expected_addr = Address::from_uncompressed_public_key(&pubkey.serialize());

        let digest = [0x77u8; 32];
        let sig = eth_sign(&privkey, &digest).unwrap();
        let recovered = check_signature(&digest, &sig).unwrap();
        assert_eq!(recovered, expected_addr);
    }

    #[test]
    fn tampered_digest_recovers_different_address() {
        let privkey = test_key();
        let secret_key = libsecp256k1::SecretKey::parse(&privkey).unwrap();
        let pubkey = libsecp256k1::PublicKey::from_secret_key(&secret_key);
        let expected_addr = Address::from_uncompressed_public_key(&pubkey.serialize());

        let digest = [0x77u8; 32];
        let sig = eth_sign(&privkey, &digest).unwrap();

        let other_digest = [0x78u8; 32];
        let recovered = check_signature(&other_digest, &sig).unwrap();
        assert_ne!(recovered, expected_addr);
    }

    #[test]
    fn bad_recovery_id_is_rejected() {
        let privkey = test_key();
        let digest = [0x11u8; 32];
        let mut sig = eth_sign(&privkey, &digest).unwrap();
        sig.recovery_id = 7;
        assert_eq!(
            check_signature(&digest, &sig),
            Err(SignatureError::InvalidRecoveryId(7))
        );
    }
}
