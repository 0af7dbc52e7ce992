//! Account address codec
//!
//! An address is the prefix, 52 base32 characters carrying the 256-bit
//! public key left-padded with four zero bits, and 8 characters carrying
//! the blake2b-40 checksum.

use crate::core::crypto::hashing::address_checksum;
use crate::shared::constants::{ADDRESS_BODY_LENGTH, ADDRESS_PREFIX, LEGACY_ADDRESS_PREFIX};
use crate::shared::error::WalletError;
use crate::shared::types::{Address, PublicKey};

const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

fn bits_of(bytes: &[u8]) -> impl Iterator<Item = bool> + '_ {
    bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
}

fn encode_bits(bits: &[bool]) -> String {
    bits.chunks(5)
        .map(|chunk| {
            let index = chunk.iter().fold(0usize, |acc, bit| (acc << 1) | *bit as usize);
            ALPHABET[index] as char
        })
        .collect()
}

fn decode_chars(chars: &str) -> Result<Vec<bool>, WalletError> {
    let mut bits = Vec::with_capacity(chars.len() * 5);
    for c in chars.bytes() {
        let index = ALPHABET
            .iter()
            .position(|a| *a == c)
            .ok_or_else(|| WalletError::validation(format!("Invalid address character '{}'", c as char)))?;
        bits.extend((0..5).rev().map(|i| (index >> i) & 1 == 1));
    }
    Ok(bits)
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, bit| (acc << 1) | *bit as u8))
        .collect()
}

/// Encode a public key as an account address
pub fn encode_address(public_key: &PublicKey) -> Address {
    let mut key_bits = vec![false; 4];
    key_bits.extend(bits_of(public_key.as_bytes()));
    let checksum = address_checksum(public_key.as_bytes());
    let checksum_bits: Vec<bool> = bits_of(&checksum).collect();

    format!(
        "{}{}{}",
        ADDRESS_PREFIX,
        encode_bits(&key_bits),
        encode_bits(&checksum_bits)
    )
}

/// Decode an account address back into its public key, verifying the checksum
pub fn decode_address(address: &str) -> Result<PublicKey, WalletError> {
    let body = address
        .strip_prefix(ADDRESS_PREFIX)
        .or_else(|| address.strip_prefix(LEGACY_ADDRESS_PREFIX))
        .ok_or_else(|| WalletError::validation("Address has an unknown prefix"))?;

    if body.len() != ADDRESS_BODY_LENGTH {
        return Err(WalletError::validation(format!(
            "Address body must be {} characters",
            ADDRESS_BODY_LENGTH
        )));
    }

    let (key_part, checksum_part) = body.split_at(52);
    let key_bits = decode_chars(key_part)?;
    if key_bits[..4].iter().any(|bit| *bit) {
        return Err(WalletError::validation("Address key padding is not zero"));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&pack_bits(&key_bits[4..]));

    let checksum = pack_bits(&decode_chars(checksum_part)?);
    if checksum.as_slice() != address_checksum(&key) {
        return Err(WalletError::validation("Address checksum mismatch"));
    }

    Ok(PublicKey(key))
}

/// True when `address` decodes with a valid checksum
pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_KEY: &str = "E89208DD038FBB269987689621D52292AE9C35941A7484756ECCED92A65093BA";
    const GENESIS_ADDRESS: &str =
        "nano_3t6k35gi95xu6tergt6p69ck76ogmitsa8mnijtpxm9fkcm736xtoncuohr3";

    #[test]
    fn test_encode_known_address() {
        let key: PublicKey = GENESIS_KEY.parse().unwrap();
        assert_eq!(encode_address(&key), GENESIS_ADDRESS);
    }

    #[test]
    fn test_decode_known_address() {
        let key = decode_address(GENESIS_ADDRESS).unwrap();
        assert_eq!(key.to_hex(), GENESIS_KEY);
    }

    #[test]
    fn test_legacy_prefix_accepted() {
        let legacy = GENESIS_ADDRESS.replacen("nano_", "xrb_", 1);
        assert!(is_valid_address(&legacy));
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let mut tampered = GENESIS_ADDRESS.to_string();
        tampered.pop();
        tampered.push('1');
        assert!(matches!(decode_address(&tampered), Err(WalletError::Validation(_))));
    }

    #[test]
    fn test_bad_inputs_rejected() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("nano_short"));
        assert!(!is_valid_address("btc_3t6k35gi95xu6tergt6p69ck76ogmitsa8mnijtpxm9fkcm736xtoncuohr3"));
        assert!(!is_valid_address("nano_3t6k35gi95xu6tergt6p69ck76ogmitsa8mnijtpxm9fkcm736xtoncuohr0"));
    }
}
