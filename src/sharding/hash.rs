//! FNV-1 hashing used for key placement

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1 of `bytes`
pub fn fnv1_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= byte as u64;
    }
    hash
}
