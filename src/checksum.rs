//! CRC32 checksum over the canonical serialization of the book
//!
//! The feed computes its checksum by sorting bids descending and asks ascending,
//! interleaving them level by level as `price:quantity` tokens joined with `:`,
//! and running a standard reflected CRC32 (polynomial 0xEDB88320) over the
//! resulting string.

use crate::orderbook::BookSide;

const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Lookup table, computed at compile time
static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut j = 0;
        while j < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            j += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// Standard CRC32 of the input bytes
pub fn crc32(input: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in input {
        crc = (crc >> 8) ^ TABLE[((crc ^ byte as u32) & 0xFF) as usize];
    }
    crc ^ 0xFFFF_FFFF
}

/// Build the canonical token string the feed checksums.
pub fn canonical_string(bids: &BookSide, asks: &BookSide) -> String {
    let mut bids = bids.descending();
    let mut asks = asks.ascending();
    let mut tokens: Vec<String> = Vec::new();

    loop {
        let bid = bids.next();
        let ask = asks.next();
        if bid.is_none() && ask.is_none() {
            break;
        }
        for (price, quantity) in bid.into_iter().chain(ask) {
            tokens.push(price.to_string());
            tokens.push(quantity.to_string());
        }
    }

    tokens.join(":")
}

/// Checksum of the two-sided book in the feed's canonical form
pub fn order_book_checksum(bids: &BookSide, asks: &BookSide) -> u32 {
    crc32(canonical_string(bids, asks).as_bytes())
}
