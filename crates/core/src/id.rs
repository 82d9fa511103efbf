//! Time-sortable record identifiers
//!
//! An [`EntryId`] is 12 bytes, hex-encoded to 24 characters on the wire:
//! a big-endian unix-seconds prefix, a 5-byte per-process token and a
//! 3-byte counter. Byte order is id order, so ids sort by insertion time
//! and the seconds prefix doubles as the record's ingestion timestamp.
//!
//! Decoding is permissive: `""`, `"0"` and anything that is not 24 hex
//! characters all decode to the zero id, which compares below every real id
//! (so `id > zero` matches everything).

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;

/// 12-byte time-sortable record id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryId([u8; 12]);

impl EntryId {
    /// The zero id, below every generated id.
    pub fn zero() -> EntryId {
        EntryId([0; 12])
    }

    /// True for the zero id.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 12]
    }

    /// Decode a hex id. Empty, `"0"` and malformed strings decode to zero.
    pub fn decode(s: &str) -> EntryId {
        if s.is_empty() || s == "0" {
            return EntryId::zero();
        }
        let mut bytes = [0u8; 12];
        match hex::decode_to_slice(s, &mut bytes) {
            Ok(()) => EntryId(bytes),
            Err(_) => EntryId::zero(),
        }
    }

    /// Raw bytes, for engines that index on them.
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Ingestion time carried in the seconds prefix.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
    }

    /// The next id in byte order. Saturates at the all-ones id.
    fn incremented(mut self) -> EntryId {
        for b in self.0.iter_mut().rev() {
            let (v, overflow) = b.overflowing_add(1);
            *b = v;
            if !overflow {
                break;
            }
        }
        self
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Strictly monotonic id source, one per store.
///
/// The generator remembers the last issued id and bumps the candidate when
/// the clock stalls or steps back, so ids strictly increase in issue order.
pub struct IdGenerator {
    token: [u8; 5],
    last: Mutex<LastState>,
}

struct LastState {
    counter: u32,
    issued: EntryId,
}

impl IdGenerator {
    /// Create a generator with a random process token and counter seed.
    pub fn new() -> IdGenerator {
        let mut rng = rand::thread_rng();
        let mut token = [0u8; 5];
        rng.fill_bytes(&mut token);
        IdGenerator {
            token,
            last: Mutex::new(LastState {
                counter: rng.next_u32() & 0x00ff_ffff,
                issued: EntryId::zero(),
            }),
        }
    }

    /// Issue the next id, strictly greater than all previously issued ones.
    pub fn next(&self) -> EntryId {
        let secs = Utc::now().timestamp().max(0) as u32;

        let mut last = self.last.lock();
        last.counter = (last.counter + 1) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.token);
        bytes[9..].copy_from_slice(&last.counter.to_be_bytes()[1..]);

        let mut id = EntryId(bytes);
        if id <= last.issued {
            id = last.issued.incremented();
        }
        last.issued = id;
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        IdGenerator::new()
    }
}

#[cfg(test)]
#[path = "id_test.rs"]
mod id_test;
