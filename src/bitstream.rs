//! Bit-level input cursor for DFDL parsing.
//!
//! DFDL data is addressed in bits, MSB first within each byte (bit 7 is read
//! first). The cursor exposes its absolute position as `bit_pos0b` and can be
//! rewound to any earlier position, which is what point-of-uncertainty
//! rollback relies on.

use crate::{Error, Result};

/// Reads individual bits from a byte slice, MSB first.
///
/// Intern wird ein u64-Akkumulator verwendet: Bits werden batch-weise aus
/// `data` geladen und per Shift/Mask extrahiert. Das reduziert
/// Byte-Array-Zugriffe und Boundary-Checks drastisch (nur beim Refill statt
/// bei jedem Bit).
#[derive(Clone, Copy)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    /// Nächstes ungelesenes Byte in data.
    byte_pos: usize,
    /// Akkumulator: enthält `accum_bits` gültige Bits, linksbündig
    /// (Bit 63 = ältestes). Die rechten (64 - accum_bits) Bits sind immer 0.
    accum: u64,
    /// Anzahl gültiger Bits im Akkumulator (0..=64).
    accum_bits: u8,
}

impl<'a> BitCursor<'a> {
    /// Creates a new `BitCursor` over the given byte slice, positioned at bit 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, byte_pos: 0, accum: 0, accum_bits: 0 }
    }

    /// Füllt den Akkumulator byteweise nach, solange accum_bits <= 56
    /// (Ergebnis: 57..=64 Bits, falls genug Daten).
    #[inline(always)]
    fn refill(&mut self) {
        while self.accum_bits <= 56 && self.byte_pos < self.data.len() {
            self.accum |= (self.data[self.byte_pos] as u64) << (56 - self.accum_bits);
            self.byte_pos += 1;
            self.accum_bits += 8;
        }
    }

    /// Reads a single bit. Returns `true` for 1, `false` for 0.
    #[inline(always)]
    pub fn read_bit(&mut self) -> Result<bool> {
        self.refill();
        if self.accum_bits == 0 {
            return Err(Error::PrematureEndOfBitStream);
        }
        let val = (self.accum >> 63) != 0;
        self.accum <<= 1;
        self.accum_bits -= 1;
        Ok(val)
    }

    /// Reads `n` bits and returns them as a `u64`, MSB first.
    /// When `n` is 0 this is a no-op returning 0.
    ///
    /// # Panics
    ///
    /// Panics if `n > 64`.
    #[inline]
    pub fn read_bits(&mut self, n: u8) -> Result<u64> {
        debug_assert!(n <= 64, "bit count must be 0..=64, got {n}");
        if n == 0 {
            return Ok(0);
        }
        // Upfront-Check: genug Bits verfügbar? (State bleibt unverändert bei Fehler)
        if (n as u64) > self.remaining_bits() {
            return Err(Error::PrematureEndOfBitStream);
        }

        if n <= 56 {
            self.refill();
            // n <= 56 und genug Daten: nach Refill gilt accum_bits >= n
            let val = self.accum >> (64 - n);
            self.accum <<= n;
            self.accum_bits -= n;
            Ok(val)
        } else {
            self.refill();
            if self.accum_bits >= n {
                let val = self.accum >> (64 - n);
                self.accum = if n < 64 { self.accum << n } else { 0 };
                self.accum_bits -= n;
                Ok(val)
            } else {
                // Zweistufig: erst Akkumulator leeren, dann nachladen
                let first = self.accum_bits;
                debug_assert!(first > 0, "refill hätte mindestens 1 Byte laden müssen");
                let val_high = self.accum >> (64 - first);
                self.accum = 0;
                self.accum_bits = 0;

                let remaining = n - first;
                self.refill();
                let val_low = self.accum >> (64 - remaining);
                self.accum <<= remaining;
                self.accum_bits -= remaining;

                Ok((val_high << remaining) | val_low)
            }
        }
    }

    /// Liest `n` Bytes in den Buffer. Bei leerem Akkumulator: direkter
    /// Slice-Zugriff. Sonst Loop über `read_bits(8)`.
    pub fn read_bytes_aligned(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if self.accum_bits == 0 {
            let end = self.byte_pos + buf.len();
            if end > self.data.len() {
                return Err(Error::PrematureEndOfBitStream);
            }
            buf.copy_from_slice(&self.data[self.byte_pos..end]);
            self.byte_pos = end;
        } else {
            for slot in buf.iter_mut() {
                *slot = self.read_bits(8)? as u8;
            }
        }
        Ok(())
    }

    /// Returns the current absolute bit position (0-based).
    pub fn bit_pos0b(&self) -> u64 {
        (self.byte_pos * 8) as u64 - self.accum_bits as u64
    }

    /// Total length of the input in bits.
    pub fn len_bits(&self) -> u64 {
        (self.data.len() * 8) as u64
    }

    /// Returns the number of bits remaining to be read.
    pub fn remaining_bits(&self) -> u64 {
        ((self.data.len() - self.byte_pos) * 8) as u64 + self.accum_bits as u64
    }

    /// Repositions the cursor to an absolute bit position.
    ///
    /// Rückwärts wie vorwärts erlaubt; der Akkumulator wird verworfen und ab
    /// der Ziel-Byte-Grenze neu geladen. Ziel hinter dem Input-Ende ist ein
    /// Fehler.
    pub fn seek_bit_pos0b(&mut self, bit_pos0b: u64) -> Result<()> {
        if bit_pos0b > self.len_bits() {
            return Err(Error::SeekOutOfBounds {
                bit_pos0b,
                len_bits: self.len_bits(),
            });
        }
        self.byte_pos = (bit_pos0b / 8) as usize;
        self.accum = 0;
        self.accum_bits = 0;
        let frac = (bit_pos0b % 8) as u8;
        if frac > 0 {
            self.refill();
            debug_assert!(self.accum_bits >= frac, "refill lud weniger als ein Byte");
            self.accum <<= frac;
            self.accum_bits -= frac;
        }
        Ok(())
    }

    /// Reads `n` bits without consuming them. Returns `None` when fewer than
    /// `n` bits remain.
    ///
    /// Der Cursor ist Copy; peek arbeitet auf einer Kopie.
    pub fn peek_bits(&self, n: u8) -> Option<u64> {
        let mut probe = *self;
        probe.read_bits(n).ok()
    }
}
