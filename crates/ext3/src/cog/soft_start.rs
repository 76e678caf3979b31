//! DC/DC boost soft-start table
//!
//! Medium-family COGs ship a small bytecode in OTP that ramps the boost
//! converter between power-on and refresh. Each block is
//!
//! ```text
//! tag repeat register data[tag & 0x07] delay
//! ```
//!
//! and is executed as `register <- data; wait delay` `repeat` times. A tag
//! of `0x00` (programmed end) or `0xFF` (erased OTP) ends the table, as does
//! running out of bytes on a block boundary. Bit 7 of the tag selects the
//! delay unit: set means 10 µs steps, clear means milliseconds.

use platform::DisplayError;

const TAG_END: u8 = 0x00;
const TAG_ERASED: u8 = 0xFF;
const TAG_MICROS: u8 = 0x80;
const TAG_LEN_MASK: u8 = 0x07;

/// tag + repeat + register + delay
const BLOCK_OVERHEAD: usize = 4;

/// Wait after one register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepDelay {
    /// Milliseconds.
    Millis(u8),
    /// Units of 10 µs.
    TenMicros(u8),
}

impl StepDelay {
    /// Delay in microseconds.
    pub fn as_us(self) -> u32 {
        match self {
            Self::Millis(ms) => u32::from(ms).saturating_mul(1000),
            Self::TenMicros(steps) => u32::from(steps).saturating_mul(10),
        }
    }
}

/// One decoded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftStartOp<'a> {
    /// Register index.
    pub register: u8,
    /// Payload, up to 7 bytes.
    pub data: &'a [u8],
    /// How many times to write and wait.
    pub repeat: u8,
    /// Wait after each write.
    pub delay: StepDelay,
}

/// Iterator over the blocks of a soft-start table.
///
/// Yields `Err(DisplayError::OtpFormat)` once for a truncated block and
/// then stops.
pub struct SoftStartOps<'a> {
    rest: &'a [u8],
    finished: bool,
}

impl<'a> SoftStartOps<'a> {
    /// Decode `table`.
    pub fn new(table: &'a [u8]) -> Self {
        Self {
            rest: table,
            finished: false,
        }
    }

    /// Walk the whole table, returning the number of blocks or the first
    /// format error.
    pub fn validate(table: &'a [u8]) -> Result<usize, DisplayError> {
        let mut count = 0usize;
        for op in Self::new(table) {
            op?;
            count = count.saturating_add(1);
        }
        Ok(count)
    }

    fn decode(&mut self, tag: u8) -> Result<SoftStartOp<'a>, DisplayError> {
        let len = usize::from(tag & TAG_LEN_MASK);
        let total = len.saturating_add(BLOCK_OVERHEAD);
        let rest = self.rest;
        let block = rest.get(..total).ok_or(DisplayError::OtpFormat)?;
        let [_, repeat, register, body @ ..] = block else {
            return Err(DisplayError::OtpFormat);
        };
        let [data @ .., delay] = body else {
            return Err(DisplayError::OtpFormat);
        };

        self.rest = rest.get(total..).unwrap_or_default();
        Ok(SoftStartOp {
            register: *register,
            data,
            repeat: *repeat,
            delay: if tag & TAG_MICROS != 0 {
                StepDelay::TenMicros(*delay)
            } else {
                StepDelay::Millis(*delay)
            },
        })
    }
}

impl<'a> Iterator for SoftStartOps<'a> {
    type Item = Result<SoftStartOp<'a>, DisplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.rest.first().copied() {
            None | Some(TAG_END | TAG_ERASED) => {
                self.finished = true;
                None
            }
            Some(tag) => {
                let op = self.decode(tag);
                if op.is_err() {
                    self.finished = true;
                }
                Some(op)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_blocks() {
        let table = [
            0x02, 0x01, 0x06, 0x17, 0x27, 0x0A, // 0x06 <- [17 27], 10 ms
            0x81, 0x03, 0x4D, 0x7F, 0x05, // 3 × (0x4D <- [7F], 50 µs)
            0x00, 0xAA, // end, trailing bytes ignored
        ];
        let ops: Vec<_> = SoftStartOps::new(&table).collect::<Result<_, _>>().unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].register, 0x06);
        assert_eq!(ops[0].data, &[0x17, 0x27]);
        assert_eq!(ops[0].delay, StepDelay::Millis(10));
        assert_eq!(ops[1].repeat, 3);
        assert_eq!(ops[1].delay.as_us(), 50);
    }

    #[test]
    fn test_erased_table_is_empty() {
        assert_eq!(SoftStartOps::validate(&[0xFF; 16]), Ok(0));
        assert_eq!(SoftStartOps::validate(&[]), Ok(0));
    }

    #[test]
    fn test_exhausted_on_block_boundary() {
        let table = [0x01, 0x01, 0x06, 0x17, 0x01];
        assert_eq!(SoftStartOps::validate(&table), Ok(1));
    }

    #[test]
    fn test_truncated_block() {
        // Announces 3 data bytes, only 2 follow and no delay
        let table = [0x03, 0x01, 0x06, 0x17, 0x27];
        let mut ops = SoftStartOps::new(&table);
        assert_eq!(ops.next(), Some(Err(DisplayError::OtpFormat)));
        assert_eq!(ops.next(), None);
        assert_eq!(SoftStartOps::validate(&table), Err(DisplayError::OtpFormat));
    }

    #[test]
    fn test_zero_length_payload() {
        let table = [0x80, 0x02, 0x12, 0x64];
        let ops: Vec<_> = SoftStartOps::new(&table).collect::<Result<_, _>>().unwrap();
        assert_eq!(ops[0].data, &[] as &[u8]);
        assert_eq!(ops[0].delay, StepDelay::TenMicros(100));
    }
}
