//! Checked staging-buffer helpers for canonical ABI operations.
//!
//! Every access is byte-granular and bounds-checked; nothing here relies
//! on host alignment, so values at irregular offsets read and write the
//! same as naturally aligned ones.

use super::error::DecodeError;

/// Align a value up to the nearest multiple of alignment.
#[inline]
pub fn align_to(val: u32, align: u32) -> u32 {
    (val + align - 1) & !(align - 1)
}

/// Safe buffer read helper - returns error instead of panicking.
#[inline]
pub fn read_byte(buffer: &[u8], offset: u32) -> Result<u8, DecodeError> {
    buffer
        .get(offset as usize)
        .copied()
        .ok_or(DecodeError::BufferTooSmall {
            needed: offset as usize + 1,
            available: buffer.len(),
        })
}

/// Safe fixed-width read helper for little-endian scalars.
#[inline]
pub fn read_array<const N: usize>(buffer: &[u8], offset: u32) -> Result<[u8; N], DecodeError> {
    let start = offset as usize;
    buffer
        .get(start..start + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::BufferTooSmall {
            needed: start + N,
            available: buffer.len(),
        })
}

/// Safe buffer slice read helper.
#[inline]
pub fn read_slice(buffer: &[u8], offset: u32, len: usize) -> Result<&[u8], DecodeError> {
    let start = offset as usize;
    let buf_len = buffer.len();
    buffer
        .get(start..start + len)
        .ok_or(DecodeError::BufferTooSmall {
            needed: start + len,
            available: buf_len,
        })
}

/// Safe buffer write helper - returns error instead of panicking.
#[inline]
pub fn write_byte(buffer: &mut [u8], offset: u32, value: u8) -> Result<(), DecodeError> {
    let len = buffer.len();
    *buffer
        .get_mut(offset as usize)
        .ok_or(DecodeError::BufferTooSmall {
            needed: offset as usize + 1,
            available: len,
        })? = value;
    Ok(())
}

/// Safe buffer slice write helper.
#[inline]
pub fn write_slice(buffer: &mut [u8], offset: u32, data: &[u8]) -> Result<(), DecodeError> {
    let start = offset as usize;
    let end = start + data.len();
    let len = buffer.len();
    buffer
        .get_mut(start..end)
        .ok_or(DecodeError::BufferTooSmall {
            needed: end,
            available: len,
        })?
        .copy_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(9, 8), 16);
    }

    #[test]
    fn reads_past_end_fail() {
        let buf = [1u8, 2, 3];
        assert!(read_array::<4>(&buf, 0).is_err());
        assert!(read_byte(&buf, 3).is_err());
        assert_eq!(read_array::<2>(&buf, 1), Ok([2, 3]));
    }
}
