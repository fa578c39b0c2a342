use thiserror::Error;

/// Errors that can occur while decoding wire data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("list length {count} exceeds remaining input of {remaining} bytes")]
    LengthOutOfBounds { count: u64, remaining: usize },
}

/// Splits `n` bytes off the front of the input
///
/// # Returns
///
/// The taken bytes and the leftover input
pub fn take_bytes(input: &[u8], n: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof {
            needed: n,
            remaining: input.len(),
        });
    }

    Ok(input.split_at(n))
}

/// Reads a fixed-width byte array off the front of the input
pub fn take_array<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), DecodeError> {
    let (bytes, rest) = take_bytes(input, N)?;

    let mut array = [0u8; N];
    array.copy_from_slice(bytes);

    Ok((array, rest))
}

/// Reads a big-endian u8
pub fn take_u8(input: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    let (bytes, rest) = take_array::<1>(input)?;
    Ok((bytes[0], rest))
}

/// Reads a big-endian u16
pub fn take_u16(input: &[u8]) -> Result<(u16, &[u8]), DecodeError> {
    let (bytes, rest) = take_array::<2>(input)?;
    Ok((u16::from_be_bytes(bytes), rest))
}

/// Reads a big-endian u64
pub fn take_u64(input: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    let (bytes, rest) = take_array::<8>(input)?;
    Ok((u64::from_be_bytes(bytes), rest))
}

/// Encodes a length-prefixed list: a u64 element count followed by the
/// elements in reverse iteration order.
///
/// The reverse convention keeps file appends cheap: a new element is
/// written at the end of the stream and only the count prefix is
/// rewritten. Decoding reverses once at the end, so the head of a
/// decoded list is always the most recently appended element.
pub fn encode_list<T>(out: &mut Vec<u8>, items: &[T], encode: impl Fn(&T, &mut Vec<u8>)) {
    out.extend_from_slice(&(items.len() as u64).to_be_bytes());

    for item in items.iter().rev() {
        encode(item, out);
    }
}

/// Decodes a length-prefixed list written by [`encode_list`]
///
/// Reads the u64 count, invokes the element decoder that many times,
/// then reverses the accumulated sequence.
pub fn decode_list<'a, T>(
    input: &'a [u8],
    decode: impl Fn(&'a [u8]) -> Result<(T, &'a [u8]), DecodeError>,
) -> Result<(Vec<T>, &'a [u8]), DecodeError> {
    let (count, mut rest) = take_u64(input)?;

    // Every element occupies at least one byte, so a count beyond the
    // remaining input can only come from a malformed stream.
    if count > rest.len() as u64 {
        return Err(DecodeError::LengthOutOfBounds {
            count,
            remaining: rest.len(),
        });
    }

    let mut items = Vec::new();
    for _ in 0..count {
        let (item, leftover) = decode(rest)?;
        items.push(item);
        rest = leftover;
    }

    items.reverse();
    Ok((items, rest))
}

/// Encodes a byte string behind a u16 bit-length prefix
///
/// The wire stores signature lengths in bits. This encoder is
/// byte-granular and always emits `len * 8`.
pub fn encode_bit_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&((bytes.len() * 8) as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Decodes a bit-length-prefixed byte string
///
/// Interprets the bit-length field byte-aligned: `ceil(bits / 8)` bytes
/// are consumed. Round-trip with [`encode_bit_string`] is exact when the
/// bit length is a multiple of eight, which the encoder guarantees.
pub fn decode_bit_string(input: &[u8]) -> Result<(Vec<u8>, &[u8]), DecodeError> {
    let (bits, rest) = take_u16(input)?;
    let byte_len = (bits as usize + 7) / 8;

    let (bytes, rest) = take_bytes(rest, byte_len)?;
    Ok((bytes.to_vec(), rest))
}
