use std::io::{Read, Write};

use crate::{Corner, Corners, HeightFieldError};

const CORNER_BYTES: usize = 3;

/// Writes `corners` verbatim: little-endian height followed by terrain type.
/// No mesh or placement state is ever persisted.
pub fn write_corners<W: Write>(sink: &mut W, corners: &[Corner]) -> Result<(), HeightFieldError> {
    let mut bytes = Vec::with_capacity(corners.len() * CORNER_BYTES);
    for c in corners {
        bytes.extend_from_slice(&c.height.to_le_bytes());
        bytes.push(c.terrain);
    }
    sink.write_all(&bytes)?;
    Ok(())
}

/// Reads the `width * width` corners written by [`write_corners`].
pub fn read_corners<R: Read>(source: &mut R, width: usize) -> Result<Corners, HeightFieldError> {
    let count = width * width;
    let mut bytes = vec![0u8; count * CORNER_BYTES];
    source.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(CORNER_BYTES)
        .map(|b| Corner::new(u16::from_le_bytes([b[0], b[1]]), b[2]))
        .collect())
}
