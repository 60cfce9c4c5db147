//! WAV container codec
//!
//! The device and every audio collaborator speak the same format: a 44-byte
//! RIFF/WAVE header (PCM, mono, 16 kHz, 16-bit, little-endian) followed by raw
//! PCM samples. The header is built by hand so its layout is bit-exact.

use crate::{Error, Result};

/// Sample rate of all audio exchanged with the device (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Mono
pub const CHANNELS: u16 = 1;

/// Signed 16-bit samples
pub const BITS_PER_SAMPLE: u16 = 16;

/// Length of the canonical header
pub const HEADER_LEN: usize = 44;

/// PCM format tag in the `fmt ` chunk
const FORMAT_PCM: u16 = 1;

/// Decoded header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Declared size of the `data` chunk
    pub data_len: u32,
}

/// Build the 44-byte header for a payload of `data_len` bytes
#[must_use]
pub fn header(data_len: usize) -> [u8; HEADER_LEN] {
    let data_len = u32::try_from(data_len).unwrap_or(u32::MAX);
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = SAMPLE_RATE * u32::from(block_align);

    let mut out = [0u8; HEADER_LEN];
    out[0..4].copy_from_slice(b"RIFF");
    out[4..8].copy_from_slice(&data_len.saturating_add(36).to_le_bytes());
    out[8..12].copy_from_slice(b"WAVE");
    out[12..16].copy_from_slice(b"fmt ");
    out[16..20].copy_from_slice(&16u32.to_le_bytes());
    out[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    out[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    out[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    out[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    out[32..34].copy_from_slice(&block_align.to_le_bytes());
    out[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out[36..40].copy_from_slice(b"data");
    out[40..44].copy_from_slice(&data_len.to_le_bytes());
    out
}

/// Wrap raw PCM in a WAV container
#[must_use]
pub fn build_container(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header(payload.len()));
    out.extend_from_slice(payload);
    out
}

/// Parse the header of a WAV container
///
/// Walks the RIFF chunk list, so containers with extra chunks (`LIST`, `fact`)
/// before `data` are accepted.
///
/// # Errors
///
/// Returns error if the bytes are not a PCM RIFF/WAVE container
pub fn parse_header(bytes: &[u8]) -> Result<WavHeader> {
    if !is_container(bytes) {
        return Err(Error::Audio("not a RIFF/WAVE container".to_string()));
    }

    let (_, fmt) = find_chunk(bytes, b"fmt ")
        .ok_or_else(|| Error::Audio("missing fmt chunk".to_string()))?;
    if fmt.len() < 16 {
        return Err(Error::Audio(format!("fmt chunk too short: {} bytes", fmt.len())));
    }

    let format = le_u16(&fmt[0..2]);
    if format != FORMAT_PCM {
        return Err(Error::Audio(format!("unsupported audio format {format}")));
    }

    let (data_len, _) = find_chunk(bytes, b"data")
        .ok_or_else(|| Error::Audio("missing data chunk".to_string()))?;

    Ok(WavHeader {
        channels: le_u16(&fmt[2..4]),
        sample_rate: le_u32(&fmt[4..8]),
        byte_rate: le_u32(&fmt[8..12]),
        block_align: le_u16(&fmt[12..14]),
        bits_per_sample: le_u16(&fmt[14..16]),
        data_len,
    })
}

/// PCM body of a container, or the input itself when it is already raw PCM
///
/// A container without a `data` chunk yields an empty slice.
#[must_use]
pub fn pcm_payload(bytes: &[u8]) -> &[u8] {
    if !is_container(bytes) {
        return bytes;
    }
    find_chunk(bytes, b"data").map_or(&[], |(_, body)| body)
}

/// Whether the bytes start with a RIFF/WAVE preamble
#[must_use]
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Milliseconds of audio in `len` bytes of PCM
#[must_use]
pub fn duration_ms(len: usize) -> u64 {
    let bytes_per_sec = u64::from(SAMPLE_RATE) * u64::from(CHANNELS * BITS_PER_SAMPLE / 8);
    (len as u64 * 1000) / bytes_per_sec
}

/// Find a chunk by id, returning its declared size and the bytes actually present
///
/// Streaming encoders write `0xFFFFFFFF` as the data size; the body is clamped
/// to the end of the buffer.
fn find_chunk<'a>(bytes: &'a [u8], id: &[u8; 4]) -> Option<(u32, &'a [u8])> {
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let size = le_u32(&bytes[pos + 4..pos + 8]);
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(size as usize).min(bytes.len());

        if chunk_id == id {
            return Some((size, &bytes[body_start..body_end]));
        }

        // Chunks are word-aligned
        let padded = (size as usize).saturating_add(size as usize & 1);
        pos = body_start.saturating_add(padded);
    }
    None
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
