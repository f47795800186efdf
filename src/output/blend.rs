//! Pure pixel operations used by the output manager: the MIX crossfade
//! (§4.6) and alpha-as-luma key extraction (§4.4).

use crate::errors::PlayoutError;

/// Linearly crossfade `outgoing` into `incoming`, writing the result into
/// `dst`. `factor` is clamped to `[0.0, 1.0]`; `0.0` is pure outgoing,
/// `1.0` is pure incoming. All three buffers must be BGRA and the same
/// length.
pub fn blend_bgra(outgoing: &[u8], incoming: &[u8], factor: f32, dst: &mut Vec<u8>) -> Result<(), PlayoutError> {
    if outgoing.len() != incoming.len() {
        return Err(PlayoutError::BufferSizeMismatch(outgoing.len(), incoming.len()));
    }
    let f = factor.clamp(0.0, 1.0);
    dst.clear();
    dst.reserve(outgoing.len());
    for (&o, &i) in outgoing.iter().zip(incoming.iter()) {
        let blended = o as f32 + (i as f32 - o as f32) * f;
        dst.push(blended.round().clamp(0.0, 255.0) as u8);
    }
    Ok(())
}

/// Derive a luma key frame from a BGRA fill buffer's alpha channel: each
/// output pixel is `(a, a, a, 0xFF)`, matching the "alpha-as-luma" contract
/// drivers that lack a native alpha path (SDI) rely on.
pub fn extract_alpha_as_luma(fill_bgra: &[u8], dst: &mut Vec<u8>) -> Result<(), PlayoutError> {
    if fill_bgra.len() % 4 != 0 {
        return Err(PlayoutError::BufferSizeMismatch(fill_bgra.len(), fill_bgra.len() - fill_bgra.len() % 4));
    }
    dst.clear();
    dst.reserve(fill_bgra.len());
    for px in fill_bgra.chunks_exact(4) {
        let a = px[3];
        dst.extend_from_slice(&[a, a, a, 0xFF]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_at_zero_is_outgoing() {
        let outgoing = vec![10u8, 20, 30, 255];
        let incoming = vec![200u8, 210, 220, 255];
        let mut dst = Vec::new();
        blend_bgra(&outgoing, &incoming, 0.0, &mut dst).unwrap();
        assert_eq!(dst, outgoing);
    }

    #[test]
    fn blend_at_one_is_incoming() {
        let outgoing = vec![10u8, 20, 30, 255];
        let incoming = vec![200u8, 210, 220, 255];
        let mut dst = Vec::new();
        blend_bgra(&outgoing, &incoming, 1.0, &mut dst).unwrap();
        assert_eq!(dst, incoming);
    }

    #[test]
    fn blend_at_half_averages() {
        let outgoing = vec![0u8, 0, 0, 0];
        let incoming = vec![100u8, 100, 100, 100];
        let mut dst = Vec::new();
        blend_bgra(&outgoing, &incoming, 0.5, &mut dst).unwrap();
        assert_eq!(dst, vec![50, 50, 50, 50]);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let outgoing = vec![0u8; 4];
        let incoming = vec![0u8; 8];
        let mut dst = Vec::new();
        assert!(blend_bgra(&outgoing, &incoming, 0.5, &mut dst).is_err());
    }

    #[test]
    fn alpha_as_luma_replicates_alpha_channel() {
        let fill = vec![10u8, 20, 30, 128, 1, 2, 3, 64];
        let mut dst = Vec::new();
        extract_alpha_as_luma(&fill, &mut dst).unwrap();
        assert_eq!(dst, vec![128, 128, 128, 255, 64, 64, 64, 255]);
    }
}
