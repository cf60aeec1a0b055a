//! Sample layout conversion.

/// Decodes signed 16-bit little-endian bytes into `out`, replacing its contents.
///
/// A trailing odd byte is ignored.
pub fn bytes_to_samples(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
}

/// Encodes samples as signed 16-bit little-endian bytes into the front of `out`.
///
/// Returns the number of bytes written.
pub fn samples_to_bytes(samples: &[i16], out: &mut [u8]) -> usize {
    let mut written = 0;
    for (dst, sample) in out.chunks_exact_mut(2).zip(samples) {
        dst.copy_from_slice(&sample.to_le_bytes());
        written += 2;
    }
    written
}

/// Downmixes interleaved stereo to mono in place by keeping the left channel.
///
/// After the call the first `frames` samples hold the mono signal.
/// `samples` must hold at least `2 * frames` samples.
pub fn discard_right_channel(samples: &mut [i16], frames: usize) {
    debug_assert!(samples.len() >= frames * 2);
    for i in 1..frames {
        samples[i] = samples[i * 2];
    }
}

/// Rounds a frame count up to the next multiple of 16.
#[inline]
pub const fn round_up_16(frames: usize) -> usize {
    frames.div_ceil(16) * 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_samples() {
        let mut out = vec![99];
        bytes_to_samples(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80], &mut out);
        assert_eq!(out, vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_bytes_to_samples_odd_length() {
        let mut out = Vec::new();
        bytes_to_samples(&[0x10, 0x00, 0x7F], &mut out);
        assert_eq!(out, vec![16]);
    }

    #[test]
    fn test_samples_to_bytes() {
        let mut out = [0u8; 6];
        let written = samples_to_bytes(&[1, -1], &mut out);
        assert_eq!(written, 4);
        assert_eq!(out, [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn test_discard_right_channel() {
        let mut samples = vec![10i16, -10, 20, -20, 30, -30];
        discard_right_channel(&mut samples, 3);
        assert_eq!(&samples[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_discard_right_channel_single_frame() {
        let mut samples = vec![5i16, 6];
        discard_right_channel(&mut samples, 1);
        assert_eq!(samples[0], 5);
    }

    #[test]
    fn test_round_up_16() {
        assert_eq!(round_up_16(0), 0);
        assert_eq!(round_up_16(1), 16);
        assert_eq!(round_up_16(16), 16);
        assert_eq!(round_up_16(1045), 1056);
    }
}
