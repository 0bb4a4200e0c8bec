//! Audio Sample Reader (C2): pulls mono float PCM for an arbitrary
//! `[t0, t1)` from the media transcoder.

use std::path::Path;

use crate::collaborators::Transcoder;
use crate::error::Result;

/// Reads `duration` seconds of mono PCM starting at `start`, decoded as
/// little-endian IEEE-754 32-bit samples.
///
/// Returns an empty buffer when `duration <= 0` (no call is made to the
/// transcoder in that case) or when the transcoder produced zero bytes.
/// Never retries; a transcoder failure propagates as whatever error the
/// `Transcoder` implementation raises (`MediaIoError` for the real
/// implementation).
pub async fn read_pcm(
    transcoder: &dyn Transcoder,
    path: &Path,
    start: f64,
    duration: f64,
    sample_rate: u32,
) -> Result<Vec<f32>> {
    if duration <= 0.0 {
        return Ok(Vec::new());
    }

    let bytes = transcoder.extract_pcm(path, start, duration, sample_rate).await?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct FixedBytes(Vec<u8>);

    #[async_trait]
    impl Transcoder for FixedBytes {
        async fn extract_pcm(&self, _input: &Path, _start: f64, _duration: f64, _sr: u32) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
        async fn accurate_trim(&self, _: &Path, _: f64, _: f64, _: &Path) -> Result<()> {
            Ok(())
        }
        async fn stream_copy_trim(&self, _: &Path, _: f64, _: &Path) -> Result<()> {
            Ok(())
        }
        async fn concat(&self, _: &[PathBuf], _: &Path) -> Result<()> {
            Ok(())
        }
        async fn loudnorm_analyze(&self, _: &Path) -> Result<crate::collaborators::LoudnormAnalysis> {
            unimplemented!()
        }
        async fn loudnorm_render(
            &self,
            _: &Path,
            _: &crate::collaborators::LoudnormAnalysis,
            _: &Path,
            _: bool,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn non_positive_duration_short_circuits_to_empty() {
        let transcoder = FixedBytes(vec![1, 2, 3, 4]);
        let samples = read_pcm(&transcoder, Path::new("in.mp4"), 0.0, 0.0, 16_000).await.unwrap();
        assert!(samples.is_empty());
        let samples = read_pcm(&transcoder, Path::new("in.mp4"), 0.0, -1.0, 16_000).await.unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn zero_bytes_from_transcoder_is_empty_buffer() {
        let transcoder = FixedBytes(Vec::new());
        let samples = read_pcm(&transcoder, Path::new("in.mp4"), 0.0, 1.0, 16_000).await.unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn decodes_little_endian_f32_samples() {
        let mut bytes = Vec::new();
        for v in [0.0f32, 0.5, -0.5, 1.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let transcoder = FixedBytes(bytes);
        let samples = read_pcm(&transcoder, Path::new("in.mp4"), 0.0, 1.0, 16_000).await.unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -0.5, 1.0]);
    }
}
