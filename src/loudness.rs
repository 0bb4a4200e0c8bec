//! Loudness Normalizer (C5): two-pass EBU-R128 analysis + render.

use std::path::Path;

use crate::collaborators::Transcoder;
use crate::error::Result;

/// Runs the analysis pass then the render pass, handing the analysis
/// pass's measured values to the render pass verbatim.
///
/// `reencode_video` requests an H.264 re-encode of the video stream instead
/// of a stream copy (used for accurate trims); audio is always re-encoded
/// to the fixed AAC-LC/192kb/s codec regardless.
pub async fn normalize(
    transcoder: &dyn Transcoder,
    input: &Path,
    output: &Path,
    reencode_video: bool,
) -> Result<()> {
    let analysis = transcoder.loudnorm_analyze(input).await?;
    transcoder.loudnorm_render(input, &analysis, output, reencode_video).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::LoudnormAnalysis;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct RecordingTranscoder {
        rendered_with: RefCell<Option<LoudnormAnalysis>>,
    }

    #[async_trait]
    impl Transcoder for RecordingTranscoder {
        async fn extract_pcm(&self, _: &Path, _: f64, _: f64, _: u32) -> Result<Vec<u8>> {
            Ok(Vec::new())
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
        async fn loudnorm_analyze(&self, _: &Path) -> Result<LoudnormAnalysis> {
            Ok(LoudnormAnalysis {
                input_i: "-23.0".to_string(),
                input_tp: "-3.0".to_string(),
                input_lra: "7.0".to_string(),
                input_thresh: "-34.0".to_string(),
                target_offset: "1.0".to_string(),
            })
        }
        async fn loudnorm_render(
            &self,
            _: &Path,
            analysis: &LoudnormAnalysis,
            _: &Path,
            _: bool,
        ) -> Result<()> {
            *self.rendered_with.borrow_mut() = Some(analysis.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn render_pass_receives_analysis_values_verbatim() {
        let transcoder = RecordingTranscoder {
            rendered_with: RefCell::new(None),
        };
        normalize(&transcoder, Path::new("in.mp4"), Path::new("out.mp4"), false)
            .await
            .unwrap();
        let recorded = transcoder.rendered_with.borrow();
        assert_eq!(recorded.as_ref().unwrap().input_i, "-23.0");
        assert_eq!(recorded.as_ref().unwrap().target_offset, "1.0");
    }
}
