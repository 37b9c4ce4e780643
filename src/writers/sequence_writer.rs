use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{ProcessingError, Result};
use crate::models::Pollutant;
use crate::utils::naming::{animation_file_name, RenderedName};

const RENDER_EXTENSION: &str = "png";

/// Result of building one pollutant's animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    Written {
        pollutant: Pollutant,
        path: PathBuf,
        frames: usize,
    },
    /// No rendered images were found.
    Skipped { pollutant: Pollutant },
}

/// Assembles the renders of every run directory into one looping GIF per
/// pollutant.
#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    output_root: PathBuf,
    max_frames: Option<usize>,
    frame_duration_ms: u32,
}

impl SequenceBuilder {
    pub fn new(output_root: &Path, max_frames: Option<usize>, frame_duration_ms: u32) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            max_frames,
            frame_duration_ms,
        }
    }

    /// Renders of `pollutant` under the output root in path order, limited
    /// to the most recent `max_frames`.
    pub fn discover(&self, pollutant: Pollutant) -> Vec<PathBuf> {
        let mut images: Vec<PathBuf> = WalkDir::new(&self.output_root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry under output root");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let path = entry.path();
                let is_render = path.extension().and_then(|e| e.to_str()) == Some(RENDER_EXTENSION);
                is_render
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| RenderedName::parse(n).ok())
                        .is_some_and(|name| name.pollutant == pollutant)
            })
            .map(|entry| entry.into_path())
            .collect();

        images.sort();
        if let Some(cap) = self.max_frames {
            if images.len() > cap {
                images.drain(..images.len() - cap);
            }
        }
        images
    }

    pub fn build(&self, pollutant: Pollutant) -> Result<SequenceOutcome> {
        let images = self.discover(pollutant);
        if images.is_empty() {
            warn!(pollutant = %pollutant, "no rendered images, animation skipped");
            return Ok(SequenceOutcome::Skipped { pollutant });
        }

        let target = self.output_root.join(animation_file_name(pollutant));
        let frames = self.encode(&images, &target)?;
        if frames == 0 {
            warn!(pollutant = %pollutant, "no decodable frames, animation skipped");
            return Ok(SequenceOutcome::Skipped { pollutant });
        }

        info!(pollutant = %pollutant, frames, path = %target.display(), "animation written");
        Ok(SequenceOutcome::Written {
            pollutant,
            path: target,
            frames,
        })
    }

    /// Build the animation of every pollutant. Failures are logged and left
    /// out of the result.
    pub fn build_all(&self) -> Vec<SequenceOutcome> {
        Pollutant::ALL
            .iter()
            .filter_map(|&pollutant| match self.build(pollutant) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(pollutant = %pollutant, error = %e, "animation failed");
                    None
                }
            })
            .collect()
    }

    /// Encode into a temporary file beside `target`, then rename it over the
    /// previous animation. Returns the number of frames written.
    fn encode(&self, images: &[PathBuf], target: &Path) -> Result<usize> {
        std::fs::create_dir_all(&self.output_root)?;
        let mut temp = NamedTempFile::new_in(&self.output_root)?;
        let delay = Delay::from_numer_denom_ms(self.frame_duration_ms, 1);
        let mut written = 0;

        {
            let mut encoder = GifEncoder::new_with_speed(&mut temp, 10);
            encoder.set_repeat(Repeat::Infinite)?;

            for path in images {
                let decoded = match image::open(path) {
                    Ok(img) => img.to_rgba8(),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping undecodable frame");
                        continue;
                    }
                };
                encoder.encode_frame(Frame::from_parts(decoded, 0, 0, delay))?;
                written += 1;
            }
        }

        if written > 0 {
            temp.persist(target)
                .map_err(|e| ProcessingError::Io(e.error))?;
        }
        Ok(written)
    }
}
