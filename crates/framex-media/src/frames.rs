//! Still-frame extraction.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Frames extracted per second of video.
const FRAMES_PER_SECOND: u32 = 1;

/// Output filename pattern for extracted frames.
const FRAME_PATTERN: &str = "frame_%04d.png";

/// Extract still frames from a video at 1 frame per second.
///
/// Frames are written to `output_dir` as `frame_0000.png`,
/// `frame_0001.png`, … and returned sorted, so the filename sequence
/// preserves extraction order.
pub async fn extract_frames(
    video_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> MediaResult<Vec<PathBuf>> {
    extract_frames_with_timeout(video_path, output_dir, None).await
}

/// Extract frames with an optional ffmpeg timeout.
pub async fn extract_frames_with_timeout(
    video_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    timeout_secs: Option<u64>,
) -> MediaResult<Vec<PathBuf>> {
    let video_path = video_path.as_ref();
    let output_dir = output_dir.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    info!(
        "Extracting frames from {} to {}",
        video_path.display(),
        output_dir.display()
    );

    let cmd = FfmpegCommand::new(video_path, output_dir.join(FRAME_PATTERN))
        .video_filter(format!("fps={}", FRAMES_PER_SECOND))
        .start_number(0);

    let mut runner = FfmpegRunner::new();
    if let Some(secs) = timeout_secs {
        runner = runner.with_timeout(secs);
    }
    runner.run(&cmd).await?;

    let frames = list_frames(output_dir).await?;
    if frames.is_empty() {
        return Err(MediaError::NoFrames(video_path.to_path_buf()));
    }

    info!("Extraction finished, {} frames produced", frames.len());
    Ok(frames)
}

/// List extracted PNG frames in filename order.
async fn list_frames(output_dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            frames.push(path);
        }
    }

    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_input_is_rejected_before_spawning() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.mp4");

        let err = extract_frames(&missing, dir.path()).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_frames_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["frame_0002.png", "frame_0000.png", "frame_0001.png", "ignore.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let frames = list_frames(dir.path()).await.unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]);
    }
}
