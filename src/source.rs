use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where a conversion's audio comes from.
///
/// Remote sources are fetched into a scratch directory before decoding, so
/// the pipeline only ever reads local files.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    LocalFile(PathBuf),
    RemoteUrl(String),
}

impl AudioSource {
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::RemoteUrl(input.to_string())
        } else {
            Self::LocalFile(PathBuf::from(input))
        }
    }
}

/// A local media file ready for decoding. Downloaded audio lives in a
/// scratch directory that is removed when this is dropped.
pub struct ResolvedInput {
    path: PathBuf,
    scratch: Option<PathBuf>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ResolvedInput {
    fn drop(&mut self) {
        if let Some(dir) = self.scratch.take() {
            if let Err(err) = std::fs::remove_dir_all(&dir) {
                log::warn!("Could not clean up {}: {}", dir.display(), err);
            }
        }
    }
}

pub fn resolve(source: &AudioSource) -> Result<ResolvedInput> {
    match source {
        AudioSource::LocalFile(path) => {
            if !path.exists() {
                anyhow::bail!("Input file not found: {}", path.display());
            }
            Ok(ResolvedInput {
                path: path.clone(),
                scratch: None,
            })
        }
        AudioSource::RemoteUrl(url) => download(url),
    }
}

/// Fetch the best audio stream as WAV. The output template names the file
/// after the video title, which later becomes the sheet's default name.
fn download(url: &str) -> Result<ResolvedInput> {
    let scratch = std::env::temp_dir().join(format!("skynote-{}", std::process::id()));
    std::fs::create_dir_all(&scratch)
        .with_context(|| format!("Failed to create {}", scratch.display()))?;
    let template = scratch.join("%(title)s.%(ext)s");

    log::info!("Downloading audio from {}", url);
    let output = Command::new("yt-dlp")
        .arg("-f")
        .arg("bestaudio/best")
        .arg("--no-playlist")
        .arg("-x")
        .arg("--audio-format")
        .arg("wav")
        .arg("-o")
        .arg(&template)
        .arg(url)
        .output()
        .context("Failed to spawn yt-dlp. Is yt-dlp installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("yt-dlp exited with error:\n{}", stderr);
    }

    let path = newest_file(&scratch)?.context("No audio file found after download")?;
    log::info!("Downloaded {}", path.display());
    Ok(ResolvedInput {
        path,
        scratch: Some(scratch),
    })
}

fn newest_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_remote_sources() {
        assert_eq!(
            AudioSource::parse("https://example.com/watch?v=abc"),
            AudioSource::RemoteUrl("https://example.com/watch?v=abc".into())
        );
        assert_eq!(
            AudioSource::parse("http://example.com/tune.mp3"),
            AudioSource::RemoteUrl("http://example.com/tune.mp3".into())
        );
    }

    #[test]
    fn paths_are_local_sources() {
        assert_eq!(
            AudioSource::parse("songs/tune.wav"),
            AudioSource::LocalFile(PathBuf::from("songs/tune.wav"))
        );
    }

    #[test]
    fn missing_local_files_are_rejected() {
        let source = AudioSource::parse("definitely/not/here.wav");
        assert!(resolve(&source).is_err());
    }
}
