//! # Sources
//!
//! Where playable audio comes from. A [`TrackSource`] is resolved once when
//! the request is made (so the reply can name the track) and turned into a
//! songbird [`Input`] only when the consumption loop starts it.

pub mod clips;
pub mod youtube;

use anyhow::Result;
use songbird::input::{File, Input, YoutubeDl};
use std::{path::PathBuf, time::Duration};

pub use clips::ClipLibrary;
pub use youtube::YouTubeClient;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Anything yt-dlp understands, stored as the canonical page URL.
    YouTube(String),
    /// A local audio file from the clip library.
    Clip(PathBuf),
}

/// A resolved, not yet streaming, piece of audio.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    title: String,
    url: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    kind: SourceKind,
}

impl TrackSource {
    pub fn youtube(title: String, url: String) -> Self {
        Self {
            title,
            url: Some(url.clone()),
            duration: None,
            thumbnail: None,
            kind: SourceKind::YouTube(url),
        }
    }

    pub fn clip(title: String, path: PathBuf) -> Self {
        Self {
            title,
            url: None,
            duration: None,
            thumbnail: None,
            kind: SourceKind::Clip(path),
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    #[cfg(test)]
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    // Setters
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    /// Builds the lazy songbird input. yt-dlp is asked again here so the
    /// stream URL is fresh even if the entry waited in the queue for a while.
    pub fn to_input(&self, http: &reqwest::Client) -> Input {
        match &self.kind {
            SourceKind::YouTube(url) => YoutubeDl::new(http.clone(), url.clone()).into(),
            SourceKind::Clip(path) => File::new(path.clone()).into(),
        }
    }
}

/// Checks that the external programs needed for streaming are installed.
pub async fn health_check() -> Result<()> {
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp or ffmpeg is missing");
    }
}
