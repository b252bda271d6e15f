use async_process::Command;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

use super::TrackSource;
use crate::error::BotError;

/// What the user typed after `play`.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Url(Url),
    Search(String),
}

impl Query {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Query::Url(url),
            _ => Query::Search(input.to_string()),
        }
    }

    /// Argument handed to yt-dlp; searches take the first hit.
    fn target(&self) -> String {
        match self {
            Query::Url(url) => url.to_string(),
            Query::Search(terms) => format!("ytsearch1:{terms}"),
        }
    }
}

/// Metadata printed by `yt-dlp --dump-json`.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: String,
}

impl From<YtDlpInfo> for TrackSource {
    fn from(info: YtDlpInfo) -> Self {
        let mut track = TrackSource::youtube(info.title, info.webpage_url);

        if let Some(seconds) = info.duration.filter(|s| s.is_finite() && *s > 0.0) {
            track = track.with_duration(Duration::from_secs_f64(seconds));
        }

        if let Some(thumbnail) = info.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }

        track
    }
}

/// Resolves URLs and search terms to tracks through yt-dlp.
pub struct YouTubeClient {
    // Caps concurrent yt-dlp processes
    rate_limiter: Semaphore,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: Semaphore::new(3),
        }
    }

    pub async fn resolve(&self, input: &str) -> Result<TrackSource, BotError> {
        let query = Query::parse(input);
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| BotError::Source(e.to_string()))?;

        info!("🔍 Resolving: {}", input);

        let target = query.target();
        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                target.as_str(),
            ])
            .output()
            .await
            .map_err(|e| BotError::Source(format!("yt-dlp konnte nicht gestartet werden: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(BotError::Source(error.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let track = parse_dump(&stdout)
            .ok_or_else(|| BotError::Source(format!("Nichts gefunden für `{input}`")))?;

        debug!("📊 Resolved {} -> {:?}", input, track.url());
        Ok(track)
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Takes the first JSON line yt-dlp printed.
fn parse_dump(stdout: &str) -> Option<TrackSource> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
        .map(TrackSource::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn urls_and_search_terms_are_told_apart() {
        assert!(matches!(
            Query::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Query::Url(_)
        ));
        assert!(matches!(Query::parse(" https://youtu.be/dQw4w9WgXcQ "), Query::Url(_)));
        assert_eq!(
            Query::parse("never gonna give you up"),
            Query::Search("never gonna give you up".to_string())
        );
        // Only http(s) counts as a link
        assert!(matches!(Query::parse("ftp://example.com/song"), Query::Search(_)));
        assert_eq!(Query::parse("lofi beats").target(), "ytsearch1:lofi beats");
    }

    #[test]
    fn dump_json_becomes_a_track() {
        let stdout = r#"{"title":"Song","duration":212.0,"thumbnail":"https://i.ytimg.com/x.jpg","webpage_url":"https://www.youtube.com/watch?v=abc","extra":1}"#;

        let track = parse_dump(stdout).unwrap();
        assert_eq!(track.title(), "Song");
        assert_eq!(track.duration(), Some(Duration::from_secs(212)));
        assert_eq!(track.thumbnail(), Some("https://i.ytimg.com/x.jpg"));
        assert_eq!(
            track.kind(),
            &SourceKind::YouTube("https://www.youtube.com/watch?v=abc".to_string())
        );
    }

    #[test]
    fn live_streams_have_no_duration() {
        let stdout = "\n{\"title\":\"Live\",\"duration\":null,\"webpage_url\":\"https://youtu.be/live\"}\n";
        let track = parse_dump(stdout).unwrap();
        assert_eq!(track.duration(), None);
        assert!(parse_dump("not json").is_none());
    }
}
