use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use super::TrackSource;
use crate::error::BotError;

const CLIP_EXTENSIONS: [&str; 5] = ["mp3", "ogg", "wav", "flac", "m4a"];

fn clip_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid clip name regex"))
}

/// Short local audio files, addressed by file stem.
#[derive(Debug, Clone)]
pub struct ClipLibrary {
    dir: PathBuf,
}

impl ClipLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Finds `name` with any known extension. Names are bare stems, so a
    /// request can never point outside the clip directory.
    pub async fn resolve(&self, name: &str) -> Result<TrackSource, BotError> {
        let name = name.trim();
        if !clip_name_pattern().is_match(name) {
            return Err(BotError::InvalidArgument(format!(
                "`{name}` ist kein gültiger Clipname"
            )));
        }

        let path = self
            .clip_paths()
            .await
            .into_iter()
            .filter(|path| clip_name(path) == Some(name))
            .min()
            .ok_or_else(|| BotError::ClipNotFound(name.to_string()))?;

        debug!("🔈 Clip {} -> {}", name, path.display());
        Ok(TrackSource::clip(name.to_string(), path))
    }

    /// Sorted names of every playable clip. A missing directory is an empty library.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .clip_paths()
            .await
            .iter()
            .filter_map(|path| clip_name(path))
            .map(str::to_string)
            .collect();

        names.sort();
        names.dedup();
        names
    }

    async fn clip_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return paths;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if is_file {
                paths.push(entry.path());
            }
        }
        paths
    }
}

/// The clip name of `path`: its stem, if the extension is a known audio
/// format (any case) and the stem is a valid clip name.
fn clip_name(path: &Path) -> Option<&str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !CLIP_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| clip_name_pattern().is_match(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;
    use pretty_assertions::assert_eq;

    fn library_with(files: &[&str]) -> (tempfile::TempDir, ClipLibrary) {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), b"RIFF").unwrap();
        }
        let library = ClipLibrary::new(dir.path());
        (dir, library)
    }

    #[tokio::test]
    async fn resolves_clip_by_stem() {
        let (dir, library) = library_with(&["airhorn.mp3", "notes.txt"]);

        let clip = library.resolve("airhorn").await.unwrap();
        assert_eq!(clip.title(), "airhorn");
        assert_eq!(clip.kind(), &SourceKind::Clip(dir.path().join("airhorn.mp3")));

        assert!(matches!(
            library.resolve("notes").await,
            Err(BotError::ClipNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_names_that_look_like_paths() {
        let (_dir, library) = library_with(&["airhorn.mp3"]);

        for name in ["../airhorn", "sub/airhorn", "", "air horn"] {
            assert!(
                matches!(library.resolve(name).await, Err(BotError::InvalidArgument(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn upper_case_extensions_are_listed_and_playable() {
        let (dir, library) = library_with(&["horn.MP3", "Intro.Ogg"]);

        assert_eq!(
            library.list().await,
            vec!["Intro".to_string(), "horn".to_string()]
        );

        let clip = library.resolve("horn").await.unwrap();
        assert_eq!(clip.kind(), &SourceKind::Clip(dir.path().join("horn.MP3")));
        assert!(library.resolve("Intro").await.is_ok());

        // Stems stay case-sensitive.
        assert!(matches!(
            library.resolve("HORN").await,
            Err(BotError::ClipNotFound(_))
        ));
    }

    #[tokio::test]
    async fn lists_only_audio_files() {
        let (_dir, library) = library_with(&["b.ogg", "a.mp3", "a.wav", "readme.md"]);
        assert_eq!(library.list().await, vec!["a".to_string(), "b".to_string()]);

        let missing = ClipLibrary::new("/definitely/not/here");
        assert!(missing.list().await.is_empty());
    }
}
