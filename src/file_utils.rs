use anyhow::{anyhow, Context, Result};
use log::info;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

// @module: File and directory utilities

const VIDEO_EXTENSIONS: [&str; 14] = [
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
];

const AUDIO_EXTENSIONS: [&str; 10] = ["mp3", "wav", "flac", "ogg", "oga", "opus", "m4a", "aac", "wma", "mka"];

/// Kind of input file, judged by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Subtitle file (SRT)
    Subtitle,
    /// Video container with an audio stream
    Video,
    /// Audio only file
    Audio,
    /// Anything else; still handed to ffmpeg when transcribing
    Unknown,
}

impl FileType {
    /// Whether ffmpeg is expected to find audio in this file
    pub fn has_audio(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Detect the kind of an existing file from its extension
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(anyhow!("File does not exist: {:?}", path));
        }
        if path.is_dir() {
            return Err(anyhow!("{:?} is a directory", path));
        }

        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Ok(match ext.as_str() {
            "srt" => FileType::Subtitle,
            e if VIDEO_EXTENSIONS.contains(&e) => FileType::Video,
            e if AUDIO_EXTENSIONS.contains(&e) => FileType::Audio,
            _ => FileType::Unknown,
        })
    }

    // @generates: `<dir>/<stem>.<extension>` next to the input
    pub fn default_output_path<P: AsRef<Path>>(input_file: P, extension: &str) -> PathBuf {
        let input_file = input_file.as_ref();
        let stem = input_file.file_stem().unwrap_or_default();

        let mut file_name = OsString::from(stem);
        file_name.push(".");
        file_name.push(extension);

        input_file.with_file_name(file_name)
    }

    /// Move an existing file out of the way to `<path>.bak`
    ///
    /// Returns the backup path when something was moved. An older backup is
    /// replaced.
    pub fn backup_existing<P: AsRef<Path>>(path: P) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let mut backup = path.as_os_str().to_owned();
        backup.push(".bak");
        let backup = PathBuf::from(backup);

        fs::rename(path, &backup).with_context(|| format!("Failed to back up {:?} to {:?}", path, backup))?;
        info!("Existing subtitle backed up to {}", backup.display());
        Ok(Some(backup))
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file, creating parent directories
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content).with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }
}
