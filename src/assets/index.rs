//! Directory scan building the `(type, language, format) -> file` table

use super::{AudioAsset, AudioFormat, MessageType, DEFAULT_LANGUAGE};
use crate::Result;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key of an asset within one message type
type AssetKey = (String, AudioFormat);

/// Snapshot of the audio directory
///
/// Never mutated after construction; a rescan builds a new index which
/// replaces the old one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetIndex {
    root: PathBuf,
    assets: BTreeMap<MessageType, BTreeMap<AssetKey, AudioAsset>>,
}

impl AssetIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `dir` and build a fresh index
    ///
    /// Only regular files directly inside `dir` are considered. Files whose
    /// names don't follow `<type>.<lang>.<format>` (or `<type>.<format>`) are
    /// skipped with a warning. A missing directory yields an empty index.
    pub fn rebuild(dir: &Path) -> Result<Self> {
        let mut index = Self {
            root: dir.to_path_buf(),
            assets: BTreeMap::new(),
        };

        if !dir.exists() {
            warn!("Audio directory does not exist: {}", dir.display());
            return Ok(index);
        }

        // Sorted so collisions resolve the same way on every scan
        let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
                warn!("Skipping non UTF-8 file name in {}", dir.display());
                continue;
            };

            match parse_filename(filename) {
                Some((message_type, language, format)) => {
                    debug!(
                        "Found audio file: {} -> {} ({}, {})",
                        message_type,
                        path.display(),
                        language,
                        format
                    );
                    index.insert(AudioAsset {
                        message_type,
                        language,
                        format,
                        path,
                    });
                }
                None => warn!("Skipping malformed audio file name: {}", filename),
            }
        }

        info!(
            "Audio file scan complete. Found {} files for {} message types",
            index.len(),
            index.assets.len()
        );

        Ok(index)
    }

    /// Insert an asset, replacing any earlier one with the same identity
    pub fn insert(&mut self, asset: AudioAsset) {
        let key = (asset.language.clone(), asset.format.clone());
        self.assets
            .entry(asset.message_type.clone())
            .or_default()
            .insert(key, asset);
    }

    /// All assets for a message type, ordered by (language, format)
    pub fn lookup(&self, message_type: &MessageType) -> Vec<&AudioAsset> {
        self.assets
            .get(message_type)
            .map(|by_key| by_key.values().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, message_type: &MessageType) -> bool {
        self.assets.contains_key(message_type)
    }

    /// Message types with at least one file
    pub fn message_types(&self) -> Vec<&MessageType> {
        self.assets.keys().collect()
    }

    /// Built-in types that have no file at all
    pub fn missing_builtin(&self) -> Vec<MessageType> {
        MessageType::BUILTIN
            .iter()
            .filter(|t| !self.contains(t))
            .cloned()
            .collect()
    }

    /// Directory the index was built from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Total number of indexed files
    pub fn len(&self) -> usize {
        self.assets.values().map(|by_key| by_key.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Split a file name into `(type, language, format)`
///
/// `ready.mp3` has no language part and is filed under `default`.
fn parse_filename(filename: &str) -> Option<(MessageType, String, AudioFormat)> {
    if filename.starts_with('.') {
        return None;
    }

    let mut parts = filename.rsplitn(3, '.');
    let format: AudioFormat = parts.next()?.parse().ok()?;
    let second = parts.next()?;
    let (message_type, language) = match parts.next() {
        Some(rest) => (rest, second),
        None => (second, DEFAULT_LANGUAGE),
    };

    if message_type.is_empty() || language.is_empty() {
        return None;
    }

    Some((MessageType::from(message_type), language.to_string(), format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_three_part_name() {
        let (t, lang, fmt) = parse_filename("print_start.en.mp3").unwrap();
        assert_eq!(t, MessageType::PrintStart);
        assert_eq!(lang, "en");
        assert_eq!(fmt, AudioFormat::Mp3);
    }

    #[test]
    fn test_parse_two_part_name_is_default_language() {
        let (t, lang, fmt) = parse_filename("ready.wav").unwrap();
        assert_eq!(t, MessageType::Ready);
        assert_eq!(lang, DEFAULT_LANGUAGE);
        assert_eq!(fmt, AudioFormat::Wav);
    }

    #[test]
    fn test_parse_dotted_type() {
        let (t, lang, _) = parse_filename("bed.level.zh.ogg").unwrap();
        assert_eq!(t, MessageType::Custom("bed.level".to_string()));
        assert_eq!(lang, "zh");
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_filename("README").is_none());
        assert!(parse_filename("notes.txt").is_none());
        assert!(parse_filename(".hidden.en.mp3").is_none());
        assert!(parse_filename("..mp3").is_none());
        assert!(parse_filename("mp3").is_none());
    }

    #[test]
    fn test_insert_overwrites_same_identity() {
        let mut index = AssetIndex::new();
        for p in ["/a/ready.en.mp3", "/b/ready.en.mp3"] {
            index.insert(AudioAsset {
                message_type: MessageType::Ready,
                language: "en".to_string(),
                format: AudioFormat::Mp3,
                path: PathBuf::from(p),
            });
        }
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.lookup(&MessageType::Ready)[0].path,
            PathBuf::from("/b/ready.en.mp3")
        );
    }

    #[test]
    fn test_missing_builtin() {
        let mut index = AssetIndex::new();
        assert_eq!(index.missing_builtin().len(), MessageType::BUILTIN.len());
        index.insert(AudioAsset {
            message_type: MessageType::Ready,
            language: "en".to_string(),
            format: AudioFormat::Mp3,
            path: PathBuf::from("/x/ready.en.mp3"),
        });
        assert!(!index.missing_builtin().contains(&MessageType::Ready));
    }
}
