//! Asset index and resolution tests
//!
//! Builds real audio directories in a temp dir and checks what the index
//! picks up and what the resolver chooses

use klipper_voice::assets::{resolve, AssetIndex, AudioFormat, MessageType};
use klipper_voice::player::PlayerCapability;
use klipper_voice::VoiceError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"audio").unwrap();
}

fn mp3_player() -> PlayerCapability {
    PlayerCapability::new("mpv", vec![AudioFormat::Mp3, AudioFormat::Wav])
}

#[test]
fn test_rebuild_indexes_directory() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "print_start.en.mp3");
    touch(dir.path(), "print_start.de.mp3");
    touch(dir.path(), "ready.mp3");
    touch(dir.path(), "error.en.wav");
    touch(dir.path(), "notes.txt.bak");
    touch(dir.path(), "README");
    fs::create_dir(dir.path().join("ready.en.mp3")).unwrap();

    let index = AssetIndex::rebuild(dir.path()).unwrap();
    assert_eq!(index.len(), 4);
    assert_eq!(index.lookup(&MessageType::PrintStart).len(), 2);
    assert!(index.contains(&MessageType::Ready));
    assert!(index.contains(&MessageType::Error));
    assert!(!index.contains(&MessageType::PrintEnd));

    let missing = index.missing_builtin();
    assert!(missing.contains(&MessageType::PrintEnd));
    assert!(!missing.contains(&MessageType::Ready));
}

#[test]
fn test_rebuild_is_idempotent() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "ready.en.mp3");
    touch(dir.path(), "heating.fr.ogg");
    touch(dir.path(), "custom_done.en.wav");

    let first = AssetIndex::rebuild(dir.path()).unwrap();
    let second = AssetIndex::rebuild(dir.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let index = AssetIndex::rebuild(&dir.path().join("nope")).unwrap();
    assert!(index.is_empty());
}

#[test]
fn test_language_falls_back_to_english_then_default() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "ready.en.mp3");
    touch(dir.path(), "ready.default.mp3");
    touch(dir.path(), "print_end.mp3");

    let index = AssetIndex::rebuild(dir.path()).unwrap();

    let asset = resolve(&index, &MessageType::Ready, "fr", &mp3_player()).unwrap();
    assert_eq!(asset.language, "en");
    assert_eq!(asset.path, dir.path().join("ready.en.mp3"));

    let asset = resolve(&index, &MessageType::PrintEnd, "fr", &mp3_player()).unwrap();
    assert_eq!(asset.language, "default");
}

#[test]
fn test_unplayable_formats_are_ignored() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "heating.en.opus");
    touch(dir.path(), "heating.de.wav");

    let index = AssetIndex::rebuild(dir.path()).unwrap();
    let asset = resolve(&index, &MessageType::Heating, "en", &mp3_player()).unwrap();
    assert_eq!(asset.format, AudioFormat::Wav);
    assert_eq!(asset.language, "de");

    let aplay = PlayerCapability::new("aplay", vec![AudioFormat::Wav]);
    touch(dir.path(), "error.en.mp3");
    let index = AssetIndex::rebuild(dir.path()).unwrap();
    assert!(matches!(
        resolve(&index, &MessageType::Error, "en", &aplay),
        Err(VoiceError::AssetNotFound { .. })
    ));
}
