use assert_cmd::Command;
use mediacodec::{Image, ImageFormat, SgiStorage, Sound, SoundFormat};
use predicates::prelude::*;
use tempfile::TempDir;

fn media_convert() -> Command {
    Command::cargo_bin("media-convert").unwrap()
}

#[test]
fn test_print_config() {
    media_convert()
        .args(["--print-config", "-s", "au,raw", "-j", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[output]"))
        .stdout(predicate::str::contains("\"au\""))
        .stdout(predicate::str::contains("workers = 1"));
}

#[test]
fn test_requires_inputs() {
    media_convert().assert().failure();
}

#[test]
fn test_converts_sound_and_image() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("converted");
    let sound_path = temp_dir.path().join("tone.au");
    let image_path = temp_dir.path().join("pic.sgi");

    let sound = Sound::from_data(SoundFormat::I16, 1, 8000, vec![1, 0, 2, 0, 3, 0]).unwrap();
    sound.save_au(&sound_path).unwrap();
    let image = Image::from_data(ImageFormat::Rgb8, 2, 2, vec![5; 12]).unwrap();
    image.save_sgi(&image_path, SgiStorage::Uncompressed).unwrap();

    media_convert()
        .arg("-o")
        .arg(&out_dir)
        .args(["-s", "wav", "-i", "sgi", "--sgi-storage", "rle", "-j", "1"])
        .arg(&sound_path)
        .arg(&image_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("tone.wav"))
        .stdout(predicate::str::contains("pic.sgi"));

    assert_eq!(Sound::load(out_dir.join("tone.wav")).unwrap(), sound);
    let converted = std::fs::read(out_dir.join("pic.sgi")).unwrap();
    assert_eq!(converted[2], 1, "rle storage flag");
    assert_eq!(Image::load(out_dir.join("pic.sgi")).unwrap(), image);
}

#[test]
fn test_failure_is_reported_with_status_line() {
    let temp_dir = TempDir::new().unwrap();
    let good = temp_dir.path().join("good.au");
    let bad = temp_dir.path().join("bad.wav");

    Sound::new(SoundFormat::I8, 4, 1, 8000).unwrap().save_au(&good).unwrap();
    std::fs::write(&bad, b"RIFX....").unwrap();

    media_convert()
        .arg("-o")
        .arg(temp_dir.path().join("out"))
        .args(["-j", "1"])
        .arg(&good)
        .arg(&bad)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "format::load : Unknown file format, no known signature (",
        ))
        .stderr(predicate::str::contains(format!("{}').", bad.display())));

    assert!(temp_dir.path().join("out/good.wav").exists());
}

#[test]
fn test_duplicate_stems_rejected() {
    let temp_dir = TempDir::new().unwrap();
    media_convert()
        .current_dir(temp_dir.path())
        .args(["a/x.wav", "b/x.au"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config::validate"));
}
