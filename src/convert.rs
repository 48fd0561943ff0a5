//! Batch conversion of input files into the configured targets

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::format::{self, Media, MediaFamily, Target};

/// Outcome of converting one input
#[derive(Debug, Clone)]
pub struct ConvertReport {
    pub input: PathBuf,
    pub family: MediaFamily,
    pub outputs: Vec<PathBuf>,
    pub processing_time_secs: f64,
}

/// `<dir>/<stem>.<ext>` for one input and target
pub fn output_path(dir: &Path, input: &Path, target: Target) -> PathBuf {
    let mut name = input.file_stem().unwrap_or(input.as_os_str()).to_os_string();
    name.push(".");
    name.push(target.extension());
    dir.join(name)
}

/// Targets written for a decoded input, in configuration order
pub fn targets_for(family: MediaFamily, config: &Config) -> Vec<Target> {
    match family {
        MediaFamily::Sound => {
            config.output.sound_targets.iter().map(|t| Target::from(*t)).collect()
        }
        MediaFamily::Image => config
            .output
            .image_targets
            .iter()
            .map(|t| t.with_storage(config.sgi.storage))
            .collect(),
    }
}

pub fn convert_file(input: &Path, config: &Config) -> Result<ConvertReport> {
    let start = Instant::now();
    let media = format::load(input)?;
    let family = media.family();

    let mut outputs = Vec::new();
    for target in targets_for(family, config) {
        let path = output_path(config.output_dir(), input, target);
        format::save(&media, &path, target)?;
        outputs.push(path);
    }

    match &media {
        Media::Sound(sound) => info!(
            "{}: {} Hz, {} ch, {} frames -> {} file(s)",
            input.display(),
            sound.frequency(),
            sound.channels(),
            sound.length(),
            outputs.len()
        ),
        Media::Image(image) => info!(
            "{}: {}x{} {} -> {} file(s)",
            input.display(),
            image.width(),
            image.height(),
            image.format().name(),
            outputs.len()
        ),
    }

    Ok(ConvertReport {
        input: input.to_path_buf(),
        family,
        outputs,
        processing_time_secs: start.elapsed().as_secs_f64(),
    })
}

/// Convert every configured input on a pool of `config.workers()` threads.
/// Results come back in input order.
pub fn convert_all(config: &Config) -> Result<Vec<(PathBuf, Result<ConvertReport>)>> {
    std::fs::create_dir_all(config.output_dir()).map_err(|e| {
        Error::filesystem(
            "convert::convert_all",
            format!("creating '{}': {}", config.output_dir().display(), e),
        )
    })?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers())
        .build()
        .map_err(|e| {
            Error::new(ErrorKind::Unknown, "convert::convert_all", format!("thread pool: {}", e))
        })?;

    let results = pool.install(|| {
        config
            .inputs
            .par_iter()
            .map(|input| {
                let result = convert_file(input, config);
                if let Err(e) = &result {
                    warn!("{}: {}", input.display(), e);
                }
                (input.clone(), result)
            })
            .collect()
    });

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ImageTarget, SoundTarget};
    use crate::image::{Image, ImageFormat, SgiStorage};
    use crate::sound::{Sound, SoundFormat};
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.directory = dir.join("out");
        config.processing.workers = 2;
        config
    }

    #[test]
    fn test_output_path() {
        let dir = Path::new("/tmp/out");
        let cases = [
            ("a/b/tone.wav", Target::Au, "/tmp/out/tone.au"),
            ("pic.rgb", Target::Raw, "/tmp/out/pic.data"),
            ("take.2.au", Target::Wav, "/tmp/out/take.2.wav"),
            ("noext", Target::Sgi(SgiStorage::Rle), "/tmp/out/noext.sgi"),
        ];
        for (input, target, expected) in cases {
            assert_eq!(output_path(dir, Path::new(input), target), PathBuf::from(expected));
        }
    }

    #[test]
    fn test_targets_for() {
        let mut config = Config::default();
        config.output.sound_targets = vec![SoundTarget::Au, SoundTarget::Raw];
        config.output.image_targets = vec![ImageTarget::Raw, ImageTarget::Sgi];
        config.sgi.storage = SgiStorage::Rle;

        assert_eq!(targets_for(MediaFamily::Sound, &config), vec![Target::Au, Target::Raw]);
        let image_targets = targets_for(MediaFamily::Image, &config);
        assert_eq!(image_targets, vec![Target::Raw, Target::Sgi(SgiStorage::Rle)]);
    }

    #[test]
    fn test_convert_all() {
        let temp_dir = TempDir::new().unwrap();
        let sound_path = temp_dir.path().join("tone.au");
        let image_path = temp_dir.path().join("pic.sgi");
        let bogus_path = temp_dir.path().join("notes.txt");

        let sound = Sound::from_data(SoundFormat::I16, 1, 8000, vec![0, 1, 0, 2]).unwrap();
        sound.save_au(&sound_path).unwrap();
        let image = Image::from_data(ImageFormat::Gray8, 2, 1, vec![9, 8]).unwrap();
        image.save_sgi(&image_path, SgiStorage::Uncompressed).unwrap();
        std::fs::write(&bogus_path, "plain text").unwrap();

        let mut config = config_in(temp_dir.path());
        config.inputs = vec![sound_path.clone(), image_path, bogus_path];
        config.output.image_targets = vec![ImageTarget::Sgi, ImageTarget::Raw];

        let results = convert_all(&config).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, sound_path);

        let sound_report = results[0].1.as_ref().unwrap();
        assert_eq!(sound_report.family, MediaFamily::Sound);
        assert_eq!(sound_report.outputs, vec![temp_dir.path().join("out/tone.wav")]);
        assert_eq!(Sound::load(&sound_report.outputs[0]).unwrap(), sound);

        let image_report = results[1].1.as_ref().unwrap();
        assert_eq!(image_report.outputs.len(), 2);
        assert_eq!(std::fs::read(temp_dir.path().join("out/pic.data")).unwrap(), vec![9, 8]);

        let err = results[2].1.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFileFormat);
        assert_eq!(err.origin(), "format::load");
    }

    #[test]
    fn test_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(temp_dir.path());
        let err = convert_file(&temp_dir.path().join("absent.wav"), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filesystem);
    }
}
