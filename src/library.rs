use crate::model::TrackInfo;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::{Hint, ProbeResult};
use symphonia::default::get_probe;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "ogg", "aac", "wma", "opus"];
const UNKNOWN_FILE: &str = "Unknown File";

#[derive(Default)]
struct RawTags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
}

impl RawTags {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none()
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_FILE.to_string())
}

pub fn format_time(total_seconds: u64) -> String {
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes}:{seconds:02}")
}

pub fn parse_time(input: &str) -> Option<u64> {
    let mut total = 0_u64;
    let mut parts = 0;
    for part in input.trim().split(':') {
        let value: u64 = part.trim().parse().ok()?;
        if parts > 0 && value >= 60 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(value)?;
        parts += 1;
    }
    (parts <= 3).then_some(total)
}

pub fn scan_folder(root: &Path) -> Vec<PathBuf> {
    let mut tracks: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    tracks.sort();
    tracks
}

pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            out.extend(scan_folder(input));
        } else if is_audio_file(input) {
            out.push(input.clone());
        } else {
            log::debug!("skipping non-audio input {}", input.display());
        }
    }
    out
}

pub fn read_track_info(path: &Path) -> TrackInfo {
    let stripped = crate::config::strip_windows_verbatim_prefix(path);
    let (mut tags, mut duration_secs) = lofty_tags(&stripped);
    if tags.is_empty() {
        let (fallback, fallback_duration) = symphonia_tags(&stripped);
        tags = fallback;
        duration_secs = duration_secs.or(fallback_duration);
    }

    TrackInfo {
        title: tags
            .title
            .unwrap_or_else(|| TrackInfo::UNKNOWN_TITLE.to_string()),
        artist: tags
            .artist
            .unwrap_or_else(|| TrackInfo::UNKNOWN_ARTIST.to_string()),
        album: tags
            .album
            .unwrap_or_else(|| TrackInfo::UNKNOWN_ALBUM.to_string()),
        duration_secs,
    }
}

fn lofty_tags(path: &Path) -> (RawTags, Option<u64>) {
    let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(file) => file,
        Err(err) => {
            log::debug!("lofty could not read {}: {err}", path.display());
            return (RawTags::default(), None);
        }
    };

    let duration = tagged_file.properties().duration();
    let duration_secs = (!duration.is_zero()).then(|| duration.as_secs());

    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return (RawTags::default(), duration_secs);
    };

    let tags = RawTags {
        title: tag.title().and_then(|value| clean_tag_value(&value)),
        artist: tag.artist().and_then(|value| clean_tag_value(&value)),
        album: tag.album().and_then(|value| clean_tag_value(&value)),
    };
    (tags, duration_secs)
}

fn probe_with_symphonia(path: &Path) -> Option<ProbeResult> {
    let file = File::open(path).ok()?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()
}

fn symphonia_tags(path: &Path) -> (RawTags, Option<u64>) {
    let Some(mut probed) = probe_with_symphonia(path) else {
        return (RawTags::default(), None);
    };

    let duration_secs = probed
        .format
        .default_track()
        .and_then(|track| codec_duration_seconds(&track.codec_params));

    let metadata = probed.format.metadata();
    let Some(revision) = metadata.current() else {
        return (RawTags::default(), duration_secs);
    };

    let tags = revision.tags();
    let raw = RawTags {
        title: tag_value(tags, StandardTagKey::TrackTitle, &["title"]),
        artist: tag_value(
            tags,
            StandardTagKey::Artist,
            &["artist", "albumartist", "album_artist"],
        ),
        album: tag_value(tags, StandardTagKey::Album, &["album"]),
    };
    (raw, duration_secs)
}

fn codec_duration_seconds(codec_params: &symphonia::core::codecs::CodecParameters) -> Option<u64> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        return Some(time.seconds + u64::from(time.frac >= 0.5));
    }

    codec_params
        .n_frames
        .zip(codec_params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)
        .map(|(frames, sample_rate)| (frames as f64 / f64::from(sample_rate)).round() as u64)
}

fn tag_value(
    tags: &[symphonia::core::meta::Tag],
    standard_key: StandardTagKey,
    fallback_keys: &[&str],
) -> Option<String> {
    tags.iter()
        .find(|tag| tag.std_key == Some(standard_key))
        .or_else(|| {
            tags.iter().find(|tag| {
                fallback_keys
                    .iter()
                    .any(|key| tag.key.eq_ignore_ascii_case(key))
            })
        })
        .and_then(|tag| clean_tag_value(&tag.value.to_string()))
}

fn clean_tag_value(value: &str) -> Option<String> {
    let trimmed = value.trim_matches('\0').trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn embedded_cover_art(path: &Path) -> Option<Vec<u8>> {
    let stripped = crate::config::strip_windows_verbatim_prefix(path);
    lofty_cover_art(&stripped).or_else(|| symphonia_cover_art(&stripped))
}

fn lofty_cover_art(path: &Path) -> Option<Vec<u8>> {
    let tagged_file = Probe::open(path).ok()?.read().ok()?;
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())?;
    let pictures = tag.pictures();
    pictures
        .iter()
        .find(|picture| picture.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
        .map(|picture| picture.data().to_vec())
        .filter(|data| !data.is_empty())
}

fn symphonia_cover_art(path: &Path) -> Option<Vec<u8>> {
    let mut probed = probe_with_symphonia(path)?;
    let metadata = probed.format.metadata();
    let revision = metadata.current()?;
    revision
        .visuals()
        .iter()
        .find(|visual| !visual.data.is_empty())
        .map(|visual| visual.data.to_vec())
}
