//! Tag extraction backed by `lofty`.

use std::path::Path;

use lofty::file::TaggedFileExt;
use lofty::prelude::{Accessor, AudioFile};
use lofty::read_from_path;
use lofty::tag::{ItemKey, Tag};

use crate::song::Song;

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> String
where
    F: FnMut(&Tag) -> Option<String>,
{
    if let Some(tag) = primary_tag {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    for tag in tags {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    String::new()
}

/// Parses a year from a date-like string by taking its leading digits.
fn parse_year(date: &str) -> i32 {
    let leading: String = date.chars().take(4).collect();
    if leading.chars().count() == 4 {
        leading.parse().unwrap_or(0)
    } else {
        0
    }
}

/// Parses "3" and "3/12" style track or disc number strings.
fn parse_position(value: &str) -> u32 {
    value
        .split('/')
        .next()
        .and_then(|part| part.trim().parse().ok())
        .unwrap_or(0)
}

/// Reads a validated song record from a media file.
///
/// Returns `None` when the file is not a recognized audio file. Fields
/// missing from the tags stay at their "unset" values; out-of-range
/// numbers are zeroed by the validation pass.
pub fn read_song(path: &Path) -> Option<Song> {
    let tagged_file = read_from_path(path).ok()?;
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    let title = first_non_empty_value(primary_tag, tags, |tag| {
        tag.title().map(|value| value.into_owned())
    });
    let artist = first_non_empty_value(primary_tag, tags, |tag| {
        tag.artist().map(|value| value.into_owned())
    });
    let album = first_non_empty_value(primary_tag, tags, |tag| {
        tag.album().map(|value| value.into_owned())
    });
    let genre = first_non_empty_value(primary_tag, tags, |tag| {
        tag.genre().map(|value| value.into_owned())
    });
    let year = {
        let direct_year = first_non_empty_value(primary_tag, tags, |tag| {
            tag.get_string(&ItemKey::Year)
                .map(str::to_string)
                .or_else(|| tag.year().map(|value| value.to_string()))
        });
        if direct_year.is_empty() {
            let date = first_non_empty_value(primary_tag, tags, |tag| {
                tag.get_string(&ItemKey::RecordingDate)
                    .or_else(|| tag.get_string(&ItemKey::OriginalReleaseDate))
                    .map(str::to_string)
            });
            parse_year(&date)
        } else {
            parse_year(&direct_year)
        }
    };
    let track = {
        let raw = first_non_empty_value(primary_tag, tags, |tag| {
            tag.get_string(&ItemKey::TrackNumber)
                .map(str::to_string)
                .or_else(|| tag.track().map(|value| value.to_string()))
        });
        parse_position(&raw)
    };
    let disc = {
        let raw = first_non_empty_value(primary_tag, tags, |tag| {
            tag.get_string(&ItemKey::DiscNumber)
                .map(str::to_string)
                .or_else(|| tag.disk().map(|value| value.to_string()))
        });
        parse_position(&raw)
    };
    let length = tagged_file.properties().duration().as_secs() as u32;

    let title = if title.is_empty() {
        fallback_title_from_path(path)
    } else {
        title
    };

    Some(Song::validated(
        path.to_string_lossy().to_string(),
        title,
        artist,
        album,
        genre,
        year,
        track,
        disc,
        length,
    ))
}

fn fallback_title_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_default()
}
