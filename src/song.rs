//! Persisted song record and its numeric-range validation policy.

/// Earliest year accepted from a tag.
pub const YEAR_MIN: i32 = 1000;
/// Latest year accepted from a tag.
pub const YEAR_MAX: i32 = 3000;
/// Largest track or disc number accepted from a tag.
pub const TRACK_MAX: u32 = 999;
/// Longest track length accepted, in seconds (99 hours).
pub const LENGTH_MAX: u32 = 99 * 3600;
/// Highest rating value. 11 is deliberately one better than 10.
pub const RATING_MAX: u32 = 11;

/// One audio file's metadata as stored and indexed.
///
/// `id` is the synthetic store key, 0 until the row has been inserted.
/// Empty strings mean "unset"; numeric fields use 0 for "unknown".
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Song {
    pub id: i64,
    /// Absolute file path, unique across the catalog.
    pub filename: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub year: i32,
    pub track: u32,
    pub disc: u32,
    /// Length in seconds.
    pub length: u32,
    pub rating: u32,
}

impl Song {
    /// Resets every out-of-range numeric field to its "unknown" value.
    ///
    /// Values outside their valid range are zeroed, never clamped to the
    /// nearest boundary and never treated as an error. Applied to every
    /// song regardless of whether it came from tags or from storage.
    pub fn validate(&mut self) {
        if self.year < YEAR_MIN || self.year > YEAR_MAX {
            self.year = 0;
        }
        if self.track < 1 || self.track > TRACK_MAX {
            self.track = 0;
        }
        if self.disc < 1 || self.disc > TRACK_MAX {
            self.disc = 0;
        }
        if self.length < 1 || self.length > LENGTH_MAX {
            self.length = 0;
        }
        if self.rating > RATING_MAX {
            self.rating = 0;
        }
    }

    /// Validating constructor used by tag extraction and tests.
    #[allow(clippy::too_many_arguments)]
    pub fn validated(
        filename: String,
        title: String,
        artist: String,
        album: String,
        genre: String,
        year: i32,
        track: u32,
        disc: u32,
        length: u32,
    ) -> Self {
        let mut song = Song {
            id: 0,
            filename,
            title,
            artist,
            album,
            genre,
            year,
            track,
            disc,
            length,
            rating: 0,
        };
        song.validate();
        song
    }
}

/// Clamps a rating to the valid range using the same lossy policy as
/// tag fields: out of range resets to 0 (unrated).
pub fn validated_rating(rating: u32) -> u32 {
    if rating > RATING_MAX {
        0
    } else {
        rating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song_with_year(year: i32) -> Song {
        Song::validated(
            "/music/a.mp3".to_string(),
            "A".to_string(),
            String::new(),
            String::new(),
            String::new(),
            year,
            1,
            1,
            180,
        )
    }

    #[test]
    fn test_year_below_range_resets_to_zero() {
        assert_eq!(song_with_year(500).year, 0);
    }

    #[test]
    fn test_year_above_range_resets_to_zero() {
        assert_eq!(song_with_year(3001).year, 0);
    }

    #[test]
    fn test_year_boundaries_are_kept() {
        assert_eq!(song_with_year(1000).year, 1000);
        assert_eq!(song_with_year(3000).year, 3000);
    }

    #[test]
    fn test_track_and_disc_out_of_range_reset_to_zero() {
        let mut song = song_with_year(1999);
        song.track = 1000;
        song.disc = 1000;
        song.validate();
        assert_eq!(song.track, 0);
        assert_eq!(song.disc, 0);
    }

    #[test]
    fn test_length_out_of_range_resets_to_zero() {
        let mut song = song_with_year(1999);
        song.length = LENGTH_MAX + 1;
        song.validate();
        assert_eq!(song.length, 0);
    }

    #[test]
    fn test_rating_eleven_is_valid() {
        assert_eq!(validated_rating(11), 11);
        assert_eq!(validated_rating(12), 0);
    }
}
