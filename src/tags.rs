//! ID3 metadata and album art for local audio files.

use crate::error::PlayerError;
use id3::TagLike;
use std::path::Path;
use tracing::{debug, warn};

/// Decoded album art, RGBA8 unmultiplied.
#[derive(Clone, PartialEq, Eq)]
pub struct Artwork {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for Artwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artwork")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork: Option<Artwork>,
}

impl TrackTags {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none() && self.artwork.is_none()
    }

    /// "Artist - Title" when both are known.
    pub fn headline(&self) -> Option<String> {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(format!("{artist} - {title}")),
            (None, Some(title)) => Some(title.clone()),
            _ => None,
        }
    }
}

pub fn read_tags(path: &Path) -> Result<TrackTags, PlayerError> {
    let tag = id3::Tag::read_from_path(path).map_err(|e| PlayerError::TagParse(e.to_string()))?;

    let artwork = match tag.pictures().next() {
        Some(picture) => match decode_artwork(&picture.data) {
            Ok(art) => Some(art),
            Err(e) => {
                warn!(path = %path.display(), "{e}");
                None
            }
        },
        None => None,
    };

    Ok(TrackTags {
        title: tag.title().map(str::to_string),
        artist: tag.artist().map(str::to_string),
        album: tag.album().map(str::to_string),
        artwork,
    })
}

/// Never fails: a missing or broken tag means no metadata and no artwork.
pub fn read_tags_or_default(path: &Path) -> TrackTags {
    match read_tags(path) {
        Ok(tags) => tags,
        Err(e) => {
            debug!(path = %path.display(), "No usable tag: {e}");
            TrackTags::default()
        }
    }
}

pub fn decode_artwork(bytes: &[u8]) -> Result<Artwork, PlayerError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| PlayerError::TagParse(format!("Failed to decode album art: {e}")))?;
    let image = image.to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Artwork {
        width,
        height,
        rgba: image.into_raw(),
    })
}
