//! The title record model and its codecs
//!
//! Three representations of the same record:
//! - `TitleRecord`, the decoded form the rest of the crate works with,
//! - the protobuf `Meta` message, which doubles as the persisted binary form,
//! - the JSON form served over HTTP (serde, camelCase, omit-empty).

use std::str::FromStr;

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::proto;

/// Number of columns in every row of title.basics.tsv, header included.
pub const EXPECTED_COLUMNS: usize = 9;

/// Sentinel the dataset uses for an absent optional field.
const ABSENT: &str = "\\N";

/// All title types in the title.basics.tsv.gz dataset as of 2021-01-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TitleType {
    Movie,
    Short,
    TvEpisode,
    TvMiniSeries,
    TvMovie,
    TvSeries,
    TvShort,
    TvSpecial,
    Video,
    VideoGame,
    Audiobook,
    RadioSeries,
    Episode,
}

impl TitleType {
    /// Individual episodes of a series.
    pub fn is_episode(self) -> bool {
        matches!(self, TitleType::TvEpisode | TitleType::Episode)
    }

    /// Secondary kinds that most consumers don't care about.
    pub fn is_misc(self) -> bool {
        matches!(
            self,
            TitleType::VideoGame | TitleType::Audiobook | TitleType::RadioSeries
        )
    }
}

impl FromStr for TitleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "movie" => Ok(TitleType::Movie),
            "short" => Ok(TitleType::Short),
            "tvEpisode" => Ok(TitleType::TvEpisode),
            "tvMiniSeries" => Ok(TitleType::TvMiniSeries),
            "tvMovie" => Ok(TitleType::TvMovie),
            "tvSeries" => Ok(TitleType::TvSeries),
            "tvShort" => Ok(TitleType::TvShort),
            "tvSpecial" => Ok(TitleType::TvSpecial),
            "video" => Ok(TitleType::Video),
            "videoGame" => Ok(TitleType::VideoGame),
            "audiobook" => Ok(TitleType::Audiobook),
            "radioSeries" => Ok(TitleType::RadioSeries),
            "episode" => Ok(TitleType::Episode),
            other => Err(Error::Decode(format!("unknown title type {other:?}"))),
        }
    }
}

impl From<TitleType> for proto::TitleType {
    fn from(t: TitleType) -> Self {
        match t {
            TitleType::Movie => proto::TitleType::Movie,
            TitleType::Short => proto::TitleType::Short,
            TitleType::TvEpisode => proto::TitleType::TvEpisode,
            TitleType::TvMiniSeries => proto::TitleType::TvMiniSeries,
            TitleType::TvMovie => proto::TitleType::TvMovie,
            TitleType::TvSeries => proto::TitleType::TvSeries,
            TitleType::TvShort => proto::TitleType::TvShort,
            TitleType::TvSpecial => proto::TitleType::TvSpecial,
            TitleType::Video => proto::TitleType::Video,
            TitleType::VideoGame => proto::TitleType::VideoGame,
            TitleType::Audiobook => proto::TitleType::Audiobook,
            TitleType::RadioSeries => proto::TitleType::RadioSeries,
            TitleType::Episode => proto::TitleType::Episode,
        }
    }
}

impl From<proto::TitleType> for TitleType {
    fn from(t: proto::TitleType) -> Self {
        match t {
            proto::TitleType::Movie => TitleType::Movie,
            proto::TitleType::Short => TitleType::Short,
            proto::TitleType::TvEpisode => TitleType::TvEpisode,
            proto::TitleType::TvMiniSeries => TitleType::TvMiniSeries,
            proto::TitleType::TvMovie => TitleType::TvMovie,
            proto::TitleType::TvSeries => TitleType::TvSeries,
            proto::TitleType::TvShort => TitleType::TvShort,
            proto::TitleType::TvSpecial => TitleType::TvSpecial,
            proto::TitleType::Video => TitleType::Video,
            proto::TitleType::VideoGame => TitleType::VideoGame,
            proto::TitleType::Audiobook => TitleType::Audiobook,
            proto::TitleType::RadioSeries => TitleType::RadioSeries,
            proto::TitleType::Episode => TitleType::Episode,
        }
    }
}

/// The metadata of one movie or TV show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleRecord {
    /// IMDb ID, including the "tt" prefix
    pub id: String,
    pub title_type: TitleType,
    pub primary_title: String,
    /// Only filled if different from the primary title
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_title: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_adult: bool,
    /// Start year for TV shows, release year for movies. 0 means absent.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub start_year: i32,
    /// Only relevant for TV shows. 0 means absent.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub end_year: i32,
    /// In minutes. 0 means absent.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub runtime_minutes: i32,
    /// Up to three genres. Can be empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl TitleRecord {
    /// Encode to the persisted binary form (protobuf).
    ///
    /// Deterministic: the same record always yields byte-identical output,
    /// which the diff-before-write policy in ingestion relies on.
    pub fn encode(&self) -> Vec<u8> {
        proto::Meta::from(self).encode_to_vec()
    }

    /// Decode a stored blob. Failure here means the store holds bytes this
    /// build can't read, so it maps to an internal error, not a caller error.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let meta = proto::Meta::decode(bytes)
            .map_err(|e| Error::Internal(format!("couldn't decode stored record: {e}")))?;
        TitleRecord::try_from(meta)
    }
}

impl From<&TitleRecord> for proto::Meta {
    fn from(r: &TitleRecord) -> Self {
        proto::Meta {
            id: r.id.clone(),
            title_type: proto::TitleType::from(r.title_type) as i32,
            primary_title: r.primary_title.clone(),
            original_title: r.original_title.clone(),
            is_adult: r.is_adult,
            start_year: r.start_year,
            end_year: r.end_year,
            runtime: r.runtime_minutes,
            genres: r.genres.clone(),
        }
    }
}

impl TryFrom<proto::Meta> for TitleRecord {
    type Error = Error;

    fn try_from(m: proto::Meta) -> Result<Self> {
        let title_type = proto::TitleType::try_from(m.title_type)
            .map_err(|_| Error::Internal(format!("stored record has title type {}", m.title_type)))?;
        Ok(TitleRecord {
            id: m.id,
            title_type: title_type.into(),
            primary_title: m.primary_title,
            original_title: m.original_title,
            is_adult: m.is_adult,
            start_year: m.start_year,
            end_year: m.end_year,
            runtime_minutes: m.runtime,
            genres: m.genres,
        })
    }
}

/// Decode one TSV row (already split into fields) into a record.
///
/// In minimal mode only `id`, `title_type`, `primary_title` and `start_year`
/// are populated; every other optional field stays absent even when the source
/// carries it.
pub fn decode_row(fields: &[&str], minimal: bool) -> Result<TitleRecord> {
    if fields.len() != EXPECTED_COLUMNS {
        return Err(Error::Decode(format!(
            "expected {EXPECTED_COLUMNS} columns, got {}",
            fields.len()
        )));
    }

    let primary_title = fields[2].to_string();
    let original_title = if !minimal && fields[3] != fields[2] {
        fields[3].to_string()
    } else {
        String::new()
    };

    Ok(TitleRecord {
        id: fields[0].to_string(),
        title_type: fields[1].parse()?,
        primary_title,
        original_title,
        is_adult: !minimal && fields[4] == "1",
        start_year: opt_number(fields[5], "startYear")?,
        end_year: if minimal {
            0
        } else {
            opt_number(fields[6], "endYear")?
        },
        runtime_minutes: if minimal {
            0
        } else {
            opt_number(fields[7], "runtimeMinutes")?
        },
        genres: if minimal || fields[8] == ABSENT {
            Vec::new()
        } else {
            fields[8].split(',').map(str::to_string).collect()
        },
    })
}

fn opt_number(field: &str, name: &str) -> Result<i32> {
    if field == ABSENT {
        return Ok(0);
    }
    field
        .parse()
        .map_err(|_| Error::Decode(format!("couldn't parse {name} {field:?} as a number")))
}
