//! Entities exposed by a media server.

use crate::connection::{Items, Params};
use crate::error::Error;
use chrono::{DateTime, Utc};
use derive_more::{Display as DeriveDisplay, From};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// Identifying information about a media server, as reported by `Alive`.
#[derive(Clone, Debug, Serialize)]
pub struct MediaServerInfo {
    pub version: String,
    pub name: String,
    pub platform: String,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

impl MediaServerInfo {
    pub fn new(items: &Items) -> Self {
        Self {
            version: text(items, "ProgramVersion"),
            name: text(items, "FriendlyName"),
            platform: text(items, "Platform"),
            updated_at: Utc::now(),
        }
    }
}

impl From<&Items> for MediaServerInfo {
    fn from(items: &Items) -> Self {
        Self::new(items)
    }
}

/// Two servers are the same if they have the same name and version, regardless of platform or
/// when they were last seen.
impl PartialEq for MediaServerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for MediaServerInfo {}

impl Display for MediaServerInfo {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.version)
    }
}

/// The state of playback in a zone.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, EnumIter, EnumString, Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    #[default]
    Unknown = -1,
    Stopped = 0,
    Paused = 1,
    Playing = 2,
    Waiting = 3,
}

impl From<i32> for PlaybackState {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Stopped,
            1 => Self::Paused,
            2 => Self::Playing,
            3 => Self::Waiting,
            -1 => Self::Unknown,
            code => {
                tracing::warn!("unknown playback state {code}");
                Self::Unknown
            }
        }
    }
}

/// The type of a media file.
///
/// Displays (and parses) as the value used by MCWS, e.g. `Video`. Serializes as the variant name,
/// e.g. `VIDEO`.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, EnumIter, EnumString, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    #[default]
    #[strum(serialize = "")]
    NotAvailable,
    Video,
    Audio,
    Data,
    Image,
    #[strum(serialize = "TV")]
    Tv,
    Playlist,
}

/// The sub type of a media file.
///
/// Displays (and parses) as the value used by MCWS, e.g. `TV Show`. Serializes as the variant
/// name, e.g. `TV_SHOW`.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, EnumIter, EnumString, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaSubType {
    #[default]
    #[strum(serialize = "")]
    NotAvailable,
    Adult,
    Animation,
    Audiobook,
    Book,
    Concert,
    Educational,
    Entertainment,
    Extras,
    #[strum(serialize = "Home Video")]
    HomeVideo,
    Karaoke,
    Movie,
    Music,
    #[strum(serialize = "Music Video")]
    MusicVideo,
    Other,
    Photo,
    Podcast,
    Radio,
    Ringtone,
    Short,
    Single,
    Sports,
    Stock,
    System,
    #[strum(serialize = "Test Clip")]
    TestClip,
    Trailer,
    #[strum(serialize = "TV Show")]
    TvShow,
    Workout,
}

/// The current state of playback in a zone.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackInfo {
    pub zone_id: i64,
    pub zone_name: String,
    pub state: PlaybackState,
    pub file_key: i64,
    pub next_file_key: i64,
    pub position_ms: i64,
    pub duration_ms: i64,
    pub volume: f64,
    pub muted: bool,
    pub image_url: String,
    pub name: String,
    pub live_input: bool,
    // Music only.
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    // TV only.
    pub series: String,
    pub season: String,
    pub episode: String,
    pub media_type: MediaType,
    pub media_sub_type: MediaSubType,
    /// The requested extra fields which the server supplied.
    pub extra_fields: Items,
}

impl PlaybackInfo {
    /// Interpret a `Playback/Info` response.
    ///
    /// Missing or unparseable fields take a default value rather than failing, since the server
    /// omits most fields when nothing is playing.
    pub fn new(items: &Items, extra_fields: &[impl AsRef<str>]) -> Self {
        let name = text(items, "Name");
        Self {
            zone_id: number(items, "ZoneID", -1),
            zone_name: text(items, "ZoneName"),
            state: number::<i32>(items, "State", -1).into(),
            file_key: number(items, "FileKey", -1),
            next_file_key: number(items, "NextFileKey", -1),
            position_ms: number(items, "PositionMS", 0),
            duration_ms: number(items, "DurationMS", 0),
            volume: number(items, "Volume", 0.0),
            muted: items.get("VolumeDisplay").map(String::as_str) == Some("Muted"),
            image_url: text(items, "ImageURL"),
            live_input: name == "Ipc",
            name,
            artist: text(items, "Artist"),
            album: text(items, "Album"),
            album_artist: text(items, "Album Artist (auto)"),
            series: text(items, "Series"),
            season: text(items, "Season"),
            episode: text(items, "Episode"),
            media_type: value(items, "Media Type"),
            media_sub_type: value(items, "Media Sub Type"),
            extra_fields: extra_fields
                .iter()
                .filter_map(|field| {
                    let field = field.as_ref();
                    items
                        .get(field)
                        .map(|value| (field.to_string(), value.clone()))
                })
                .collect(),
        }
    }

    /// A summary of this playback state as a JSON object.
    pub fn as_dict(&self) -> Value {
        json!({
            "name": self.name,
            "zone_id": self.zone_id,
            "zone_name": self.zone_name,
            "playback_state": self.state,
            "position_ms": self.position_ms,
            "duration_ms": self.duration_ms,
            "volume": self.volume,
            "muted": self.muted,
            "live_input": self.live_input,
            "artist": self.artist,
            "album": self.album,
            "album_artist": self.album_artist,
            "series": self.series,
            "season": self.season,
            "episode": self.episode,
            "media_type": self.media_type,
            "media_sub_type": self.media_sub_type,
        })
    }
}

impl Display for PlaybackInfo {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[{} : {}]", self.zone_name, self.state)?;
        if self.file_key != -1 {
            write!(
                f,
                " {} ({} / {})",
                self.file_key, self.media_type, self.media_sub_type
            )?;
        }
        Ok(())
    }
}

/// A zone, i.e. an output which can play media independently of other zones.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Zone {
    pub index: usize,
    pub id: i64,
    pub name: String,
    pub guid: String,
    pub is_dlna: bool,
    pub active: bool,
}

impl Zone {
    /// Extract the zone at `index` from a `Playback/Zones` response.
    pub fn new(items: &Items, index: usize, active_zone_id: i64) -> Result<Self, Error> {
        let id = required::<i64>(items, &format!("ZoneID{index}"))?;
        Ok(Self {
            index,
            id,
            name: text(items, &format!("ZoneName{index}")),
            guid: text(items, &format!("ZoneGUID{index}")),
            is_dlna: items.get(&format!("ZoneDLNA{index}")).map(String::as_str) == Some("1"),
            active: id == active_zone_id,
        })
    }

    /// Query parameters targeting this zone.
    pub fn as_query_params(&self) -> Params {
        vec![("Zone", self.id.to_string()), ("ZoneType", "ID".into())]
    }
}

impl Display for Zone {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A field in the media library.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct LibraryField {
    pub name: String,
    pub data_type: String,
    pub edit_type: String,
    pub display_name: String,
}

/// A named key which can be sent to the server with [`send_key_presses`].
///
/// [`send_key_presses`]: crate::MediaServer::send_key_presses
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, EnumIter, EnumString, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyCommand {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Home,
    End,
    Backspace,
    #[strum(serialize = "Page Up")]
    PageUp,
    #[strum(serialize = "Page Down")]
    PageDown,
    Ctrl,
    Shift,
    Alt,
    Insert,
    Menu,
    Delete,
    #[strum(serialize = "Esc")]
    Escape,
    Apps,
    Tab,
    Space,
    Win,
}

/// A key press: either a named key or literal text.
#[derive(Clone, Debug, DeriveDisplay, PartialEq, Eq, Hash, From)]
pub enum Key {
    Command(KeyCommand),
    Text(String),
}

impl From<&str> for Key {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl FromStr for Key {
    type Err = std::convert::Infallible;

    /// Parse a named key if `s` names one, otherwise treat `s` as literal text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<KeyCommand>()
            .map(Self::Command)
            .unwrap_or_else(|_| Self::Text(s.into())))
    }
}

/// The display mode of the server's user interface.
///
/// Variants are ordered by their MCWS code.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewMode {
    NoUi = -2000,
    Unknown = -1000,
    Standard = 0,
    Mini = 1,
    Display = 2,
    Theater = 3,
    Cover = 4,
}

impl From<i32> for ViewMode {
    fn from(code: i32) -> Self {
        match code {
            -2000 => Self::NoUi,
            0 => Self::Standard,
            1 => Self::Mini,
            2 => Self::Display,
            3 => Self::Theater,
            4 => Self::Cover,
            -1000 => Self::Unknown,
            code => {
                tracing::warn!("unknown view mode {code}");
                Self::Unknown
            }
        }
    }
}

/// The text of an item, or empty if it is missing.
pub(crate) fn text(items: &Items, name: &str) -> String {
    items.get(name).cloned().unwrap_or_default()
}

/// Parse a numeric item, falling back to `default` if it is missing or malformed.
pub(crate) fn number<T: FromStr>(items: &Items, name: &str, default: T) -> T {
    match items.get(name) {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("field {name} has non-numeric value {value:?}");
            default
        }),
        None => default,
    }
}

/// Parse an item which must be present and well-formed.
pub(crate) fn required<T: FromStr>(items: &Items, name: &str) -> Result<T, Error> {
    items
        .get(name)
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| Error::MissingField { field: name.into() })
}

/// Parse an enumerated item, falling back to the default variant if it is missing or unknown.
fn value<T: FromStr + Default>(items: &Items, name: &str) -> T {
    match items.get(name) {
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::debug!("field {name} has unrecognized value {value:?}");
            T::default()
        }),
        None => T::default(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    fn items<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Items {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn server_info(version: &str, name: &str, platform: &str) -> MediaServerInfo {
        MediaServerInfo::new(&items([
            ("ProgramVersion", version),
            ("FriendlyName", name),
            ("Platform", platform),
        ]))
    }

    #[test]
    fn test_media_server_info_eq() {
        let ms1 = server_info("31.0.87", "localhost", "Windows");
        let ms2 = server_info("31.0.87", "localhost", "Windows");
        let ms3 = server_info("31.0.88", "localhost", "Windows");
        let ms4 = server_info("31.0.87", "otherhost", "Windows");
        let ms5 = server_info("31.0.87", "localhost", "Linux");

        assert_eq!(ms1, ms2);
        assert_ne!(ms1, ms3);
        assert_ne!(ms1, ms4);
        assert_eq!(ms1, ms5);
        assert_eq!(ms1.to_string(), "localhost [31.0.87]");
    }

    #[test]
    fn test_media_type() {
        assert_eq!("Video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert_eq!("TV".parse::<MediaType>().unwrap(), MediaType::Tv);
        assert_eq!("".parse::<MediaType>().unwrap(), MediaType::NotAvailable);
        assert!("Hologram".parse::<MediaType>().is_err());
        assert_eq!(MediaType::Video.to_string(), "Video");
        assert_eq!(json!(MediaType::NotAvailable), json!("NOT_AVAILABLE"));

        assert_eq!(
            "TV Show".parse::<MediaSubType>().unwrap(),
            MediaSubType::TvShow
        );
        assert_eq!(MediaSubType::HomeVideo.to_string(), "Home Video");
        assert_eq!(json!(MediaSubType::TvShow), json!("TV_SHOW"));
    }

    #[test]
    fn test_playback_state() {
        assert_eq!(PlaybackState::from(2), PlaybackState::Playing);
        assert_eq!(PlaybackState::from(-1), PlaybackState::Unknown);
        assert_eq!(PlaybackState::from(42), PlaybackState::Unknown);
        assert_eq!(PlaybackState::Stopped.to_string(), "STOPPED");
        for state in PlaybackState::iter() {
            assert_eq!(PlaybackState::from(state as i32), state);
        }
    }

    #[test]
    fn test_key_command() {
        assert!(KeyCommand::iter().any(|key| key == KeyCommand::PageDown));
        assert_eq!(KeyCommand::PageDown.to_string(), "Page Down");
        assert_eq!(KeyCommand::Escape.to_string(), "Esc");
        assert_eq!(json!(KeyCommand::PageDown), json!("PAGE_DOWN"));

        assert_eq!(Key::from(KeyCommand::Enter).to_string(), "Enter");
        assert_eq!(Key::from("a").to_string(), "a");
        assert_eq!("Page Up".parse::<Key>().unwrap(), Key::Command(KeyCommand::PageUp));
        assert_eq!("x".parse::<Key>().unwrap(), Key::Text("x".into()));
    }

    #[test]
    fn test_view_mode() {
        assert!(ViewMode::Standard > ViewMode::NoUi);
        assert!(ViewMode::NoUi < ViewMode::Standard);
        assert!(ViewMode::Cover > ViewMode::Theater);
        for mode in ViewMode::iter() {
            assert_eq!(ViewMode::from(mode as i32), mode);
        }
        assert_eq!(ViewMode::from(7), ViewMode::Unknown);
        assert_eq!(ViewMode::NoUi.to_string(), "NO_UI");
    }

    #[test]
    fn test_playback_info_display() {
        let mut info = PlaybackInfo::new(
            &items([
                ("ZoneName", "Player"),
                ("State", "2"),
                ("FileKey", "1234"),
                ("Media Type", "Video"),
                ("Media Sub Type", "Movie"),
                ("VolumeDisplay", "Muted"),
                ("Name", "Ipc"),
                ("Director", "Someone"),
                ("Composer", "Someone Else"),
            ]),
            &["Director"],
        );
        assert_eq!(info.to_string(), "[Player : PLAYING] 1234 (Video / Movie)");
        assert!(info.muted);
        assert!(info.live_input);
        assert_eq!(info.extra_fields, items([("Director", "Someone")]));

        info.file_key = -1;
        assert_eq!(info.to_string(), "[Player : PLAYING]");
    }

    #[test]
    fn test_zone() {
        let items = items([
            ("ZoneID0", "10081"),
            ("ZoneName0", "Player"),
            ("ZoneGUID0", "{xxxx-xxxx}"),
            ("ZoneDLNA0", "0"),
        ]);
        let zone = Zone::new(&items, 0, 10081).unwrap();
        assert_eq!(zone.to_string(), "Player");
        assert!(zone.active);
        assert!(!zone.is_dlna);
        assert_eq!(
            zone.as_query_params(),
            [("Zone", "10081".to_string()), ("ZoneType", "ID".to_string())]
        );

        assert_eq!(
            Zone::new(&items, 1, 10081),
            Err(Error::MissingField {
                field: "ZoneID1".into()
            })
        );
    }
}
