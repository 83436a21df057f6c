//! A high-level interface to a media server.

use crate::connection::{Connection, Items, Params};
use crate::domain::{
    number, required, Key, LibraryField, MediaServerInfo, PlaybackInfo, ViewMode, Zone,
};
use crate::error::Error;
use serde_json::Value;
use std::collections::BTreeSet;

/// Fields always requested from `Playback/Info`, on top of any the caller asks for.
const PLAYBACK_INFO_FIELDS: [&str; 6] = [
    "Media Type",
    "Media Sub Type",
    "Series",
    "Season",
    "Episode",
    "Album Artist (auto)",
];

/// The `Control/MCC` command which sets shuffle mode.
const MCC_SHUFFLE: u32 = 10005;

/// A media server.
///
/// Most operations map directly onto a single MCWS endpoint. Operations which send a command
/// return whether the server reported the command as successful.
pub struct MediaServer {
    conn: Connection,
    media_server_info: Option<MediaServerInfo>,
    token: Option<String>,
}

impl MediaServer {
    /// Control the media server behind `conn`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            media_server_info: None,
            token: None,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The host name or address of the server.
    pub fn host(&self) -> &str {
        self.conn.host()
    }

    /// The port the server listens on.
    pub fn port(&self) -> u16 {
        self.conn.port()
    }

    /// Information about the server from the most recent successful [`alive`](Self::alive).
    pub fn media_server_info(&self) -> Option<&MediaServerInfo> {
        self.media_server_info.as_ref()
    }

    /// Close the underlying connection.
    pub fn close(&mut self) {
        self.conn.close();
    }

    /// The URL of an image path returned by the server, such as `PlaybackInfo::image_url`.
    pub fn image_url(&self, path: &str) -> String {
        format!("{}/{path}", self.conn.host_url())
    }

    /// Check that the server accepts our connection, and find out what it is.
    pub async fn alive(&mut self) -> Result<MediaServerInfo, Error> {
        let (_, items) = self.conn.get_as_dict("Alive", vec![]).await?;
        let info = MediaServerInfo::new(&items);
        tracing::info!("connected to {info} on {}", info.platform);
        self.media_server_info = Some(info.clone());
        Ok(info)
    }

    /// An authentication token, which can be embedded in URLs that are fetched without our
    /// credentials.
    ///
    /// The token is requested once and then cached.
    pub async fn get_auth_token(&mut self) -> Result<String, Error> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        let (_, items) = self.conn.get_as_dict("Authenticate", vec![]).await?;
        let token = items
            .get("Token")
            .cloned()
            .ok_or_else(|| Error::MissingField {
                field: "Token".into(),
            })?;
        self.token = Some(token.clone());
        Ok(token)
    }

    /// The URL of the thumbnail for a file.
    pub async fn get_file_image_url(&mut self, file_key: i64) -> Result<String, Error> {
        let token = self.get_auth_token().await?;
        Ok(format!(
            "{}?File={file_key}&Type=Thumbnail&ThumbnailSize=Large&Format=png&Token={token}",
            self.conn.url("File/GetImage")
        ))
    }

    /// The URL of the image thumbnail for a browse node.
    pub async fn get_browse_thumbnail_url(&mut self, base_id: i64) -> Result<String, Error> {
        let token = self.get_auth_token().await?;
        Ok(format!(
            "{}?UseStackedImages=1&Format=jpg&ID={base_id}&Token={token}",
            self.conn.url("Browse/Image")
        ))
    }

    /// All zones known to the server.
    pub async fn get_zones(&self) -> Result<Vec<Zone>, Error> {
        let (_, items) = self.conn.get_as_dict("Playback/Zones", vec![]).await?;
        let num_zones = required::<usize>(&items, "NumberZones")?;
        let active_zone_id = required::<i64>(&items, "CurrentZoneID")?;
        (0..num_zones)
            .map(|i| Zone::new(&items, i, active_zone_id))
            .collect()
    }

    /// The state of playback in `zone`, or in the active zone if no zone is given.
    ///
    /// `extra_fields` names additional library fields of the playing file to fetch. They are
    /// returned in [`PlaybackInfo::extra_fields`].
    pub async fn get_playback_info(
        &self,
        zone: Option<&Zone>,
        extra_fields: &[impl AsRef<str>],
    ) -> Result<PlaybackInfo, Error> {
        let fields = extra_fields
            .iter()
            .map(|field| field.as_ref())
            .chain(PLAYBACK_INFO_FIELDS)
            .collect::<BTreeSet<_>>();
        let mut params = zone_params(zone);
        params.push(("Fields", fields.into_iter().collect::<Vec<_>>().join(";")));
        let (_, items) = self.conn.get_as_dict("Playback/Info", params).await?;
        Ok(PlaybackInfo::new(&items, extra_fields))
    }

    /// The fields defined in the media library.
    pub async fn get_library_fields(&self) -> Result<Vec<LibraryField>, Error> {
        let (_, root) = self.conn.get_as_element("Library/Fields", vec![]).await?;
        let Some(fields) = root.child("Fields") else {
            return Ok(vec![]);
        };
        Ok(fields
            .children
            .iter()
            .filter_map(|field| {
                let Some(name) = field.attribute("Name") else {
                    tracing::warn!("library field without a name, skipping");
                    return None;
                };
                let attr = |key| field.attribute(key).unwrap_or_default().to_string();
                Some(LibraryField {
                    name: name.to_string(),
                    data_type: attr("DataType"),
                    edit_type: attr("EditType"),
                    display_name: attr("DisplayName"),
                })
            })
            .collect())
    }

    /// The current display mode of the server's user interface.
    pub async fn get_view_mode(&self) -> Result<ViewMode, Error> {
        let (_, items) = self.conn.get_as_dict("UserInterface/Info", vec![]).await?;
        Ok(number::<i32>(&items, "Mode", ViewMode::Unknown as i32).into())
    }

    /// Raise the volume by `step`, on a scale of 0 to 1. Returns the new volume level.
    pub async fn volume_up(&self, step: f64, zone: Option<&Zone>) -> Result<f64, Error> {
        let mut params = vec![("Level", step.to_string()), ("Relative", "1".into())];
        params.extend(zone_params(zone));
        self.set_volume(params).await
    }

    /// Lower the volume by `step`, on a scale of 0 to 1. Returns the new volume level.
    pub async fn volume_down(&self, step: f64, zone: Option<&Zone>) -> Result<f64, Error> {
        let level = if step > 0.0 {
            format!("-{step}")
        } else {
            step.to_string()
        };
        let mut params = vec![("Level", level), ("Relative", "1".into())];
        params.extend(zone_params(zone));
        self.set_volume(params).await
    }

    /// Set the volume to `volume`, on a scale of 0 to 100. Returns the new volume level, on a
    /// scale of 0 to 1.
    pub async fn set_volume_level(&self, volume: f64, zone: Option<&Zone>) -> Result<f64, Error> {
        if !(0.0..=100.0).contains(&volume) {
            return Err(Error::InvalidArgument {
                message: format!("{volume} not in range 0-100"),
            });
        }
        let mut params = vec![("Level", (volume / 100.0).to_string())];
        params.extend(zone_params(zone));
        self.set_volume(params).await
    }

    async fn set_volume(&self, params: Params) -> Result<f64, Error> {
        let (_, items) = self.conn.get_as_dict("Playback/Volume", params).await?;
        required(&items, "Level")
    }

    /// Mute or unmute. Returns whether the zone is now muted.
    pub async fn mute(&self, mute: bool, zone: Option<&Zone>) -> Result<bool, Error> {
        let mut params = vec![("Set", flag(mute))];
        params.extend(zone_params(zone));
        let (_, items) = self.conn.get_as_dict("Playback/Mute", params).await?;
        Ok(items.get("State").map(String::as_str) == Some("1"))
    }

    /// Toggle between playing and paused.
    pub async fn play_pause(&self, zone: Option<&Zone>) -> Result<bool, Error> {
        self.command("Playback/PlayPause", zone_params(zone)).await
    }

    /// Start or resume playback.
    pub async fn play(&self, zone: Option<&Zone>) -> Result<bool, Error> {
        self.command("Playback/Play", zone_params(zone)).await
    }

    /// Pause playback.
    pub async fn pause(&self, zone: Option<&Zone>) -> Result<bool, Error> {
        self.command("Playback/Pause", zone_params(zone)).await
    }

    /// Stop playback.
    pub async fn stop(&self, zone: Option<&Zone>) -> Result<bool, Error> {
        self.command("Playback/Stop", zone_params(zone)).await
    }

    /// Stop playback in every zone.
    ///
    /// The server's reported status for this command is not meaningful, so this succeeds
    /// whenever the request itself does.
    pub async fn stop_all(&self) -> Result<bool, Error> {
        let ok = self.command("Playback/StopAll", vec![]).await?;
        if !ok {
            tracing::debug!("ignoring failure status from StopAll");
        }
        Ok(true)
    }

    /// Skip to the next track in the playing now list.
    pub async fn next_track(&self, zone: Option<&Zone>) -> Result<bool, Error> {
        self.command("Playback/Next", zone_params(zone)).await
    }

    /// Go back to the previous track in the playing now list.
    pub async fn previous_track(&self, zone: Option<&Zone>) -> Result<bool, Error> {
        self.command("Playback/Previous", zone_params(zone)).await
    }

    /// Seek to `position`, in milliseconds.
    pub async fn media_seek(&self, position: u64, zone: Option<&Zone>) -> Result<bool, Error> {
        let mut params = vec![("Position", position.to_string())];
        params.extend(zone_params(zone));
        self.command("Playback/Position", params).await
    }

    /// Play the file with the given key.
    pub async fn play_item(&self, item: &str, zone: Option<&Zone>) -> Result<bool, Error> {
        let mut params = vec![("Key", item.to_string())];
        params.extend(zone_params(zone));
        self.command("Playback/PlayByKey", params).await
    }

    /// Play the playlist with the given ID.
    pub async fn play_playlist(
        &self,
        playlist_id: &str,
        zone: Option<&Zone>,
    ) -> Result<bool, Error> {
        let mut params = vec![("Playlist", playlist_id.to_string())];
        params.extend(zone_params(zone));
        self.command("Playback/PlayPlaylist", params).await
    }

    /// Play a file by its path on the server.
    pub async fn play_file(&self, file: &str, zone: Option<&Zone>) -> Result<bool, Error> {
        let mut params = vec![("Filenames", file.to_string())];
        params.extend(zone_params(zone));
        self.command("Playback/PlayByFilename", params).await
    }

    /// Turn shuffle mode on or off.
    pub async fn set_shuffle(&self, shuffle: bool, zone: Option<&Zone>) -> Result<bool, Error> {
        let mut params = vec![
            ("Command", MCC_SHUFFLE.to_string()),
            ("Parameter", if shuffle { "4" } else { "3" }.into()),
        ];
        params.extend(zone_params(zone));
        self.command("Control/MCC", params).await
    }

    /// Clear the playing now list.
    pub async fn clear_playlist(&self, zone: Option<&Zone>) -> Result<bool, Error> {
        self.command("Playback/ClearPlaylist", zone_params(zone)).await
    }

    /// The nodes under a browse node, as a map from node name to node ID.
    ///
    /// The root of the browse tree is `-1`.
    pub async fn browse_children(&self, base_id: i64) -> Result<Items, Error> {
        let (_, items) = self
            .conn
            .get_as_dict(
                "Browse/Children",
                vec![
                    ("Version", "2".into()),
                    ("ErrorOnMissing", "0".into()),
                    ("ID", base_id.to_string()),
                ],
            )
            .await?;
        Ok(items)
    }

    /// The files under a browse node.
    pub async fn browse_files(&self, base_id: i64) -> Result<Vec<Value>, Error> {
        let (_, files) = self
            .conn
            .get_as_json_list(
                "Browse/Files",
                vec![("ID", base_id.to_string()), ("Action", "JSON".into())],
            )
            .await?;
        Ok(files)
    }

    /// Play the files under a browse node, either next or at the end of the playing now list.
    pub async fn play_browse_files(
        &self,
        base_id: i64,
        zone: Option<&Zone>,
        play_next: bool,
    ) -> Result<Items, Error> {
        let mut params = vec![
            ("ID", base_id.to_string()),
            ("Action", "Play".into()),
            (
                "PlayMode",
                if play_next { "NextToPlay" } else { "Add" }.into(),
            ),
        ];
        params.extend(zone_params(zone));
        let (_, items) = self.conn.get_as_dict("Browse/Files", params).await?;
        Ok(items)
    }

    /// Send a sequence of key presses, optionally focusing the server's window first.
    pub async fn send_key_presses(&self, keys: &[Key], focus: bool) -> Result<bool, Error> {
        let keys = keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");
        self.command("Command/Key", vec![("Key", keys), ("Focus", flag(focus))])
            .await
    }

    /// Send an MCC command.
    ///
    /// If `block` is set, the server waits for the command to finish before responding.
    pub async fn send_mcc(
        &self,
        command: u32,
        param: Option<i64>,
        zone: Option<&Zone>,
        block: bool,
    ) -> Result<bool, Error> {
        let mut params = vec![
            ("Command", command.to_string()),
            ("Parameter", param.unwrap_or(0).to_string()),
            ("Block", flag(block)),
        ];
        params.extend(zone_params(zone));
        self.command("Command/MCC", params).await
    }

    /// Make `zone` the active zone.
    pub async fn set_active_zone(&self, zone: &Zone) -> Result<bool, Error> {
        self.command("Playback/SetZone", zone.as_query_params())
            .await
    }

    async fn command(&self, path: &str, params: Params) -> Result<bool, Error> {
        let (ok, _) = self.conn.get_as_dict(path, params).await?;
        Ok(ok)
    }
}

fn zone_params(zone: Option<&Zone>) -> Params {
    zone.map(Zone::as_query_params).unwrap_or_default()
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}
