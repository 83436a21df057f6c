use anyhow::Error;
use clap::{Parser, Subcommand, ValueEnum};
use mcws::{init_logging, Key, MediaServer, Zone};
use serde_json::{json, Value};

mod test_runner;

/// Control a JRiver Media Center server.
///
/// Each command prints its result as JSON.
#[derive(Clone, Debug, Parser)]
struct Options {
    #[clap(flatten)]
    mcws: mcws::Options,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Check that the server is reachable and show what it is.
    Alive,
    /// Get an authentication token for use in image URLs.
    Token,
    /// List zones.
    Zones,
    /// Show the state of playback.
    Info {
        #[clap(flatten)]
        zone: ZoneArg,
        /// Additional library fields to include.
        #[clap(short, long = "field", name = "FIELD")]
        fields: Vec<String>,
    },
    /// List the fields in the media library.
    Fields,
    /// Show the display mode of the server's user interface.
    ViewMode,
    Play(ZoneArg),
    Pause(ZoneArg),
    PlayPause(ZoneArg),
    Stop(ZoneArg),
    /// Stop playback in all zones.
    StopAll,
    Next(ZoneArg),
    Previous(ZoneArg),
    /// Clear the playing now list.
    Clear(ZoneArg),
    /// Set the volume, on a scale of 0 to 100.
    Volume {
        level: f64,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    /// Raise the volume by STEP, on a scale of 0 to 1.
    VolumeUp {
        #[clap(default_value = "0.1", name = "STEP", allow_hyphen_values = true)]
        step: f64,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    /// Lower the volume by STEP, on a scale of 0 to 1.
    VolumeDown {
        #[clap(default_value = "0.1", name = "STEP", allow_hyphen_values = true)]
        step: f64,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    Mute(ZoneArg),
    Unmute(ZoneArg),
    /// Seek to a position, in milliseconds.
    Seek {
        position: u64,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    Shuffle {
        #[clap(value_enum)]
        mode: Switch,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    /// Play a file by its key.
    PlayItem {
        key: String,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    PlayPlaylist {
        id: String,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    /// Play a file by its path on the server.
    PlayFile {
        path: String,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    /// List the nodes under a browse node.
    Browse {
        #[clap(default_value = "-1", allow_hyphen_values = true)]
        id: i64,
    },
    /// List the files under a browse node.
    Files {
        #[clap(default_value = "-1", allow_hyphen_values = true)]
        id: i64,
    },
    /// Play the files under a browse node.
    PlayBrowse {
        id: i64,
        /// Add to the end of the playing now list instead of playing next.
        #[clap(long)]
        add: bool,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    /// Send key presses. Named keys like "Page Down" are sent as such, anything else as text.
    Keys {
        #[clap(required = true)]
        keys: Vec<Key>,
        /// Don't bring the server's window to the front first.
        #[clap(long)]
        no_focus: bool,
    },
    /// Send an MCC command.
    Mcc {
        command: u32,
        param: Option<i64>,
        /// Wait for the command to finish.
        #[clap(long)]
        block: bool,
        #[clap(flatten)]
        zone: ZoneArg,
    },
    /// Make a zone the active zone.
    SetZone {
        /// Name or ID of the zone.
        zone: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Switch {
    On,
    Off,
}

/// Selects the zone a command applies to.
#[derive(Clone, Debug, Default, clap::Args)]
struct ZoneArg {
    /// Name or ID of the zone to control. Defaults to the active zone.
    #[clap(short, long, env = "MCWS_ZONE")]
    zone: Option<String>,
}

impl ZoneArg {
    async fn resolve(&self, ms: &MediaServer) -> Result<Option<Zone>, Error> {
        match &self.zone {
            Some(zone) => find_zone(ms, zone).await.map(Some),
            None => Ok(None),
        }
    }
}

async fn find_zone(ms: &MediaServer, name: &str) -> Result<Zone, Error> {
    ms.get_zones()
        .await?
        .into_iter()
        .find(|zone| zone.name == name || zone.id.to_string() == name)
        .ok_or_else(|| Error::msg(format!("no zone named {name}")))
}

fn ok(ok: bool) -> Value {
    json!({ "ok": ok })
}

impl Command {
    async fn run(self, ms: &mut MediaServer) -> Result<Value, Error> {
        Ok(match self {
            Self::Alive => serde_json::to_value(ms.alive().await?)?,
            Self::Token => json!({ "token": ms.get_auth_token().await? }),
            Self::Zones => serde_json::to_value(ms.get_zones().await?)?,
            Self::Info { zone, fields } => {
                let zone = zone.resolve(ms).await?;
                let info = ms.get_playback_info(zone.as_ref(), fields.as_slice()).await?;
                tracing::info!("{info}");
                let mut value = info.as_dict();
                if !fields.is_empty() {
                    value["extra_fields"] = serde_json::to_value(&info.extra_fields)?;
                }
                value
            }
            Self::Fields => serde_json::to_value(ms.get_library_fields().await?)?,
            Self::ViewMode => json!({ "view_mode": ms.get_view_mode().await? }),
            Self::Play(zone) => ok(ms.play(zone.resolve(ms).await?.as_ref()).await?),
            Self::Pause(zone) => ok(ms.pause(zone.resolve(ms).await?.as_ref()).await?),
            Self::PlayPause(zone) => ok(ms.play_pause(zone.resolve(ms).await?.as_ref()).await?),
            Self::Stop(zone) => ok(ms.stop(zone.resolve(ms).await?.as_ref()).await?),
            Self::StopAll => ok(ms.stop_all().await?),
            Self::Next(zone) => ok(ms.next_track(zone.resolve(ms).await?.as_ref()).await?),
            Self::Previous(zone) => {
                ok(ms.previous_track(zone.resolve(ms).await?.as_ref()).await?)
            }
            Self::Clear(zone) => ok(ms.clear_playlist(zone.resolve(ms).await?.as_ref()).await?),
            Self::Volume { level, zone } => {
                let zone = zone.resolve(ms).await?;
                json!({ "level": ms.set_volume_level(level, zone.as_ref()).await? })
            }
            Self::VolumeUp { step, zone } => {
                let zone = zone.resolve(ms).await?;
                json!({ "level": ms.volume_up(step, zone.as_ref()).await? })
            }
            Self::VolumeDown { step, zone } => {
                let zone = zone.resolve(ms).await?;
                json!({ "level": ms.volume_down(step, zone.as_ref()).await? })
            }
            Self::Mute(zone) => {
                let zone = zone.resolve(ms).await?;
                json!({ "muted": ms.mute(true, zone.as_ref()).await? })
            }
            Self::Unmute(zone) => {
                let zone = zone.resolve(ms).await?;
                json!({ "muted": ms.mute(false, zone.as_ref()).await? })
            }
            Self::Seek { position, zone } => {
                let zone = zone.resolve(ms).await?;
                ok(ms.media_seek(position, zone.as_ref()).await?)
            }
            Self::Shuffle { mode, zone } => {
                let zone = zone.resolve(ms).await?;
                ok(ms
                    .set_shuffle(matches!(mode, Switch::On), zone.as_ref())
                    .await?)
            }
            Self::PlayItem { key, zone } => {
                let zone = zone.resolve(ms).await?;
                ok(ms.play_item(&key, zone.as_ref()).await?)
            }
            Self::PlayPlaylist { id, zone } => {
                let zone = zone.resolve(ms).await?;
                ok(ms.play_playlist(&id, zone.as_ref()).await?)
            }
            Self::PlayFile { path, zone } => {
                let zone = zone.resolve(ms).await?;
                ok(ms.play_file(&path, zone.as_ref()).await?)
            }
            Self::Browse { id } => serde_json::to_value(ms.browse_children(id).await?)?,
            Self::Files { id } => Value::Array(ms.browse_files(id).await?),
            Self::PlayBrowse { id, add, zone } => {
                let zone = zone.resolve(ms).await?;
                serde_json::to_value(ms.play_browse_files(id, zone.as_ref(), !add).await?)?
            }
            Self::Keys { keys, no_focus } => ok(ms.send_key_presses(&keys, !no_focus).await?),
            Self::Mcc {
                command,
                param,
                block,
                zone,
            } => {
                let zone = zone.resolve(ms).await?;
                ok(ms.send_mcc(command, param, zone.as_ref(), block).await?)
            }
            Self::SetZone { zone } => {
                let zone = find_zone(ms, &zone).await?;
                ok(ms.set_active_zone(&zone).await?)
            }
        })
    }
}

impl Options {
    async fn run(self) -> Result<Value, Error> {
        let mut ms = MediaServer::new(self.mcws.connect()?);
        let res = self.command.run(&mut ms).await;
        ms.close();
        res
    }
}

#[async_std::main]
async fn main() -> Result<(), Error> {
    init_logging();
    let opt = Options::parse();
    let res = opt.run().await?;
    println!("{}", serde_json::to_string_pretty(&res)?);
    Ok(())
}
