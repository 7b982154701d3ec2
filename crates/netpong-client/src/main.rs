use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use netpong_client::{LobbyOptions, RunOptions, WsChannel, lobby, run_match};
use netpong_core::config::{MapStyle, Side};
use netpong_core::net::protocol::DEFAULT_TICK_RATE_HZ;
use netpong_core::presentation::SceneRegistry;
use netpong_core::session::Match;
use netpong_core::tuning::PongTuning;

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MapArg {
    Classic,
    Wide,
    Square,
}

impl From<MapArg> for MapStyle {
    fn from(arg: MapArg) -> Self {
        match arg {
            MapArg::Classic => MapStyle::Classic,
            MapArg::Wide => MapStyle::Wide,
            MapArg::Square => MapStyle::Square,
        }
    }
}

fn parse_player_count(s: &str) -> Result<u8, String> {
    match s.parse::<u8>() {
        Ok(n @ (2 | 4)) => Ok(n),
        _ => Err(format!("must be 2 or 4, got {s}")),
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Lobby WebSocket URL
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Room code to join. Omit to create a room and lead it
    #[arg(long)]
    room: Option<String>,

    /// Display name shown to the other players
    #[arg(long, default_value = "Player")]
    name: String,

    /// Players the leader waits for before starting
    #[arg(long, default_value_t = 2, value_parser = parse_player_count)]
    players: u8,

    #[arg(long, value_enum, default_value_t = MapArg::Classic)]
    map: MapArg,

    /// Spawn every power-up kind
    #[arg(long)]
    power_ups: bool,

    /// Frames per second
    #[arg(long, default_value_t = DEFAULT_TICK_RATE_HZ, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Turn off the autopilot and leave the paddle idle
    #[arg(long)]
    manual: bool,
}

impl Args {
    fn lobby(&self) -> LobbyOptions {
        LobbyOptions {
            room: self.room.clone(),
            name: self.name.clone(),
            player_count: self.players,
            map_style: self.map.into(),
            power_ups: self.power_ups,
        }
    }

    fn run(&self) -> RunOptions {
        RunOptions {
            fps: self.fps,
            autopilot: !self.manual,
            max_frames: None,
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let lobby_options = args.lobby();

    let mut channel = match WsChannel::connect(&args.url).await {
        Ok(ch) => ch,
        Err(e) => {
            tracing::error!(url = %args.url, error = %e, "Failed to connect");
            std::process::exit(1);
        },
    };

    let seat = match lobby::join(&mut channel, &lobby_options).await {
        Ok(joined) => {
            // Print the code on its own so other players can copy it.
            println!("room {}", joined.room_code);
            lobby::wait_for_start(&mut channel, &lobby_options, &joined).await
        },
        Err(e) => Err(e),
    };
    let seat = match seat {
        Ok(seat) => seat,
        Err(e) => {
            tracing::error!(error = %e, "Lobby failed");
            std::process::exit(1);
        },
    };

    let config = seat.match_config();
    let tuning = PongTuning::load();
    let mut scene = SceneRegistry::with_standard_assets(config.active_sides().iter().copied());
    let built = Match::networked(
        config,
        seat.role(),
        seat.side,
        tuning.clone(),
        Box::new(channel),
    );
    let mut m = match built {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create match");
            std::process::exit(1);
        },
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    match run_match(&mut m, &mut scene, &tuning, args.run(), shutdown).await {
        Ok(summary) => {
            tracing::info!(
                winner = summary.winner.map(Side::as_str),
                frames = summary.frames,
                scores = ?summary.scores,
                "Match ended"
            );
            if summary.connection_lost {
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Match failed");
            std::process::exit(1);
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("netpong-client").chain(args.iter().copied()))
    }

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_create_a_two_player_room_on_autopilot() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.url, DEFAULT_URL);
        let lobby = args.lobby();
        assert_eq!(lobby.room, None);
        assert_eq!(lobby.player_count, 2);
        assert_eq!(lobby.map_style, MapStyle::Classic);
        let run = args.run();
        assert!(run.autopilot);
        assert_eq!(run.fps, DEFAULT_TICK_RATE_HZ);
    }

    #[test]
    fn every_flag_is_applied() {
        let args = parse(&[
            "--url=ws://example:9000/ws",
            "--room",
            "ABCD-1234",
            "--name=Bob",
            "--players=4",
            "--map=square",
            "--power-ups",
            "--fps=30",
            "--manual",
        ])
        .unwrap();
        assert_eq!(args.url, "ws://example:9000/ws");
        let lobby = args.lobby();
        assert_eq!(lobby.room.as_deref(), Some("ABCD-1234"));
        assert_eq!(lobby.name, "Bob");
        assert_eq!(lobby.player_count, 4);
        assert_eq!(lobby.map_style, MapStyle::Square);
        assert!(lobby.power_ups);
        assert_eq!(args.run().fps, 30);
        assert!(!args.run().autopilot);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse(&["--players=3"]).is_err());
        assert!(parse(&["--fps=0"]).is_err());
        assert!(parse(&["--map=round"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
