//! Scripted client that plays one run of the buzz wire against a live server.
//!
//! It starts a session, fetches the track, touches the start zone and then
//! walks the ring along the wire at a fixed vertical offset until it reaches
//! the end zone, logging every state the server reports.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use shared::{
    Packet, Point3, PositionInput, Snapshot, TrackDescriptor, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about = "Plays a scripted buzz wire run", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Collision threshold to request (server default if omitted)
    #[arg(short = 't', long)]
    threshold: Option<f64>,

    /// Vertical offset of the ring from the wire, in metres
    #[arg(short = 'o', long, default_value = "0.08")]
    offset: f64,

    /// Interpolated positions sent per track segment
    #[arg(long, default_value = "10")]
    steps_per_segment: usize,

    /// Delay between updates in milliseconds
    #[arg(short = 'i', long, default_value = "50")]
    interval_ms: u64,
}

struct Probe {
    socket: UdpSocket,
    server_addr: SocketAddr,
}

impl Probe {
    async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        info!("Client socket bound to {}", socket.local_addr()?);
        Ok(Self {
            socket,
            server_addr: server_addr.parse()?,
        })
    }

    async fn request(&self, packet: &Packet) -> Result<Packet, Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), self.socket.recv_from(&mut buf)).await??;
        Ok(deserialize::<Packet>(&buf[..len])?)
    }

    async fn update(&self, point: Point3) -> Result<Snapshot, Box<dyn std::error::Error>> {
        let packet = Packet::Update {
            positions: PositionInput::single(point),
        };
        match self.request(&packet).await? {
            Packet::State { snapshot } => Ok(snapshot),
            other => Err(format!("unexpected response to update: {:?}", other).into()),
        }
    }
}

fn lerp(a: &Point3, b: &Point3, t: f64) -> Point3 {
    Point3::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
    )
}

/// Positions along the wire, shifted up by `offset`, ending on the end zone
fn route(track: &TrackDescriptor, offset: f64, steps_per_segment: usize) -> Vec<Point3> {
    let steps = steps_per_segment.max(1);
    let mut points: Vec<Point3> = track
        .track_points
        .windows(2)
        .flat_map(|segment| {
            (0..steps).map(move |i| lerp(&segment[0], &segment[1], i as f64 / steps as f64))
        })
        .map(|p| Point3::new(p.x, p.y + offset, p.z))
        .collect();
    points.push(track.end_zone);
    points
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let probe = Probe::connect(&args.server).await?;

    let track = match probe
        .request(&Packet::StartSession {
            client_version: PROTOCOL_VERSION,
            collision_threshold: args.threshold,
        })
        .await?
    {
        Packet::SessionStarted { snapshot, track } => {
            info!(
                "Session started, threshold {}, {} track points",
                snapshot.collision_threshold,
                track.track_points.len()
            );
            track
        }
        Packet::Error { kind, message } => {
            return Err(format!("server refused session ({:?}): {}", kind, message).into());
        }
        other => return Err(format!("unexpected response: {:?}", other).into()),
    };

    let armed = probe.update(track.start_zone).await?;
    if !armed.timing_started {
        warn!("Start zone touch was not registered");
    }

    let mut last = armed;
    for point in route(&track, args.offset, args.steps_per_segment) {
        sleep(Duration::from_millis(args.interval_ms)).await;
        last = probe.update(point).await?;
        info!(
            "t={:.2}s distance={:?} colliding={} collisions={}",
            last.elapsed_time, last.distance_to_track, last.is_colliding, last.collision_count
        );
        if last.game_completed {
            break;
        }
    }

    if last.game_completed {
        info!(
            "Run complete in {:.2}s with {} collisions",
            last.elapsed_time, last.collision_count
        );
    } else {
        warn!("Route finished without reaching the end zone");
    }

    probe.request(&Packet::EndSession).await?;
    Ok(())
}
