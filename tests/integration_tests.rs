//! Integration tests for the buzz wire server components
//!
//! These tests validate cross-crate behaviour and a real UDP round trip.

use bincode::{deserialize, serialize};
use server::clock::ManualClock;
use server::game::BuzzWireGame;
use server::track::Track;
use shared::{Packet, Point3, PositionInput, Snapshot, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;

/// GAME SCENARIO TESTS
mod game_scenario_tests {
    use super::*;

    fn two_point_game() -> (BuzzWireGame<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let track = Track::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)])
            .unwrap();
        let mut game = BuzzWireGame::with_track(track, 0.05, clock.clone());
        game.start();
        (game, clock)
    }

    /// Walks a complete run: arm, touch the wire twice, finish
    #[test]
    fn full_session_lifecycle() {
        let (mut game, clock) = two_point_game();

        let armed = game.update(&[Point3::new(0.05, 0.0, 0.0)]);
        assert!(armed.timing_started);
        assert_eq!(armed.distance_to_track, None);

        clock.advance_secs(0.2);
        let touch = game.update(&[Point3::new(0.5, 0.0, 0.0)]);
        assert!(touch.is_colliding);
        assert_eq!(touch.collision_count, 1);

        clock.advance_secs(0.2);
        let clear = game.update(&[Point3::new(0.5, 1.0, 0.0)]);
        assert!(!clear.is_colliding);
        assert_eq!(clear.distance_to_track, Some(1.0));

        clock.advance_secs(0.4);
        let second = game.update(&[Point3::new(0.6, 0.01, 0.0)]);
        assert_eq!(second.collision_count, 2);

        clock.advance_secs(0.2);
        let done = game.update(&[Point3::new(0.98, 0.0, 0.0)]);
        assert!(done.game_completed);
        assert_eq!(done.elapsed_time, 1.0);

        clock.advance_secs(10.0);
        let after = game.update(&[Point3::new(0.5, 0.0, 0.0)]);
        assert!(after.game_completed);
        assert_eq!(after.elapsed_time, 1.0);
        assert_eq!(after.collision_count, 2);
    }

    /// The redesign allows any number of independent games side by side
    #[test]
    fn independent_games_do_not_interfere() {
        let (mut first, _) = two_point_game();
        let (mut second, _) = two_point_game();

        first.update(&[Point3::new(0.0, 0.0, 0.0)]);
        first.update(&[Point3::new(0.5, 0.0, 0.0)]);

        assert_eq!(first.state().collision_count, 1);
        assert!(!second.state().timing_started);
        assert_eq!(second.update(&[Point3::new(0.5, 0.0, 0.0)]).collision_count, 0);
    }

    /// Restarting mid-run discards everything, including the cooldown
    #[test]
    fn restart_discards_cooldown() {
        let (mut game, _) = two_point_game();
        game.update(&[Point3::new(0.0, 0.0, 0.0)]);
        game.update(&[Point3::new(0.5, 0.0, 0.0)]);

        game.start();
        game.update(&[Point3::new(0.0, 0.0, 0.0)]);
        let snapshot = game.update(&[Point3::new(0.5, 0.0, 0.0)]);

        assert_eq!(snapshot.collision_count, 1);
    }

    /// Position normalization feeds the game the same points either way
    #[test]
    fn single_and_multiple_inputs_agree() {
        let (mut a, _) = two_point_game();
        let (mut b, _) = two_point_game();
        let point = Point3::new(0.02, 0.0, 0.0);

        let single = PositionInput::single(point).normalize().unwrap();
        let multiple = PositionInput::multiple(&[point]).normalize().unwrap();

        assert_eq!(a.update(&single), b.update(&multiple));
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use server::network::{Server, ServerConfig};
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    async fn spawn_server() -> SocketAddr {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let mut server = Server::new(config).await.expect("Failed to start server");
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        addr
    }

    async fn round_trip(socket: &UdpSocket, server: SocketAddr, packet: &Packet) -> Packet {
        let data = serialize(packet).unwrap();
        socket.send_to(&data, server).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("Timed out waiting for server")
            .unwrap();
        deserialize(&buf[..len]).unwrap()
    }

    fn expect_state(packet: Packet) -> Snapshot {
        match packet {
            Packet::State { snapshot } => snapshot,
            other => panic!("Expected State, got {:?}", other),
        }
    }

    /// Tests a full request sequence against a live UDP server
    #[tokio::test]
    async fn udp_session_round_trip() {
        let server = spawn_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let health = round_trip(&socket, server, &Packet::Health).await;
        assert!(matches!(health, Packet::HealthStatus { ref status, .. } if status == "ok"));

        let no_session = round_trip(&socket, server, &Packet::GetState).await;
        assert!(matches!(no_session, Packet::Error { .. }));

        let started = round_trip(
            &socket,
            server,
            &Packet::StartSession {
                client_version: PROTOCOL_VERSION,
                collision_threshold: Some(0.05),
            },
        )
        .await;
        let track = match started {
            Packet::SessionStarted { snapshot, track } => {
                assert!(snapshot.game_started);
                track
            }
            other => panic!("Expected SessionStarted, got {:?}", other),
        };

        let armed = expect_state(
            round_trip(
                &socket,
                server,
                &Packet::Update {
                    positions: PositionInput::single(track.start_zone),
                },
            )
            .await,
        );
        assert!(armed.timing_started);

        let touching = expect_state(
            round_trip(
                &socket,
                server,
                &Packet::Update {
                    positions: PositionInput::single(track.track_points[3]),
                },
            )
            .await,
        );
        assert!(touching.is_colliding);
        assert_eq!(touching.collision_count, 1);

        let reset = expect_state(round_trip(&socket, server, &Packet::ResetSession).await);
        assert!(!reset.timing_started);
        assert_eq!(reset.collision_count, 0);

        let ended = round_trip(&socket, server, &Packet::EndSession).await;
        assert_eq!(ended, Packet::SessionEnded);
    }

    /// Two sockets get two independent sessions
    #[tokio::test]
    async fn udp_clients_have_separate_sessions() {
        let server = spawn_server().await;
        let alice = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bob = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let start = Packet::StartSession {
            client_version: PROTOCOL_VERSION,
            collision_threshold: None,
        };
        round_trip(&alice, server, &start).await;
        round_trip(&bob, server, &start).await;

        round_trip(
            &alice,
            server,
            &Packet::Update {
                positions: PositionInput::single(Point3::new(-0.5, 1.0, 0.0)),
            },
        )
        .await;

        let alice_state = expect_state(round_trip(&alice, server, &Packet::GetState).await);
        let bob_state = expect_state(round_trip(&bob, server, &Packet::GetState).await);

        assert!(alice_state.timing_started);
        assert!(!bob_state.timing_started);
    }

    /// Updates carrying many points still get exactly one reply
    #[tokio::test]
    async fn large_multi_point_update_gets_reply() {
        let server = spawn_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let start = Packet::StartSession {
            client_version: PROTOCOL_VERSION,
            collision_threshold: None,
        };
        round_trip(&socket, server, &start).await;

        let update = Packet::Update {
            positions: PositionInput::multiple(&[Point3::new(-0.5, 1.0, 0.0); 200]),
        };
        assert!(serialize(&update).unwrap().len() > 2048);

        let armed = expect_state(round_trip(&socket, server, &update).await);
        assert!(armed.timing_started);

        let health = round_trip(&socket, server, &Packet::Health).await;
        assert!(matches!(health, Packet::HealthStatus { .. }));
    }

    /// Tests that garbage datagrams are dropped without killing the server
    #[test]
    fn garbage_is_ignored() {
        tokio_test::block_on(async {
            let server = spawn_server().await;
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

            socket.send_to(&[0xff, 0xff, 0xff], server).await.unwrap();

            let health = round_trip(&socket, server, &Packet::Health).await;
            assert!(matches!(health, Packet::HealthStatus { .. }));
        });
    }
}
