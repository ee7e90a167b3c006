//! Integration tests for the client against a scripted server
//!
//! A plain tokio UDP socket plays the server side of the handshake and the
//! game traffic, using the protocol crate to frame and parse datagrams.

use bytes::{Buf, Bytes};
use client::{Angle, Client, ClientConfig, ClientError, HandshakeState, Position};
use protocol::codec::{Field, FieldType};
use protocol::commands::{toclient, toserver};
use protocol::packet::frame;
use protocol::{Codec, Control, Packet, PROTOCOL_ID, SEQNUM_INITIAL, SERVER_PEER_ID};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// One datagram as the server sees it.
#[derive(Debug)]
struct Received {
    peer_id: u16,
    channel: u8,
    packet: Packet,
}

struct FakeServer {
    socket: UdpSocket,
    codec: Codec,
    client: Option<SocketAddr>,
    next_seq: u16,
}

impl FakeServer {
    async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self {
            socket,
            codec: Codec::new(),
            client: None,
            next_seq: 1,
        }
    }

    fn addr(&self) -> String {
        self.socket.local_addr().unwrap().to_string()
    }

    async fn recv(&mut self) -> Received {
        let mut buf = [0u8; 2048];
        let (len, origin) = timeout(STEP_TIMEOUT, self.socket.recv_from(&mut buf))
            .await
            .expect("client went quiet")
            .unwrap();
        self.client = Some(origin);

        let mut data = Bytes::copy_from_slice(&buf[..len]);
        assert_eq!(data.get_u32(), PROTOCOL_ID);
        let peer_id = data.get_u16();
        let channel = data.get_u8();
        let packet = Packet::parse(&self.codec, data).unwrap();

        Received {
            peer_id,
            channel,
            packet,
        }
    }

    /// Next datagram, which must be a reliable command. Returns the
    /// sequence number and the payload after the command id.
    async fn recv_command(&mut self, expected: u16) -> (u16, Received, Bytes) {
        let received = self.recv().await;
        let (seq, mut payload) = match &received.packet {
            Packet::Reliable { seq, inner } => match inner.as_ref() {
                Packet::Original(payload) => (*seq, payload.clone()),
                other => panic!("expected an original packet, got {:?}", other),
            },
            other => panic!("expected a reliable packet, got {:?}", other),
        };
        assert_eq!(payload.get_u16(), expected, "unexpected command id");
        (seq, received, payload)
    }

    async fn recv_ack(&mut self) -> u16 {
        match self.recv().await.packet {
            Packet::Control(Control::Ack(seq)) => seq,
            other => panic!("expected an ack, got {:?}", other),
        }
    }

    async fn send(&self, packet: Packet) {
        let body = packet.encode(&self.codec).unwrap();
        let datagram = frame(&self.codec, SERVER_PEER_ID, 0, &body).unwrap();
        let client = self.client.expect("no client seen yet");
        self.socket.send_to(&datagram, client).await.unwrap();
    }

    async fn send_reliable(&mut self, payload: Bytes) -> u16 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.send(Packet::reliable(seq, Packet::original(payload)))
            .await;
        seq
    }

    /// Reads INIT and the empty reliable packet that follows it.
    async fn accept_init(&mut self) {
        let (seq, init, _) = self.recv_command(toserver::INIT).await;
        assert_eq!(seq, SEQNUM_INITIAL);
        assert_eq!(init.peer_id, 0);

        match self.recv().await.packet {
            Packet::Reliable { seq, inner } => {
                assert_eq!(seq, SEQNUM_INITIAL.wrapping_add(1));
                assert_eq!(*inner, Packet::Original(Bytes::new()));
            }
            other => panic!("expected the empty reliable packet, got {:?}", other),
        }
    }

    /// Runs the whole handshake and places the character.
    async fn admit(&mut self, peer_id: u16, position: [f64; 3], pitch: f64, yaw: f64) {
        self.accept_init().await;
        self.send(Packet::Control(Control::SetPeerId(peer_id)))
            .await;

        let (_, init2, _) = self.recv_command(toserver::INIT2).await;
        assert_eq!(init2.peer_id, peer_id);

        let seq = self
            .send_reliable(move_player(&self.codec, position, pitch, yaw))
            .await;
        assert_eq!(self.recv_ack().await, seq);
    }
}

fn config(server: &FakeServer) -> ClientConfig {
    ClientConfig::new(server.addr(), "tester").with_handshake_timeout(Some(STEP_TIMEOUT))
}

fn spawn_connect(config: ClientConfig) -> JoinHandle<Result<Client, ClientError>> {
    tokio::spawn(Client::connect(config))
}

async fn connected(server: &mut FakeServer, config: ClientConfig) -> Client {
    let pending = spawn_connect(config);
    server.admit(7, [1.0, 2.0, 3.0], 10.0, 20.0).await;
    pending.await.unwrap().unwrap()
}

async fn admitted(server: &mut FakeServer) -> Client {
    let config = config(server);
    connected(server, config).await
}

fn move_player(codec: &Codec, position: [f64; 3], pitch: f64, yaw: f64) -> Bytes {
    let fixed = |v: f64| (v * 1000.0).round() as i32;
    codec
        .encode(&[
            Field::u16("command", toclient::MOVE_PLAYER),
            Field::i32("x", fixed(position[0])),
            Field::i32("y", fixed(position[1])),
            Field::i32("z", fixed(position[2])),
            Field::i32("pitch", fixed(pitch)),
            Field::i32("yaw", fixed(yaw)),
        ])
        .unwrap()
}

fn wide_message(codec: &Codec, command: u16, text: &str) -> Bytes {
    let wide: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
    codec
        .encode(&[
            Field::u16("command", command),
            Field::u16("length", (wide.len() / 2) as u16),
            Field::fixed("text", wide.len(), wide),
        ])
        .unwrap()
}

/// HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    /// Peer id assignment is answered with INIT2 carrying the new id
    #[tokio::test]
    async fn handshake_assigns_peer_id() {
        let mut server = FakeServer::bind().await;
        let client = admitted(&mut server).await;

        assert_eq!(client.peer_id(), 7);
        assert_eq!(client.connection().handshake_state(), HandshakeState::Ready);
    }

    /// INIT and the empty reliable packet take the first two sequence numbers
    #[tokio::test]
    async fn sequence_numbers_continue_after_handshake() {
        let mut server = FakeServer::bind().await;
        let client = admitted(&mut server).await;

        // INIT, empty reliable and INIT2 used three numbers
        assert_eq!(client.connection().next_seq(), SEQNUM_INITIAL.wrapping_add(3));

        client.say("hi").await.unwrap();
        let (seq, received, _) = server.recv_command(toserver::CHAT_MESSAGE).await;
        assert_eq!(seq, SEQNUM_INITIAL.wrapping_add(3));
        assert_eq!(received.peer_id, 7);
        assert_eq!(received.channel, 0);
    }

    /// An empty line is still a chat message
    #[tokio::test]
    async fn empty_chat_is_sent() {
        let mut server = FakeServer::bind().await;
        let client = admitted(&mut server).await;

        client.say("").await.unwrap();
        let (_, _, mut payload) = server.recv_command(toserver::CHAT_MESSAGE).await;
        assert_eq!(payload.get_u16(), 0);
        assert!(payload.is_empty());
    }

    /// ACCESS_DENIED before SET_PEER_ID fails the connect with the reason
    #[tokio::test]
    async fn access_denied_during_handshake() {
        let mut server = FakeServer::bind().await;
        let pending = spawn_connect(config(&server));

        server.accept_init().await;
        let denial = wide_message(&server.codec, toclient::ACCESS_DENIED, "banned");
        server.send_reliable(denial).await;

        match pending.await.unwrap() {
            Err(ClientError::AccessDenied { reason }) => assert!(reason.contains("banned")),
            other => panic!("expected access denied, got {:?}", other.map(|_| ())),
        }
    }

    /// ACCESS_DENIED after SET_PEER_ID but before the first MOVE_PLAYER
    /// still fails the connect
    #[tokio::test]
    async fn access_denied_before_placement() {
        let mut server = FakeServer::bind().await;
        let pending = spawn_connect(config(&server));

        server.accept_init().await;
        server.send(Packet::Control(Control::SetPeerId(7))).await;
        let (_, init2, _) = server.recv_command(toserver::INIT2).await;
        assert_eq!(init2.peer_id, 7);

        let denial = wide_message(&server.codec, toclient::ACCESS_DENIED, "server full");
        let seq = server.send_reliable(denial).await;
        assert_eq!(server.recv_ack().await, seq);

        match pending.await.unwrap() {
            Err(ClientError::AccessDenied { reason }) => assert_eq!(reason, "server full"),
            other => panic!("expected access denied, got {:?}", other.map(|_| ())),
        }
    }

    /// A silent server trips the configured timeout
    #[tokio::test]
    async fn silent_server_times_out() {
        let server = FakeServer::bind().await;
        let config = ClientConfig::new(server.addr(), "tester")
            .with_handshake_timeout(Some(Duration::from_millis(200)));

        let result = Client::connect(config).await;
        assert!(matches!(result, Err(ClientError::HandshakeTimeout)));
    }

    /// Datagrams claiming another sender peer id end the session
    #[tokio::test]
    async fn foreign_peer_id_aborts_handshake() {
        let mut server = FakeServer::bind().await;
        let pending = spawn_connect(config(&server));

        server.accept_init().await;
        let body = Packet::Control(Control::SetPeerId(7))
            .encode(&server.codec)
            .unwrap();
        let datagram = frame(&server.codec, 9, 0, &body).unwrap();
        server
            .socket
            .send_to(&datagram, server.client.unwrap())
            .await
            .unwrap();

        assert!(matches!(
            pending.await.unwrap(),
            Err(ClientError::ConnectionClosed)
        ));
    }
}

/// GAME TRAFFIC TESTS
mod game_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    /// The first MOVE_PLAYER sets the local position before connect returns
    #[tokio::test]
    async fn move_player_sets_initial_state() {
        let mut server = FakeServer::bind().await;
        let client = admitted(&mut server).await;

        let player = client.player();
        assert_approx_eq!(player.position.x, 1.0);
        assert_approx_eq!(player.position.y, 2.0);
        assert_approx_eq!(player.position.z, 3.0);
        assert_approx_eq!(player.angle.pitch, 10.0);
        assert_approx_eq!(player.angle.yaw, 20.0);
        assert_eq!(player.hp, 20);
    }

    /// Chat is acknowledged and then handed to the callback
    #[tokio::test]
    async fn chat_is_acked_then_delivered() {
        let mut server = FakeServer::bind().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = config(&server).with_on_message(move |message| {
            let _ = tx.send(message);
        });
        let _client = connected(&mut server, config).await;

        let chat = wide_message(&server.codec, toclient::CHAT_MESSAGE, "<admin> héllo");
        let seq = server.send_reliable(chat).await;

        assert_eq!(server.recv_ack().await, seq);
        let message = timeout(STEP_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(message, "<admin> héllo");
    }

    /// Split chunks arriving out of order are acked and reassembled
    #[tokio::test]
    async fn split_chat_is_reassembled() {
        let mut server = FakeServer::bind().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = admitted(&mut server).await;
        client.set_on_message(move |message| {
            let _ = tx.send(message);
        });

        let chat = wide_message(&server.codec, toclient::CHAT_MESSAGE, "split in two");
        let (head, tail) = chat.split_at(5);
        let chunks = [(1u16, Bytes::copy_from_slice(tail)), (0u16, Bytes::copy_from_slice(head))];

        for (index, data) in chunks {
            let seq = server.next_seq;
            server.next_seq += 1;
            server
                .send(Packet::reliable(
                    seq,
                    Packet::Split {
                        seq: 42,
                        chunk_count: 2,
                        chunk_index: index,
                        data,
                    },
                ))
                .await;
            assert_eq!(server.recv_ack().await, seq);
        }

        let message = timeout(STEP_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(message, "split in two");
    }

    /// Relative movement is sent as an absolute PLAYERPOS
    #[tokio::test]
    async fn move_by_sends_playerpos() {
        let mut server = FakeServer::bind().await;
        let client = admitted(&mut server).await;

        client
            .move_by(Position::new(1.0, 0.0, -0.5), Angle::new(0.0, 5.0))
            .await
            .unwrap();

        let (_, _, mut payload) = server.recv_command(toserver::PLAYERPOS).await;
        let values = server
            .codec
            .decode(
                &[
                    ("x", FieldType::I32),
                    ("y", FieldType::I32),
                    ("z", FieldType::I32),
                    ("speed_x", FieldType::I32),
                    ("speed_y", FieldType::I32),
                    ("speed_z", FieldType::I32),
                    ("pitch", FieldType::I32),
                    ("yaw", FieldType::I32),
                    ("keys", FieldType::U32),
                ],
                &mut payload,
            )
            .unwrap();
        let ints: Vec<i32> = values[..8].iter().map(|v| v.as_i32().unwrap()).collect();

        assert_eq!(ints, vec![2000, 2000, 2500, 0, 0, 0, 1000, 2500]);
        assert_eq!(values[8].as_u32(), Some(1));

        let player = client.player();
        assert_approx_eq!(player.position.x, 2.0);
        assert_approx_eq!(player.position.z, 2.5);
        assert_approx_eq!(player.angle.yaw, 25.0);
    }

    /// Death triggers an automatic respawn request
    #[tokio::test]
    async fn deathscreen_requests_respawn() {
        let mut server = FakeServer::bind().await;
        let _client = admitted(&mut server).await;

        let death = server
            .codec
            .encode(&[Field::u16("command", toclient::DEATHSCREEN)])
            .unwrap();
        let seq = server.send_reliable(death).await;

        assert_eq!(server.recv_ack().await, seq);
        server.recv_command(toserver::RESPAWN).await;
    }

    /// HP updates reach the local state
    #[tokio::test]
    async fn hp_updates_state() {
        let mut server = FakeServer::bind().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = config(&server).with_on_message(move |message| {
            let _ = tx.send(message);
        });
        let client = connected(&mut server, config).await;

        let hp = server
            .codec
            .encode(&[Field::u16("command", toclient::HP), Field::u8("hp", 6)])
            .unwrap();
        server.send_reliable(hp).await;
        server.recv_ack().await;

        // Dispatch is in order, so the HP update is applied once this arrives
        let marker = wide_message(&server.codec, toclient::CHAT_MESSAGE, "done");
        server.send_reliable(marker).await;
        server.recv_ack().await;
        timeout(STEP_TIMEOUT, rx.recv()).await.unwrap().unwrap();

        assert_eq!(client.player().hp, 6);
    }

    /// Disconnect sends a DISCO control packet
    #[tokio::test]
    async fn disconnect_sends_disco() {
        let mut server = FakeServer::bind().await;
        let client = admitted(&mut server).await;

        client.disconnect().await.unwrap();
        let received = server.recv().await;
        assert_eq!(received.peer_id, 7);
        assert_eq!(received.packet, Packet::Control(Control::Disco));
    }
}
