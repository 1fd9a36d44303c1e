//! End-to-end behaviour of `SecureChannel`: lazy handshake, chunking,
//! ordering, tamper detection and the shutdown exchange.

mod common;

use std::net::TcpListener;
use std::thread;

use s3l_core::protocol::{read_frame, FrameHeader, MAC_SIZE, MAX_DATA_PAYLOAD};
use s3l_core::{ContentType, CoreError, HandshakeState, Role, SecureChannel, SessionKeys};
use s3l_transport::{local_pair, ByteChannel, LocalChannel, TcpChannel};

use common::{alice, pattern, server, ALICE};

fn keys() -> SessionKeys {
    SessionKeys::new([0x11; 16], [0x22; 16], [0x33; 16])
}

/// Frames captured from the wire, re-encoded for replay.
fn capture(raw: &mut LocalChannel, count: usize) -> Vec<(FrameHeader, Vec<u8>)> {
    (0..count).map(|_| read_frame(raw).unwrap()).collect()
}

fn encode(frame: &(FrameHeader, Vec<u8>)) -> Vec<u8> {
    let mut bytes = frame.0.to_bytes().to_vec();
    bytes.extend_from_slice(&frame.1);
    bytes
}

#[test]
fn lazy_handshake_then_echo() {
    let (a, b) = local_pair();
    let handle = thread::spawn(move || {
        let mut channel = SecureChannel::server(b, server());
        assert_eq!(channel.state(), HandshakeState::Start);
        let request = channel.read(5).unwrap();
        assert_eq!(channel.client_id(), Some(ALICE));
        channel.write(&request).unwrap();
    });

    let mut client = SecureChannel::client(a, alice());
    client.write(b"hello").unwrap();
    assert_eq!(client.state(), HandshakeState::Ready);
    assert_eq!(client.read(5).unwrap(), b"hello");
    client.close();
    handle.join().unwrap();
}

#[test]
fn accept_reports_client_id() {
    let (a, b) = local_pair();
    let handle = thread::spawn(move || {
        let (channel, client_id) = SecureChannel::accept(b, &server()).unwrap();
        assert_eq!(channel.role(), Role::Server);
        client_id
    });

    let mut client = SecureChannel::client(a, alice());
    client.handshake().unwrap();
    assert!(client.peer_key().is_some());
    client.close();
    assert_eq!(handle.join().unwrap(), ALICE);
}

#[test]
fn failed_handshake_closes_channel() {
    let (a, b) = local_pair();
    let handle = thread::spawn(move || SecureChannel::accept(b, &server()).map(|(_, id)| id));

    let impostor = common::client_as(ALICE, "bob.key");
    let mut client = SecureChannel::client(a, impostor);
    assert!(matches!(client.write(b"x"), Err(CoreError::HandshakeRejected)));
    assert_eq!(client.state(), HandshakeState::Aborted);
    assert!(client.is_closed());
    assert!(matches!(client.read(1), Err(CoreError::ChannelClosed)));
    assert!(handle.join().unwrap().is_err());
}

#[test]
fn order_is_kept_across_read_sizes() {
    let first = pattern(5000);
    let second: Vec<u8> = pattern(3000).into_iter().rev().collect();
    let expected = [first.clone(), second.clone()].concat();

    let (a, b) = local_pair();
    let handle = thread::spawn(move || {
        let mut channel = SecureChannel::server(b, server());
        let mut received = Vec::new();
        for size in [1, 777, 4096, 0, 2000, 1126] {
            received.extend(channel.read(size).unwrap());
        }
        assert_eq!(channel.buffered(), 0);
        received
    });

    let mut client = SecureChannel::client(a, alice());
    client.write(&first).unwrap();
    client.write(&second).unwrap();
    client.close();
    let received = handle.join().unwrap();
    assert_eq!(received, expected);
}

#[test]
fn ten_thousand_bytes_travel_as_three_frames() {
    let payload = pattern(10_000);
    let (a, mut b) = local_pair();
    let (mut c, d) = local_pair();

    let mut client = SecureChannel::from_keys(a, Role::Client, keys()).unwrap();
    client.write(&payload).unwrap();

    let frames = capture(&mut b, 3);
    let sizes: Vec<usize> = frames.iter().map(|(h, _)| usize::from(h.length)).collect();
    let seqs: Vec<u32> = frames.iter().map(|(h, _)| h.sequence_number).collect();
    assert_eq!(sizes, vec![2 + MAX_DATA_PAYLOAD + MAC_SIZE, 2 + MAX_DATA_PAYLOAD + MAC_SIZE, 2 + 1808 + MAC_SIZE]);
    assert_eq!(seqs, vec![0, 1, 2]);
    assert!(frames.iter().all(|(h, _)| h.content_type == ContentType::Data));
    assert_eq!(b.pending(), 0);

    for frame in &frames {
        c.write(&encode(frame)).unwrap();
    }
    let mut server = SecureChannel::from_keys(d, Role::Server, keys()).unwrap();
    assert_eq!(server.read(10_000).unwrap(), payload);

    // Unblock both cooperative closes.
    b.close();
    c.close();
    drop(server);
    drop(client);
}

#[test]
fn sequence_numbers_continue_across_writes() {
    let (a, mut b) = local_pair();
    let mut client = SecureChannel::from_keys(a, Role::Client, keys()).unwrap();
    client.write(b"one").unwrap();
    client.write(&[]).unwrap();
    client.write(b"two").unwrap();

    let frames = capture(&mut b, 2);
    assert_eq!(frames[0].0.sequence_number, 0);
    assert_eq!(frames[1].0.sequence_number, 1);
    assert_eq!(usize::from(frames[1].0.length), 2 + 3 + MAC_SIZE);
    b.close();
}

#[test]
fn replayed_frame_is_a_sequence_violation() {
    let (a, mut b) = local_pair();
    let (mut c, d) = local_pair();
    let mut client = SecureChannel::from_keys(a, Role::Client, keys()).unwrap();
    client.write(b"one").unwrap();
    let frames = capture(&mut b, 1);

    c.write(&encode(&frames[0])).unwrap();
    c.write(&encode(&frames[0])).unwrap();
    let mut server = SecureChannel::from_keys(d, Role::Server, keys()).unwrap();
    assert_eq!(server.read(3).unwrap(), b"one");
    assert!(matches!(
        server.read(3),
        Err(CoreError::SequenceViolation { expected: 1, received: 0 })
    ));
    assert!(server.is_closed());
    assert!(matches!(server.read(1), Err(CoreError::ChannelClosed)));
    b.close();
}

#[test]
fn reordered_frames_are_a_sequence_violation() {
    let (a, mut b) = local_pair();
    let (mut c, d) = local_pair();
    let mut client = SecureChannel::from_keys(a, Role::Client, keys()).unwrap();
    client.write(b"one").unwrap();
    client.write(b"two").unwrap();
    let frames = capture(&mut b, 2);

    c.write(&encode(&frames[1])).unwrap();
    c.write(&encode(&frames[0])).unwrap();
    let mut server = SecureChannel::from_keys(d, Role::Server, keys()).unwrap();
    let err = server.read(3).unwrap_err();
    assert!(matches!(err, CoreError::SequenceViolation { expected: 0, received: 1 }));
    assert!(err.is_integrity_violation());
    b.close();
}

#[test]
fn tampered_mac_is_an_authentication_failure() {
    let (a, mut b) = local_pair();
    let (mut c, d) = local_pair();
    let mut client = SecureChannel::from_keys(a, Role::Client, keys()).unwrap();
    client.write(b"payload").unwrap();
    let mut frames = capture(&mut b, 1);
    let last = frames[0].1.len() - 1;
    frames[0].1[last] ^= 0xFF;

    c.write(&encode(&frames[0])).unwrap();
    let mut server = SecureChannel::from_keys(d, Role::Server, keys()).unwrap();
    assert!(matches!(server.read(7), Err(CoreError::AuthenticationFailure { .. })));
    assert!(server.is_closed());
    b.close();
}

#[test]
fn unexpected_message_type_closes_channel() {
    let (mut a, b) = local_pair();
    let mut server = SecureChannel::from_keys(b, Role::Server, keys()).unwrap();
    // ServerHello header with an empty body.
    a.write(&[1, 0, 0, 1, 0, 0, 0, 0]).unwrap();
    assert!(matches!(
        server.read(1),
        Err(CoreError::UnexpectedMessageType { received: ContentType::ServerHello, .. })
    ));
    assert!(server.is_closed());
}

#[test]
fn bad_connection_after_handshake_is_a_rejection() {
    let (mut a, b) = local_pair();
    let mut client = SecureChannel::from_keys(b, Role::Client, keys()).unwrap();
    a.write(&[4, 0, 0, 1, 0, 0, 0, 0]).unwrap();
    assert!(matches!(client.read(1), Err(CoreError::HandshakeRejected)));
}

#[test]
fn close_ends_the_peers_stream() {
    let (a, b) = local_pair();
    let mut client = SecureChannel::from_keys(a, Role::Client, keys()).unwrap();
    let mut server = SecureChannel::from_keys(b, Role::Server, keys()).unwrap();
    client.write(b"last words").unwrap();

    let handle = thread::spawn(move || {
        assert_eq!(server.read(10).unwrap(), b"last words");
        let err = server.read(1).unwrap_err();
        assert!(err.is_end_of_stream());
        assert!(matches!(err, CoreError::EndOfStream));
        assert!(server.is_closed());
    });

    client.close();
    assert!(client.is_closed());
    assert!(matches!(client.read(1), Err(CoreError::ChannelClosed)));
    assert!(matches!(client.write(b"x"), Err(CoreError::ChannelClosed)));
    client.close();
    handle.join().unwrap();
}

#[test]
fn simultaneous_close_does_not_hang() {
    let (a, b) = local_pair();
    let mut client = SecureChannel::from_keys(a, Role::Client, keys()).unwrap();
    let mut server = SecureChannel::from_keys(b, Role::Server, keys()).unwrap();
    let handle = thread::spawn(move || server.close());
    client.close();
    handle.join().unwrap();
}

#[test]
fn secure_echo_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let raw = TcpChannel::from_stream(stream).unwrap();
        let (mut channel, client_id) = SecureChannel::accept(raw, &server()).unwrap();
        let request = channel.read(9000).unwrap();
        channel.write(&request).unwrap();
        client_id
    });

    let raw = TcpChannel::connect(addr.as_str()).unwrap();
    let mut client = SecureChannel::client(raw, alice());
    let payload = pattern(9000);
    client.write(&payload).unwrap();
    assert_eq!(client.read(9000).unwrap(), payload);
    client.close();
    assert_eq!(handle.join().unwrap(), ALICE);
}
