//! Client and server handshake procedures run against each other over an
//! in-process channel pair.

mod common;

use std::thread;

use s3l_common::ClientId;
use s3l_core::crypto::{derive_key_block, mac};
use s3l_core::protocol::{read_frame, write_message, ClientFinished, ClientHello, ServerHello, IV_SIZE};
use s3l_core::{
    ClientHandshake, ContentType, CoreError, EphemeralKeyPair, HandshakeOutcome, Result,
    ServerHandshake, WireMessage,
};
use s3l_transport::{local_pair, ByteChannel};

use common::{alice, client_as, server, server_with, ALICE, BOB};

/// Runs both sides; the client closes its end afterwards so a server
/// still waiting for ClientFinished sees the disconnect.
fn run(client: ClientHandshake, server: ServerHandshake) -> (Result<HandshakeOutcome>, Result<HandshakeOutcome>) {
    let (mut a, mut b) = local_pair();
    let handle = thread::spawn(move || server.run(&mut b));
    let client_result = client.run(&mut a);
    a.close();
    (client_result, handle.join().unwrap())
}

#[test]
fn matching_credentials_derive_identical_keys() {
    let (client, server) = run(alice(), server());
    let client = client.unwrap();
    let server = server.unwrap();

    assert_eq!(client.keys, server.keys);
    assert_eq!(server.client_id, ALICE);
    assert_eq!(server.peer_key, common::public_key("alice.pub"));
    assert_eq!(client.peer_key, common::identity("server.key").public_key());
}

#[test]
fn separate_handshakes_derive_different_keys() {
    let (first, _) = run(alice(), server());
    let (second, _) = run(alice(), server());
    let first = first.unwrap();
    let second = second.unwrap();
    assert_ne!(first.keys, second.keys);
    assert_ne!(first.keys.iv(), second.keys.iv());
}

#[test]
fn second_client_is_told_apart() {
    let (_, server) = run(client_as(BOB, "bob.key"), server());
    assert_eq!(server.unwrap().client_id, BOB);
}

#[test]
fn wrong_common_name_is_rejected() {
    let (client, server) = run(alice(), server_with("impostor.key", "impostor.pem"));
    assert!(matches!(client, Err(CoreError::CertificateInvalid { .. })));
    assert!(server.is_err());
}

#[test]
fn certificate_from_foreign_root_is_rejected() {
    let (client, _) = run(alice(), server_with("rogue_server.key", "rogue_server.pem"));
    assert!(matches!(client, Err(CoreError::CertificateInvalid { .. })));
}

#[test]
fn expired_certificate_is_rejected() {
    let (client, _) = run(alice(), server_with("expired.key", "expired.pem"));
    assert!(matches!(client, Err(CoreError::CertificateInvalid { .. })));
}

#[test]
fn server_signing_with_wrong_key_is_rejected() {
    // Valid certificate, but the ServerHello is signed by another key.
    let (client, _) = run(alice(), server_with("impostor.key", "server.pem"));
    assert!(matches!(client, Err(CoreError::AuthenticationFailure { .. })));
}

#[test]
fn unknown_client_gets_bad_connection() {
    let (client, server) = run(client_as(ClientId::new(99), "alice.key"), server());
    assert!(matches!(server, Err(CoreError::AuthenticationFailure { .. })));
    assert!(matches!(client, Err(CoreError::HandshakeRejected)));
}

#[test]
fn client_using_someone_elses_id_is_rejected() {
    let (client, server) = run(client_as(BOB, "alice.key"), server());
    assert!(matches!(server, Err(CoreError::AuthenticationFailure { .. })));
    assert!(matches!(client, Err(CoreError::HandshakeRejected)));
}

#[test]
fn server_rejects_data_before_hello() {
    let (mut a, mut b) = local_pair();
    let handle = thread::spawn(move || server().run(&mut b));
    // A well-formed header for a Data frame with an empty body.
    a.write(&[3, 0, 0, 1, 0, 0, 0, 0]).unwrap();
    let result = handle.join().unwrap();
    assert!(matches!(result, Err(CoreError::UnexpectedMessageType { .. })));
    // The server answered with BadConnection.
    assert_eq!(a.read(8).unwrap()[0], 4);
}

#[test]
fn server_reports_disconnect_mid_handshake() {
    let (mut a, mut b) = local_pair();
    let handle = thread::spawn(move || server().run(&mut b));
    a.close();
    let result = handle.join().unwrap();
    assert!(result.unwrap_err().is_end_of_stream());
}

// ============================================
// Tampered ClientFinished
// ============================================

/// Drives the client side by hand with a valid ClientHello, lets `tamper`
/// alter the ClientFinished (given the session auth key), and returns the
/// server's result plus the type of the frame it answered with.
fn finish_with(tamper: impl FnOnce(&mut ClientFinished, &[u8])) -> (Result<HandshakeOutcome>, ContentType) {
    let (mut a, mut b) = local_pair();
    let server = server();
    let handle = thread::spawn(move || server.run(&mut b));

    let identity = common::identity("alice.key");
    let ephemeral = EphemeralKeyPair::generate();
    let client_dh = ephemeral.public_key_bytes();
    let iv = [9u8; IV_SIZE];
    let hello = ClientHello::create(&identity, ALICE, iv, client_dh.to_vec());
    write_message(&mut a, &hello, 0).unwrap();

    let (header, body) = read_frame(&mut a).unwrap();
    let server_hello = ServerHello::deserialize(&header, &body).unwrap();
    let shared = ephemeral.exchange(&server_hello.dh_pubkey).unwrap();
    let keys = derive_key_block(&shared, &client_dh, &server_hello.dh_pubkey, iv).unwrap();

    let mut finished = ClientFinished::create(
        &identity,
        keys.auth_key(),
        ALICE,
        iv,
        &client_dh,
        &server_hello.dh_pubkey,
    )
    .unwrap();
    tamper(&mut finished, keys.auth_key());
    write_message(&mut a, &finished, 0).unwrap();

    let (reply, _) = read_frame(&mut a).unwrap();
    a.close();
    (handle.join().unwrap(), reply.content_type)
}

/// Recomputes the MAC so only the intended field is wrong.
fn reseal(finished: &mut ClientFinished, auth_key: &[u8]) {
    finished.mac = mac::compute(auth_key, &[&finished.data_to_mac()]).unwrap();
}

fn auth_reason(result: Result<HandshakeOutcome>) -> String {
    match result {
        Err(CoreError::AuthenticationFailure { reason }) => reason,
        other => panic!("expected an authentication failure, got {other:?}"),
    }
}

#[test]
fn finish_with_another_iv_is_rejected() {
    let (result, reply) = finish_with(|finished, auth_key| {
        finished.iv = [7u8; IV_SIZE];
        reseal(finished, auth_key);
    });
    assert!(auth_reason(result).contains("IV"));
    assert_eq!(reply, ContentType::BadConnection);
}

#[test]
fn finish_naming_another_client_is_rejected() {
    let (result, reply) = finish_with(|finished, auth_key| {
        finished.client_id = BOB;
        reseal(finished, auth_key);
    });
    assert!(auth_reason(result).contains("another client"));
    assert_eq!(reply, ContentType::BadConnection);
}

#[test]
fn finish_with_flipped_mac_byte_is_rejected() {
    let (result, reply) = finish_with(|finished, _| finished.mac[0] ^= 0x01);
    assert!(auth_reason(result).contains("MAC"));
    assert_eq!(reply, ContentType::BadConnection);
}

#[test]
fn finish_with_bad_signature_is_rejected() {
    let (result, reply) = finish_with(|finished, auth_key| {
        finished.signature[0] ^= 0x01;
        reseal(finished, auth_key);
    });
    assert!(auth_reason(result).contains("signature"));
    assert_eq!(reply, ContentType::BadConnection);
}
