//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use s3l_common::ClientId;
use s3l_core::{
    Certificate, ClientHandshake, IdentityKeyPair, IdentityPublicKey, MemoryDirectory,
    ServerHandshake, TrustAnchor,
};

pub const ALICE: ClientId = ClientId::new(1);
pub const BOB: ClientId = ClientId::new(2);

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn identity(name: &str) -> Arc<IdentityKeyPair> {
    Arc::new(IdentityKeyPair::load_pem(fixture(name)).unwrap())
}

pub fn public_key(name: &str) -> IdentityPublicKey {
    IdentityPublicKey::load_pem(fixture(name)).unwrap()
}

pub fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with(ALICE, public_key("alice.pub"))
        .with(BOB, public_key("bob.pub"))
}

/// Server presenting `cert` while signing with `key`.
pub fn server_with(key: &str, cert: &str) -> ServerHandshake {
    ServerHandshake::new(
        identity(key),
        Certificate::load(fixture(cert)).unwrap(),
        Arc::new(directory()),
    )
}

pub fn server() -> ServerHandshake {
    server_with("server.key", "server.pem")
}

pub fn trust() -> TrustAnchor {
    TrustAnchor::load(fixture("ca.pem")).unwrap()
}

pub fn client_as(id: ClientId, key: &str) -> ClientHandshake {
    ClientHandshake::new(identity(key), id, trust(), "server")
}

pub fn alice() -> ClientHandshake {
    client_as(ALICE, "alice.key")
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
