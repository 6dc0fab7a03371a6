//! End-to-end identify and identify-push between nodes on a memory network.

use std::sync::Arc;
use std::time::Duration;

use ident_core::{
    Dispatcher, IdentifyConfig, IdentifyError, IdentifyFailure, IdentifyService, InMemoryDirectory, LocalPeer,
    PeerDirectory,
};
use ident_proto::consts::{IDENTIFY_PROTOCOL, PUSH_PROTOCOL};
use ident_proto::{Multiaddr, PeerId};
use ident_transport::{Endpoint, FrameCodec, MemoryNetwork, MemorySubstream, TransportError};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

struct Node {
    id: PeerId,
    local: Arc<LocalPeer>,
    directory: Arc<InMemoryDirectory>,
    service: Arc<IdentifyService>,
    dispatcher: Arc<Dispatcher>,
    _runner: JoinHandle<()>,
}

fn addr(a: u8, b: u8) -> Multiaddr {
    Multiaddr::from_wire(&[4, 10, 0, a, b, 6, 0x0f, 0xa1]).unwrap()
}

fn spawn_node(network: &Arc<MemoryNetwork>, key: &str, dial_addr: Option<Multiaddr>) -> Node {
    let local = Arc::new(LocalPeer::new(key.as_bytes().to_vec()));
    let directory = Arc::new(InMemoryDirectory::new());
    let (transport, incoming) =
        network.listen(Endpoint::new(local.id(), dial_addr), &[IDENTIFY_PROTOCOL, PUSH_PROTOCOL]);

    let service = Arc::new(IdentifyService::new(
        IdentifyConfig::default(),
        local.clone(),
        directory.clone(),
        Arc::new(transport),
    ));
    let dispatcher = Arc::new(Dispatcher::new(service.clone()));
    local.set_protocols(dispatcher.protocols());
    let runner = tokio::spawn(dispatcher.clone().run(incoming));

    Node {
        id: local.id(),
        local,
        directory,
        service,
        dispatcher,
        _runner: runner,
    }
}

async fn eventually<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn identify_with_no_extras() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let bob = spawn_node(&network, "bob", None);
    bob.local.set_protocols(Vec::<String>::new());

    let outcome = alice.service.identify_peer(&bob.id).await.unwrap();

    assert_eq!(outcome.peer.public_key.as_deref(), Some("bob".as_bytes()));
    assert!(outcome.peer.multiaddrs.is_empty());
    assert!(outcome.peer.protocols.is_empty());
    assert_eq!(outcome.observed_addr, None);
    assert_eq!(outcome.protocol_version.as_deref(), Some(ident_proto::consts::PROTOCOL_VERSION));
    assert_eq!(outcome.agent_version.as_deref(), Some(ident_proto::consts::AGENT_VERSION));
    assert_eq!(bob.dispatcher.stats().identify, 1);
}

#[tokio::test]
async fn identify_with_addresses_preserves_order() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", Some(addr(0, 1)));
    let bob = spawn_node(&network, "bob", Some(addr(0, 2)));
    bob.local.set_listen_addrs(vec![addr(9, 3), addr(9, 1), addr(9, 2)]);

    let outcome = alice.service.identify_peer(&bob.id).await.unwrap();

    let record = alice.directory.snapshot(&bob.id).unwrap();
    assert_eq!(record.multiaddrs.as_slice(), &[addr(9, 3), addr(9, 1), addr(9, 2)]);
    assert!(record.protocols.supports(PUSH_PROTOCOL));
    // Bob reports the address alice dialed from.
    assert_eq!(outcome.observed_addr, Some(addr(0, 1)));
}

#[tokio::test]
async fn repeated_identify_is_idempotent() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let bob = spawn_node(&network, "bob", None);
    bob.local.set_listen_addrs(vec![addr(1, 1), addr(1, 2)]);

    let first = alice.service.identify_peer(&bob.id).await.unwrap();
    let second = alice.service.identify_peer(&bob.id).await.unwrap();
    assert_eq!(first.peer, second.peer);

    bob.local.add_listen_addr(addr(1, 3));
    let third = alice.service.identify_peer(&bob.id).await.unwrap();
    assert_eq!(third.peer.multiaddrs.as_slice(), &[addr(1, 1), addr(1, 2), addr(1, 3)]);
}

#[tokio::test]
async fn push_replaces_addresses_and_keeps_identity() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let bob = spawn_node(&network, "bob", None);
    bob.local.set_listen_addrs(vec![addr(5, 1), addr(5, 2)]);

    // Each side learns the other supports push.
    alice.service.identify_peer(&bob.id).await.unwrap();
    bob.service.identify_peer(&alice.id).await.unwrap();

    bob.local.set_listen_addrs(vec![addr(6, 1), addr(6, 2)]);
    bob.local.set_protocols([PUSH_PROTOCOL]);
    let report = bob.service.push(&[alice.id]).await.unwrap();
    assert_eq!(report.delivered, vec![alice.id]);

    let directory = alice.directory.clone();
    let bob_id = bob.id;
    eventually(move || {
        directory
            .snapshot(&bob_id)
            .map(|r| r.multiaddrs.as_slice() == [addr(6, 1), addr(6, 2)])
            .unwrap_or(false)
    })
    .await;

    let record = alice.directory.snapshot(&bob.id).unwrap();
    assert_eq!(record.protocols.as_slice(), &[PUSH_PROTOCOL.to_string()]);
    assert_eq!(record.public_key.as_deref(), Some("bob".as_bytes()));
}

#[tokio::test]
async fn push_skips_peers_without_push_support() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let bob = spawn_node(&network, "bob", None);
    let carol = spawn_node(&network, "carol", None);
    carol.local.set_protocols([IDENTIFY_PROTOCOL]);

    bob.service.identify_peer(&alice.id).await.unwrap();
    bob.service.identify_peer(&carol.id).await.unwrap();

    let report = bob.service.push(&[alice.id, carol.id]).await.unwrap();
    assert_eq!(report.delivered, vec![alice.id]);
    assert_eq!(report.skipped, vec![carol.id]);
    assert_eq!(carol.dispatcher.stats().push, 0);
}

#[tokio::test]
async fn push_to_departed_peers_fails() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let bob = spawn_node(&network, "bob", None);
    bob.service.identify_peer(&alice.id).await.unwrap();

    network.disconnect(&alice.id);
    match bob.service.push(&[alice.id]).await {
        Err(IdentifyError::PushFailed(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].peer, alice.id);
            assert!(matches!(failures[0].error, TransportError::Unreachable(_)));
        }
        other => panic!("expected PushFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn truncated_response_is_malformed() {
    let alice = spawn_node(&MemoryNetwork::new(), "alice", None);
    let bob_id = PeerId::from_public_key(b"bob");
    let (alice_end, mut bob_end) = MemorySubstream::pair(
        &Endpoint::new(alice.id, None),
        &Endpoint::new(bob_id, None),
    );

    // public_key field claiming 32 bytes, carrying 3
    FrameCodec::default()
        .write_frame(&mut bob_end, &[0x0a, 0x20, 1, 2, 3])
        .await
        .unwrap();
    bob_end.shutdown().await.unwrap();

    assert!(matches!(
        alice.service.identify(alice_end, &bob_id).await,
        Err(IdentifyError::IdentifyFailed(IdentifyFailure::Malformed(_)))
    ));
    assert!(alice.directory.snapshot(&bob_id).is_none());
}

#[tokio::test]
async fn identity_change_is_rejected() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let bob = spawn_node(&network, "bob", None);
    alice.service.identify_peer(&bob.id).await.unwrap();

    // Mallory answers an identify stream that alice attributes to bob.
    let mallory = spawn_node(&network, "mallory", None);
    let (alice_end, mallory_end) = MemorySubstream::pair(
        &Endpoint::new(alice.id, None),
        &Endpoint::new(mallory.id, None),
    );
    mallory.local.set_listen_addrs(vec![addr(66, 6)]);
    mallory.service.respond(mallory_end).await.unwrap();

    let err = alice.service.identify(alice_end, &bob.id).await.unwrap_err();
    assert!(matches!(err, IdentifyError::IdentityMismatch { peer } if peer == bob.id));
    assert!(err.is_fatal());

    let record = alice.directory.snapshot(&bob.id).unwrap();
    assert_eq!(record.public_key.as_deref(), Some("bob".as_bytes()));
    assert!(!record.multiaddrs.contains(&addr(66, 6)));
}

#[tokio::test]
async fn unregistered_protocol_is_rejected() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let (_, mut stream) = MemorySubstream::pair(
        &Endpoint::new(PeerId::from_public_key(b"bob"), None),
        &Endpoint::new(alice.id, None),
    );
    stream.shutdown().await.unwrap();

    assert!(matches!(
        alice.dispatcher.dispatch("/meshsub/1.1.0", stream).await,
        Err(IdentifyError::UnregisteredProtocol(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identifies_against_many_peers() {
    let network = MemoryNetwork::new();
    let alice = spawn_node(&network, "alice", None);
    let peers: Vec<Node> = (0..8u8)
        .map(|i| {
            let node = spawn_node(&network, &format!("peer-{}", i), None);
            node.local.add_listen_addr(addr(20, i));
            node
        })
        .collect();

    let mut calls = tokio::task::JoinSet::new();
    for peer in &peers {
        let service = alice.service.clone();
        let id = peer.id;
        calls.spawn(async move { service.identify_peer(&id).await });
    }
    while let Some(result) = calls.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(alice.directory.len(), peers.len());
    for (i, peer) in peers.iter().enumerate() {
        let record = alice.directory.snapshot(&peer.id).unwrap();
        assert_eq!(record.multiaddrs.as_slice(), &[addr(20, i as u8)]);
    }
}
