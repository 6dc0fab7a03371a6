use std::sync::Arc;

use anyhow::Context;
use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use tokio::time::{sleep, timeout, Duration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ident_core::{Dispatcher, IdentifyConfig, IdentifyService, InMemoryDirectory, LocalPeer, PeerDirectory};
use ident_proto::consts::{IDENTIFY_PROTOCOL, PUSH_PROTOCOL};
use ident_proto::{Multiaddr, PeerId};
use ident_transport::{Endpoint, MemoryNetwork};

struct Node {
    name: &'static str,
    local: Arc<LocalPeer>,
    directory: Arc<InMemoryDirectory>,
    service: Arc<IdentifyService>,
}

/// Binary multiaddr for /ip4/<ip>/tcp/<port>.
fn tcp_addr(ip: [u8; 4], port: u16) -> anyhow::Result<Multiaddr> {
    let mut bytes = vec![0x04];
    bytes.extend_from_slice(&ip);
    bytes.push(0x06);
    bytes.extend_from_slice(&port.to_be_bytes());
    Multiaddr::new(bytes).context("empty address")
}

fn start_node(
    network: &Arc<MemoryNetwork>,
    config: &IdentifyConfig,
    name: &'static str,
    addr: Multiaddr,
) -> Node {
    let key = SigningKey::generate(&mut OsRng);
    let local = Arc::new(LocalPeer::new(key.verifying_key().to_bytes().to_vec()));
    local.add_listen_addr(addr.clone());

    let directory = Arc::new(InMemoryDirectory::new());
    let (transport, incoming) =
        network.listen(Endpoint::new(local.id(), Some(addr)), &[IDENTIFY_PROTOCOL, PUSH_PROTOCOL]);
    let service = Arc::new(IdentifyService::new(
        config.clone(),
        local.clone(),
        directory.clone(),
        Arc::new(transport),
    ));

    let dispatcher = Arc::new(Dispatcher::new(service.clone()));
    local.set_protocols(dispatcher.protocols());
    tokio::spawn(dispatcher.run(incoming));

    info!(node = name, peer = %local.id().short(), "node started");
    Node {
        name,
        local,
        directory,
        service,
    }
}

async fn identify(from: &Node, to: &Node) -> anyhow::Result<()> {
    let outcome = from
        .service
        .identify_peer(&to.local.id())
        .await
        .with_context(|| format!("{} failed to identify {}", from.name, to.name))?;

    info!(
        node = from.name,
        remote = to.name,
        agent = outcome.agent_version.as_deref().unwrap_or("-"),
        addrs = outcome.peer.multiaddrs.len(),
        protocols = ?outcome.peer.protocols.as_slice(),
        observed = ?outcome.observed_addr,
        "identify complete"
    );
    Ok(())
}

/// Poll until `node` holds `expected` as the whole address set of `peer`.
async fn wait_for_addrs(node: &Node, peer: &PeerId, expected: &[Multiaddr]) -> anyhow::Result<()> {
    timeout(Duration::from_secs(5), async {
        loop {
            let current = node.directory.snapshot(peer);
            if current.map(|r| r.multiaddrs.as_slice() == expected).unwrap_or(false) {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .context("push was not applied in time")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IdentifyConfig::load()?;
    info!(
        protocol_version = %config.protocol_version,
        agent_version = %config.agent_version,
        "loaded identify configuration"
    );

    let network = MemoryNetwork::new();
    let alice = start_node(&network, &config, "alice", tcp_addr([127, 0, 0, 1], 4001)?);
    let bob = start_node(&network, &config, "bob", tcp_addr([127, 0, 0, 1], 4002)?);

    identify(&alice, &bob).await?;
    identify(&bob, &alice).await?;

    // Bob moves to a new address and tells everyone it knows about.
    let moved = tcp_addr([192, 168, 1, 20], 4002)?;
    bob.local.set_listen_addrs([moved.clone()]);
    let report = bob.service.push(&bob.directory.peer_ids()).await?;
    info!(delivered = report.delivered.len(), skipped = report.skipped.len(), "push sent");

    wait_for_addrs(&alice, &bob.local.id(), &[moved]).await?;
    let record = alice
        .directory
        .snapshot(&bob.local.id())
        .context("alice lost bob's record")?;
    info!(
        peer = %record.id.short(),
        key = %hex::encode(record.public_key.as_deref().unwrap_or_default()),
        addrs = ?record.multiaddrs.as_slice(),
        "alice's view of bob after push"
    );

    Ok(())
}
