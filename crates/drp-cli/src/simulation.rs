//! In-process multi-peer run of one `AddWinsSet<u64>` object.
//!
//! Every peer is a tokio task that owns its replica. Local calls are pushed
//! to the other peers through a subscription, then a full anti-entropy
//! exchange closes any gaps left by out-of-order delivery. An optional
//! finality round follows.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Barrier;
use tracing::{debug, info, warn};

use drp_acl::{AclOptions, ObjectAcl};
use drp_blueprints::{AddWinsSet, SetOp};
use drp_crypto::Keychain;
use drp_object::{DrpObject, ObjectOptions, ORIGIN_CALL};
use drp_types::{Attestation, PeerId, Vertex, VertexHash};

use crate::config::SimulationConfig;

type Replica = DrpObject<AddWinsSet<u64>>;

#[derive(Clone)]
enum Gossip {
    Vertices(Vec<Vertex>),
    Attestations {
        from: PeerId,
        attestations: Vec<Attestation>,
    },
}

#[derive(Debug, Serialize)]
pub struct PeerReport {
    pub peer: PeerId,
    pub vertices: usize,
    pub frontier: Vec<String>,
    pub values: Vec<u64>,
    /// Vertices that could not be merged on first delivery.
    pub deferred: usize,
    pub finalized: usize,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub converged: bool,
    pub peers: Vec<PeerReport>,
}

struct Peer {
    object: Replica,
    inbox: UnboundedReceiver<Gossip>,
    others: Vec<UnboundedSender<Gossip>>,
    barrier: Arc<Barrier>,
    rng: StdRng,
    deferred: usize,
}

fn peer_name(index: usize) -> String {
    format!("peer-{index}")
}

fn peer_keychain(seed: u64, index: usize) -> anyhow::Result<Keychain> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
    Keychain::from_seed(rng.gen()).context("deriving peer keychain")
}

/// Push `message` to every inbox. A closed inbox only means that peer
/// already finished, so the message is dropped.
fn send_all(inboxes: &[UnboundedSender<Gossip>], message: &Gossip) {
    for tx in inboxes {
        if tx.send(message.clone()).is_err() {
            debug!("peer inbox closed, dropping gossip");
        }
    }
}

pub async fn run(config: SimulationConfig) -> anyhow::Result<SimulationReport> {
    let started_at = Utc::now();
    let keychains = (0..config.peers)
        .map(|i| peer_keychain(config.seed, i))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut options = AclOptions::default();
    for (i, keychain) in keychains.iter().enumerate() {
        options
            .admins
            .insert(PeerId::new(peer_name(i)), keychain.public_credential());
    }
    let acl = ObjectAcl::new(options);

    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..config.peers).map(|_| unbounded_channel()).unzip();
    let barrier = Arc::new(Barrier::new(config.peers));
    let object_id = format!("simulation-{}", config.seed);

    let mut handles = Vec::with_capacity(config.peers);
    for (i, (keychain, inbox)) in keychains.into_iter().zip(receivers).enumerate() {
        let mut object = DrpObject::new(
            ObjectOptions::new(peer_name(i))
                .with_keychain(keychain)
                .with_acl(acl.clone())
                .with_drp(AddWinsSet::new())
                .with_id(object_id.clone())
                .with_config(config.object.clone()),
        )?;

        let others: Vec<_> = senders
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, tx)| tx.clone())
            .collect();
        let push = others.clone();
        object.subscribe(move |_, origin, vertices| {
            if origin == ORIGIN_CALL {
                send_all(&push, &Gossip::Vertices(vertices.to_vec()));
            }
        });

        let peer = Peer {
            object,
            inbox,
            others,
            barrier: Arc::clone(&barrier),
            rng: StdRng::seed_from_u64(config.seed ^ (i as u64).rotate_left(32)),
            deferred: 0,
        };
        handles.push(tokio::spawn(peer.run(config.clone())));
    }
    drop(senders);

    let mut peers = Vec::with_capacity(handles.len());
    for handle in handles {
        peers.push(handle.await.context("peer task panicked")??);
    }

    let converged = peers
        .windows(2)
        .all(|w| w[0].frontier == w[1].frontier && w[0].values == w[1].values);
    let elapsed_ms = (Utc::now() - started_at).num_milliseconds();
    info!(peers = peers.len(), converged, elapsed_ms, "simulation finished");

    Ok(SimulationReport {
        started_at,
        elapsed_ms,
        converged,
        peers,
    })
}

impl Peer {
    async fn run(mut self, config: SimulationConfig) -> anyhow::Result<PeerReport> {
        for _ in 0..config.ops {
            let value = self.rng.gen_range(0..config.value_range);
            let op = if self.rng.gen_bool(config.remove_ratio) {
                SetOp::Remove(value)
            } else {
                SetOp::Add(value)
            };
            self.object.call(op)?;
            self.drain()?;
            tokio::task::yield_now().await;
        }
        self.barrier.wait().await;

        // Anti-entropy: everyone ships its full history once.
        self.broadcast(Gossip::Vertices(self.object.vertices().to_vec()));
        self.barrier.wait().await;
        self.drain()?;
        self.barrier.wait().await;

        if config.finality {
            let hashes = self.non_root_hashes();
            let attestations = self.object.sign_finality(&hashes)?;
            self.broadcast(Gossip::Attestations {
                from: self.object.peer_id().clone(),
                attestations,
            });
            self.barrier.wait().await;
            self.drain()?;
        }

        Ok(self.report())
    }

    fn broadcast(&self, message: Gossip) {
        send_all(&self.others, &message);
    }

    /// Merge everything queued so far as one batch, then count attestations.
    fn drain(&mut self) -> anyhow::Result<()> {
        let mut batch = Vec::new();
        let mut attestations = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            match message {
                Gossip::Vertices(vertices) => batch.extend(vertices),
                Gossip::Attestations { from, attestations: a } => attestations.push((from, a)),
            }
        }

        if !batch.is_empty() {
            let (ok, missing) = self
                .object
                .merge(&batch)
                .context("merging gossiped vertices")?;
            if !ok {
                debug!(missing = missing.len(), "deferring vertices until anti-entropy");
                self.deferred += missing.len();
            }
        }
        for (from, a) in attestations {
            let errors = self.object.add_signatures(&from, &a);
            if !errors.is_empty() {
                warn!(%from, rejected = errors.len(), "rejected attestations");
            }
        }
        Ok(())
    }

    fn non_root_hashes(&self) -> Vec<VertexHash> {
        self.object
            .vertices()
            .iter()
            .filter(|v| !v.is_root())
            .map(|v| v.hash)
            .collect()
    }

    fn report(&self) -> PeerReport {
        let finalized = self
            .non_root_hashes()
            .iter()
            .filter(|h| self.object.is_finalized(h) == Some(true))
            .count();
        PeerReport {
            peer: self.object.peer_id().clone(),
            vertices: self.object.vertices().len(),
            frontier: self.object.frontier().iter().map(|h| h.to_hex()).collect(),
            values: self
                .object
                .drp()
                .map(|set| set.values().into_iter().copied().collect())
                .unwrap_or_default(),
            deferred: self.deferred,
            finalized,
        }
    }
}
