use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::base::{BaseStation, ReportRecord};
use crate::config::Config;

use beaconmesh_core::{DutyCycleScheduler, IndicatorState, Role};
use beaconmesh_network::{Position, SimulatedAir, SimulatedRadio};
use beaconmesh_protocol::{LinkAddress, NodeId};

/// Address the base station listens from
const BASE_STATION_ADDRESS: LinkAddress = LinkAddress::from_bytes([0xC0, 0, 0, 0, 0xBA, 0x5E]);

/// Simulated radio address of a mesh node
pub fn node_address(id: NodeId) -> LinkAddress {
    LinkAddress::from_bytes([0xC0, 0, 0, 0, 0, id.as_u8()])
}

struct MeshNode {
    scheduler: DutyCycleScheduler<SimulatedRadio>,
    start_at: u64,
}

/// Runs the local node, its simulated peers and the base station
pub struct Node {
    config: Config,
    air: SimulatedAir,
    nodes: Vec<MeshNode>,
    base: Option<BaseStation<SimulatedRadio>>,
    now: u64,
    indicator: IndicatorState,
}

impl Node {
    pub fn new(config: Config) -> Result<Self> {
        info!("Initializing mesh...");

        let air = SimulatedAir::new(config.simulation.propagation.clone());

        for beacon in &config.simulation.beacons {
            air.add_beacon(beacon.address, beacon.position, &beacon.name)
                .with_context(|| format!("Failed to place beacon {}", beacon.name))?;
        }
        info!("✓ {} beacons placed", air.beacon_count());

        let mut nodes = Vec::with_capacity(config.simulation.peers.len() + 1);
        nodes.push(Self::spawn(
            &air,
            &config,
            config.node.id,
            config.node.role,
            config.node.position,
            0,
        )?);
        for peer in &config.simulation.peers {
            let mut node = Self::spawn(&air, &config, peer.id, peer.role, peer.position, peer.start_at)?;
            if peer.role == Role::Mobile {
                node.scheduler.set_motion(peer.speed, peer.direction);
            }
            nodes.push(node);
        }
        info!("✓ {} mesh nodes attached", nodes.len());

        let base = match config.simulation.base_station {
            Some(position) => {
                let radio = air
                    .attach(BASE_STATION_ADDRESS, position)
                    .context("Failed to attach base station")?;
                let base = BaseStation::new(radio, config.beacons.clone())?;
                info!("✓ Base station listening at ({:.1}, {:.1})", position.x, position.y);
                Some(base)
            }
            None => {
                info!("Base station disabled");
                None
            }
        };

        Ok(Self {
            config,
            air,
            nodes,
            base,
            now: 0,
            indicator: IndicatorState::Off,
        })
    }

    fn spawn(
        air: &SimulatedAir,
        config: &Config,
        id: NodeId,
        role: Role,
        position: Position,
        start_at: u64,
    ) -> Result<MeshNode> {
        let radio = air
            .attach(node_address(id), position)
            .with_context(|| format!("Failed to attach node {}", id))?;
        Ok(MeshNode {
            scheduler: DutyCycleScheduler::new(config.mesh_node(id, role), radio),
            start_at,
        })
    }

    /// Advance the whole mesh by one tick period
    ///
    /// Returns the reports the base station decoded during this tick.
    pub fn step(&mut self) -> Result<Vec<ReportRecord>> {
        let now = self.now;

        for node in &mut self.nodes {
            let scheduler = &mut node.scheduler;
            if !scheduler.is_started() {
                if now < node.start_at {
                    continue;
                }
                scheduler
                    .start(now)
                    .with_context(|| format!("Node {} failed to boot", scheduler.node_id()))?;
            }
            scheduler.tick(now);
        }

        let delivered = self.air.step();
        debug!("t={} delivered {} frames", now, delivered);

        self.update_indicator();
        self.now += self.config.timing.tick_period;

        Ok(self.base.as_mut().map(|base| base.poll()).unwrap_or_default())
    }

    fn update_indicator(&mut self) {
        let local = &self.nodes[0].scheduler;
        let indicator = local.indicator();
        if indicator != self.indicator {
            if indicator == IndicatorState::Steady {
                warn!("{}: peer too close", self.config.node.name);
            } else if self.indicator == IndicatorState::Steady {
                info!("{}: proximity alarm cleared", self.config.node.name);
            }
            debug!("{} indicator {:?} -> {:?}", self.config.node.name, self.indicator, indicator);
            self.indicator = indicator;
        }
    }

    /// Run until Ctrl-C or the configured duration, writing base station
    /// reports to `out` as JSON lines
    pub async fn run<W: Write>(&mut self, mut out: W) -> Result<()> {
        let period = self.tick_interval();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("═══════════════════════════════════════════════");
        info!("  BeaconNode is now running");
        info!("═══════════════════════════════════════════════");
        info!("  Node: {} (id {}, {})", self.config.node.name, self.config.node.id, self.config.node.role);
        info!(
            "  Mesh: {} nodes, {} radios, {} beacons",
            self.nodes.len(),
            self.air.radio_count(),
            self.air.beacon_count()
        );
        if let Some(duration) = self.config.simulation.duration {
            info!("  Duration: {} time units", duration);
        }
        info!("═══════════════════════════════════════════════");

        loop {
            if let Some(duration) = self.config.simulation.duration {
                if self.now > duration {
                    info!("Reached configured duration");
                    break;
                }
            }

            tokio::select! {
                _ = ticker.tick() => {
                    for record in self.step()? {
                        record.write_line(&mut out)?;
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C signal");
                    break;
                }
            }
        }

        out.flush().context("Failed to flush report output")?;
        self.log_summary();
        Ok(())
    }

    fn tick_interval(&self) -> Duration {
        let micros = self.config.timing.tick_period * 1000 / u64::from(self.config.simulation.speedup);
        Duration::from_micros(micros.max(1))
    }

    fn log_summary(&self) {
        info!("Shutting down at t={}", self.now);
        for node in &self.nodes {
            let scheduler = &node.scheduler;
            let stats = scheduler.stats();
            info!(
                "  node {} ({}): {} frames, {} discarded, {} decode errors, {} radio failures",
                scheduler.node_id(),
                scheduler.role(),
                stats.frames_processed,
                stats.frames_discarded,
                stats.decode_errors,
                stats.radio_failures
            );
            if let Some(relay) = scheduler.relay_stats() {
                info!(
                    "    relayed: {} forwarded, {} originated, {} self-loop, {} expired",
                    relay.forwarded, relay.originated, relay.dropped_self_loop, relay.dropped_ttl
                );
            }
        }
        if let Some(base) = &self.base {
            let stats = base.stats();
            info!(
                "  base station: {} reports, {} duplicates, {} frames",
                stats.reports, stats.duplicates, stats.frames
            );
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn air(&self) -> &SimulatedAir {
        &self.air
    }

    /// Scheduler of node `id`
    pub fn scheduler(&self, id: NodeId) -> Option<&DutyCycleScheduler<SimulatedRadio>> {
        self.nodes
            .iter()
            .map(|node| &node.scheduler)
            .find(|scheduler| scheduler.node_id() == id)
    }

    pub fn indicator(&self) -> IndicatorState {
        self.indicator
    }
}
