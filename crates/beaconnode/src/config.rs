use anyhow::{Context, Result};
use beaconmesh_core::{DutyCycleTiming, NodeConfig as MeshNodeConfig, ProximityConfig, Role};
use beaconmesh_network::{Position, PropagationConfig};
use beaconmesh_protocol::{BeaconDirectory, CodecConfig, LinkAddress, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub timing: DutyCycleTiming,
    #[serde(default)]
    pub proximity: ProximityConfig,
    #[serde(default)]
    pub beacons: CodecConfig,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(skip)]
    config_file_path: PathBuf,
}

/// The node whose indicator this process presents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub position: Position,
}

/// One additional node in the simulated mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: NodeId,
    pub role: Role,
    pub position: Position,
    /// Time the node boots at, so peers do not all share one phase
    #[serde(default)]
    pub start_at: u64,
    /// Mobile only
    #[serde(default)]
    pub speed: i8,
    /// Mobile only
    #[serde(default)]
    pub direction: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconPlacement {
    pub address: LinkAddress,
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
    #[serde(default)]
    pub beacons: Vec<BeaconPlacement>,
    /// Base station listener position; no listener when unset
    #[serde(default)]
    pub base_station: Option<Position>,
    /// Simulated time to run for; until Ctrl-C when unset
    #[serde(default)]
    pub duration: Option<u64>,
    /// Simulated time units per wall-clock millisecond
    #[serde(default = "default_speedup")]
    pub speedup: u32,
}

fn default_speedup() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(Self::default_config_path);

        if !config_path.exists() {
            anyhow::bail!(
                "Configuration file not found: {}\nRun with --init to create a new configuration",
                config_path.display()
            );
        }

        let contents =
            fs::read_to_string(&config_path).context("Failed to read configuration file")?;

        let mut config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse configuration file")?;
        config.config_file_path = config_path;
        config.validate()?;

        Ok(config)
    }

    /// Write the demo deployment: one mobile tag, two relays in a line and
    /// a base station past the far relay
    pub fn create_default(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(Self::default_config_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut directory = BeaconDirectory::new();
        directory.insert([0xDE, 0xAD, 0x01], b'Q');

        let config = Config {
            node: NodeConfig {
                id: NodeId::new(1),
                role: Role::Mobile,
                name: "beacon-tag-1".to_string(),
                position: Position::new(0.0, 0.0),
            },
            timing: DutyCycleTiming::default(),
            proximity: ProximityConfig::default(),
            beacons: CodecConfig {
                directory,
                ..Default::default()
            },
            simulation: SimulationConfig {
                propagation: PropagationConfig::default().with_sensitivity(-80.0),
                peers: vec![
                    PeerConfig {
                        id: NodeId::new(5),
                        role: Role::Relay,
                        position: Position::new(6.0, 0.0),
                        start_at: 0,
                        speed: 0,
                        direction: 0,
                    },
                    PeerConfig {
                        id: NodeId::new(6),
                        role: Role::Relay,
                        position: Position::new(14.0, 0.0),
                        start_at: 100,
                        speed: 0,
                        direction: 0,
                    },
                ],
                beacons: vec![
                    BeaconPlacement {
                        address: LinkAddress::from_bytes([0xB0, 0, 0, 0, 0, 0x01]),
                        name: "BCN--A".to_string(),
                        position: Position::new(0.0, 2.0),
                    },
                    BeaconPlacement {
                        address: LinkAddress::from_bytes([0xB0, 0, 0, 0, 0, 0x02]),
                        name: "BCN--B".to_string(),
                        position: Position::new(2.0, -2.0),
                    },
                    BeaconPlacement {
                        address: LinkAddress::from_bytes([0xC0, 0x11, 0x22, 0xDE, 0xAD, 0x01]),
                        name: "KBPro_Q".to_string(),
                        position: Position::new(-2.0, 0.0),
                    },
                ],
                base_station: Some(Position::new(22.0, 0.0)),
                duration: None,
                speedup: 1,
            },
            logging: LoggingConfig::default(),
            config_file_path: config_path.clone(),
        };

        let yaml = serde_yaml::to_string(&config)?;
        fs::write(&config_path, yaml)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        Ok(config)
    }

    /// Reject deployments the mesh cannot run
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        ids.insert(self.node.id);
        for peer in &self.simulation.peers {
            if !ids.insert(peer.id) {
                anyhow::bail!("Duplicate node id {} in configuration", peer.id);
            }
        }

        let mut addresses = HashSet::new();
        for beacon in &self.simulation.beacons {
            if !addresses.insert(beacon.address) {
                anyhow::bail!("Duplicate beacon address {}", beacon.address);
            }
        }

        if self.timing.tick_period == 0 {
            anyhow::bail!("timing.tick_period must be positive");
        }
        if self.simulation.speedup == 0 {
            anyhow::bail!("simulation.speedup must be positive");
        }

        Ok(())
    }

    /// Per-node scheduler configuration for `id` in `role`
    pub fn mesh_node(&self, id: NodeId, role: Role) -> MeshNodeConfig {
        MeshNodeConfig {
            node_id: id,
            role,
            timing: self.timing.clone(),
            proximity: self.proximity.clone(),
            codec: self.beacons.clone(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_file_path
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("beaconnode")
            .join("config.yaml")
    }
}
