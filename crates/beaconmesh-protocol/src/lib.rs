//! BeaconMesh Protocol Module
//!
//! Wire records, advertising data framing and the advertisement classifier
//! shared by mobile tags, relay nodes and the base station.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod types;

pub use codec::{Advertisement, AdvertisementCodec, BeaconDirectory, CodecConfig};
pub use error::{ProtocolError, Result};
pub use frame::{encode_advertisement, encode_name_advertisement};
pub use message::{MobileReport, Payload, RelayReport, ReportTag};
pub use types::{BeaconReading, LinkAddress, NodeId};
