#![no_main]

use beaconmesh_protocol::{Advertisement, AdvertisementCodec, LinkAddress, MobileReport, RelayReport};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary advertising data must never panic the classifier
    let codec = AdvertisementCodec::default();
    match codec.classify_and_decode(&LinkAddress::default(), -60, data) {
        Ok(Advertisement::MobileReport(report)) => {
            assert_eq!(MobileReport::from_bytes(&report.to_bytes()), Ok(report));
        }
        Ok(Advertisement::RelayReport(report)) => {
            assert_eq!(RelayReport::from_bytes(&report.to_bytes()), Ok(report));
        }
        _ => {}
    }
});
