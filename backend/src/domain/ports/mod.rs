//! Domain ports: driven persistence contracts and the driving contracts
//! inbound adapters call.

mod macros;
pub(crate) use macros::define_port_error;

mod detection_ledger;
mod device_authentication;
mod device_log_repository;
mod device_repository;
mod point_ledger;
mod redemption_repository;
mod school_id_repository;
mod telemetry_command;
mod telemetry_query;
mod user_profile_repository;

#[cfg(test)]
pub use detection_ledger::MockDetectionLedger;
pub use detection_ledger::{
    DetectionCommit, DetectionLedger, DetectionLedgerError, FixtureDetectionLedger,
    PlasticDetection,
};
#[cfg(test)]
pub use device_authentication::MockDeviceAuthentication;
pub use device_authentication::{DeviceAuthentication, FixtureDeviceAuthentication};
#[cfg(test)]
pub use device_log_repository::MockDeviceLogRepository;
pub use device_log_repository::{
    DeviceLogRepository, DeviceLogRepositoryError, FixtureDeviceLogRepository,
};
#[cfg(test)]
pub use device_repository::MockDeviceRepository;
pub use device_repository::{
    DeviceCredential, DeviceRepository, DeviceRepositoryError, FixtureDeviceRepository, NewDevice,
};
#[cfg(test)]
pub use point_ledger::MockPointLedger;
pub use point_ledger::{FixturePointLedger, PointLedger, PointLedgerError};
#[cfg(test)]
pub use redemption_repository::MockRedemptionRepository;
pub use redemption_repository::{
    FixtureRedemptionRepository, RedemptionRepository, RedemptionRepositoryError,
};
#[cfg(test)]
pub use school_id_repository::MockSchoolIdRepository;
pub use school_id_repository::{
    FixtureSchoolIdRepository, SchoolIdRepository, SchoolIdRepositoryError,
};
#[cfg(test)]
pub use telemetry_command::MockTelemetryCommand;
pub use telemetry_command::{FixtureTelemetryCommand, TelemetryCommand};
#[cfg(test)]
pub use telemetry_query::MockTelemetryQuery;
pub use telemetry_query::{FixtureTelemetryQuery, TelemetryQuery};
#[cfg(test)]
pub use user_profile_repository::MockUserProfileRepository;
pub use user_profile_repository::{
    FixtureUserProfileRepository, UserProfileRepository, UserProfileRepositoryError,
};
