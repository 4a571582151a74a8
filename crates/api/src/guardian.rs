// Path: crates/api/src/guardian.rs
//! The guardian capability consumed to authorize privileged operations.

use crate::state::StateAccess;
use meridian_types::app::guardian::Profiler;
use meridian_types::app::AccountId;
use meridian_types::error::StateError;

/// Read access to the profiler registry.
///
/// The service engine consults this to grant super-mode (fee exemption) to
/// privileged consumers; the oracle module consults it to gate feed creation.
pub trait GuardianKeeper: Send + Sync {
    /// Returns the profiler record for an address, or `None` if the address
    /// holds no privilege.
    fn get_profiler(
        &self,
        state: &dyn StateAccess,
        address: &AccountId,
    ) -> Result<Option<Profiler>, StateError>;
}
