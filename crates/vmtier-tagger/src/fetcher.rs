//! Configuration fetcher: current hardware of the alarmed VM.

use tracing::debug;

use vmtier_core::{ObjectRef, VmHardware};
use vmtier_directory::Session;

use crate::error::FetchError;

/// Retrieve the hardware snapshot of exactly one VM.
///
/// A record without configuration (deleted VM, placeholder) is reported as
/// `ConfigUnavailable`, not as a zeroed snapshot.
pub async fn fetch_hardware(session: &Session, vm: &ObjectRef) -> Result<VmHardware, FetchError> {
    let hardware = session
        .directory()
        .vm_hardware(vm)
        .await?
        .ok_or_else(|| FetchError::ConfigUnavailable(vm.value.clone()))?;

    debug!(
        vm = %vm,
        num_cpu = hardware.num_cpu,
        memory_mb = hardware.memory_mb,
        "fetched vm hardware"
    );
    Ok(hardware)
}
