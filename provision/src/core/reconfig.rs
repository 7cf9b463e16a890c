//! Reconfiguration request sent to the management API.
//!
//! Field names mirror the hypervisor's VM config spec. The translation from
//! [`HardwareConfig`] is verbatim: zero values are sent as zero and the remote
//! side treats an all-zero allocation as "no change" for that dimension.

use crate::core::hardware::HardwareConfig;

/// Reservation and limit for one resource dimension (CPU in MHz, memory in MB).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceAllocation {
    pub reservation: i64,
    /// `None` leaves the remote limit untouched.
    pub limit: Option<i64>,
}

/// Desired VM configuration change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconfigSpec {
    pub num_cpus: i32,
    pub memory_mb: i64,
    pub cpu_allocation: ResourceAllocation,
    pub memory_allocation: ResourceAllocation,
    pub memory_reservation_locked_to_max: bool,
}

impl ReconfigSpec {
    /// Build the request for a validated hardware config.
    pub fn from_hardware(hw: &HardwareConfig) -> Self {
        Self {
            num_cpus: hw.cpus,
            memory_mb: hw.ram,
            cpu_allocation: ResourceAllocation {
                reservation: hw.cpu_reservation,
                limit: Some(hw.cpu_limit),
            },
            // Memory limits are never set by this request.
            memory_allocation: ResourceAllocation {
                reservation: hw.ram_reservation,
                limit: None,
            },
            memory_reservation_locked_to_max: hw.ram_reserve_all,
        }
    }
}
