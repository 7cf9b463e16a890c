//! Desired CPU and memory sizing for a virtual machine.

use serde::{Deserialize, Serialize};

/// Hardware parameters applied by the hardware step.
///
/// Every field is optional in the config file and defaults to zero/false,
/// which means "leave unchanged" (sizes) or "unset" (reservations, limits).
/// Key names match the user-facing config keys (`CPUs`, `RAM`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Number of virtual CPUs.
    #[serde(rename = "CPUs")]
    pub cpus: i32,
    /// Guaranteed CPU allocation in MHz.
    #[serde(rename = "CPU_reservation")]
    pub cpu_reservation: i64,
    /// Maximum CPU allocation in MHz.
    #[serde(rename = "CPU_limit")]
    pub cpu_limit: i64,
    /// Memory size in MB.
    #[serde(rename = "RAM")]
    pub ram: i64,
    /// Guaranteed memory allocation in MB.
    #[serde(rename = "RAM_reservation")]
    pub ram_reservation: i64,
    /// Reserve all configured memory at all times.
    #[serde(rename = "RAM_reserve_all")]
    pub ram_reserve_all: bool,
}

impl HardwareConfig {
    /// True when no hardware customization was requested at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check internal consistency. Returns one message per violation.
    ///
    /// - `RAM_reservation` and `RAM_reserve_all` are mutually exclusive
    /// - numeric fields must not be negative
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.ram_reservation > 0 && self.ram_reserve_all {
            errors.push("'RAM_reservation' and 'RAM_reserve_all' cannot be used together".to_string());
        }

        let fields = [
            ("CPUs", i64::from(self.cpus)),
            ("CPU_reservation", self.cpu_reservation),
            ("CPU_limit", self.cpu_limit),
            ("RAM", self.ram),
            ("RAM_reservation", self.ram_reservation),
        ];
        for (name, value) in fields {
            if value < 0 {
                errors.push(format!("'{name}' must be >= 0 (got {value})"));
            }
        }

        errors
    }
}
