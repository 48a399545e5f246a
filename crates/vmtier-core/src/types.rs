//! Shared types used across vmtier crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Alarm name raised by vCenter when a VM crosses its CPU threshold.
pub const CPU_ALARM: &str = "VM CPU Usage";

/// Alarm name raised by vCenter when a VM crosses its memory threshold.
pub const MEMORY_ALARM: &str = "VM Memory Usage";

/// Alarm level that makes a notification actionable.
pub const RED: &str = "red";

/// Managed object type for virtual machines.
pub const VIRTUAL_MACHINE: &str = "VirtualMachine";

/// Reference to a managed entity in the directory: `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(rename = "Type", default, deserialize_with = "crate::event::null_as_default")]
    pub kind: String,
    #[serde(rename = "Value", default, deserialize_with = "crate::event::null_as_default")]
    pub value: String,
}

impl ObjectRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Shorthand for a `VirtualMachine` reference.
    pub fn vm(value: impl Into<String>) -> Self {
        Self::new(VIRTUAL_MACHINE, value)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// A validated alarm status change for a single VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmNotification {
    pub vm: ObjectRef,
    pub alarm_name: String,
    /// New alarm level, e.g. "red" or "green".
    pub to: String,
}

/// Resource a recognised alarm is about.
///
/// Each category maps to a tag category in the directory whose tag names
/// are tier values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    Cpu,
    Memory,
    Unclassified,
}

impl ResourceCategory {
    /// Map an alarm name onto a resource category.
    pub fn from_alarm_name(name: &str) -> Self {
        match name {
            CPU_ALARM => ResourceCategory::Cpu,
            MEMORY_ALARM => ResourceCategory::Memory,
            _ => ResourceCategory::Unclassified,
        }
    }

    /// Canonical name of the tag category holding this resource's tiers.
    pub fn tag_category(&self) -> Option<&'static str> {
        match self {
            ResourceCategory::Cpu => Some("config.hardware.numCPU"),
            ResourceCategory::Memory => Some("config.hardware.memoryMB"),
            ResourceCategory::Unclassified => None,
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceCategory::Cpu => f.write_str("cpu"),
            ResourceCategory::Memory => f.write_str("memory"),
            ResourceCategory::Unclassified => f.write_str("unclassified"),
        }
    }
}

/// Current hardware configuration of a VM, as far as tiering cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmHardware {
    pub num_cpu: u32,
    pub memory_mb: u64,
}

/// Name of a target capacity tier, e.g. `"4"` CPUs or `"8192"` MB.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierName(String);

impl TierName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tag in the directory's label taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub category_id: String,
}
