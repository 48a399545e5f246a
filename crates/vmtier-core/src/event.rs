//! Alarm event validation and classification.
//!
//! vCenter forwards `AlarmStatusChangedEvent`s wrapped in a cloud event.
//! Only three fields matter here:
//!
//! ```text
//! { "Data": { "Vm": { "Vm": { "Type": .., "Value": .. } },
//!             "Alarm": { "Name": .. },
//!             "To": .. } }
//! ```
//!
//! Everything else in the event is ignored. Missing or `null` fields
//! deserialize to empty values and are rejected by validation rather than by the JSON
//! decoder, so the caller can tell "not JSON" from "not enough data".

use serde::{Deserialize, Deserializer};

use crate::error::{EventError, EventResult};
use crate::types::{AlarmNotification, ObjectRef, RED, ResourceCategory};

#[derive(Debug, Default, Deserialize)]
struct CloudEvent {
    #[serde(rename = "Data", default, deserialize_with = "null_as_default")]
    data: AlarmStatusChanged,
}

#[derive(Debug, Default, Deserialize)]
struct AlarmStatusChanged {
    #[serde(rename = "Vm", default)]
    vm: Option<VmEventArgument>,
    #[serde(rename = "Alarm", default, deserialize_with = "null_as_default")]
    alarm: AlarmEventArgument,
    #[serde(rename = "To", default, deserialize_with = "null_as_default")]
    to: String,
}

#[derive(Debug, Deserialize)]
struct VmEventArgument {
    #[serde(rename = "Vm")]
    vm: Option<ObjectRef>,
}

#[derive(Debug, Default, Deserialize)]
struct AlarmEventArgument {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    name: String,
}

/// Read an explicit JSON `null` as the type's zero value, like an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse and sanity-check a raw invocation payload.
pub fn validate(payload: &[u8]) -> EventResult<AlarmNotification> {
    let event = serde_json::from_slice::<Option<CloudEvent>>(payload)?.unwrap_or_default();
    let data = event.data;

    let vm = data
        .vm
        .and_then(|arg| arg.vm)
        .filter(|moref| !moref.value.is_empty())
        .ok_or(EventError::IncompleteEvent("empty VM managed object reference"))?;

    if data.alarm.name.is_empty() || data.to.is_empty() {
        return Err(EventError::IncompleteEvent("insufficient alarm information"));
    }

    Ok(AlarmNotification {
        vm,
        alarm_name: data.alarm.name,
        to: data.to,
    })
}

/// Resource category of the alarm that raised this notification.
pub fn classify(notification: &AlarmNotification) -> ResourceCategory {
    ResourceCategory::from_alarm_name(&notification.alarm_name)
}

/// Whether the notification asks for a new tier: a recognised
/// CPU/memory alarm that just went red.
pub fn is_actionable(notification: &AlarmNotification) -> bool {
    notification.to == RED && classify(notification) != ResourceCategory::Unclassified
}
