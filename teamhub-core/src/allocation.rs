//! Which equipment holders are coming to an event, and which are not.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::error;

use crate::custody::TrackedEquipment;
use crate::equipment::Equipment;
use crate::event::Event;
use crate::participation::{ParticipationType, Participations};

/// Equipment needed for one event, grouped by current holder.
///
/// `ok` holders are coming and get a "please bring" reminder. `ng`
/// holders are absent or have not answered, so their items need to be
/// handed over or flagged.
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentAllocation {
    pub event: Event,
    pub ok: BTreeMap<String, Vec<Equipment>>,
    pub ng: BTreeMap<String, Vec<Equipment>>,
    /// Eligible items nobody has ever reported holding.
    pub unmanaged: Vec<Equipment>,
}

impl EquipmentAllocation {
    pub fn is_empty(&self) -> bool {
        self.ok.is_empty() && self.ng.is_empty()
    }
}

/// Partition the event's eligible equipment by whether its holder attends.
///
/// Ineligible items are dropped. Unmanaged items (no custody record) go
/// to neither side; they are logged and listed in `unmanaged`.
pub fn plan(
    event: &Event,
    equipment: &[TrackedEquipment],
    participations: &Participations,
) -> EquipmentAllocation {
    let mut alloc = EquipmentAllocation {
        event: event.clone(),
        ok: BTreeMap::new(),
        ng: BTreeMap::new(),
        unmanaged: Vec::new(),
    };

    for item in equipment {
        if !item.equipment.should_bring_for(event) {
            continue;
        }
        let Some(holder) = item.current_holder() else {
            error!(equipment = item.equipment.id, name = %item.equipment.name, "nobody manages this equipment");
            alloc.unmanaged.push(item.equipment.clone());
            continue;
        };

        let coming = participations
            .get(&holder.member_id)
            .is_some_and(|p| !p.kind.is_unanswered() && p.kind != ParticipationType::Absent);
        let side = if coming { &mut alloc.ok } else { &mut alloc.ng };
        side.entry(holder.member_id.clone())
            .or_default()
            .push(item.equipment.clone());
    }
    alloc
}
