//! Export-slot enumeration shared by the manager and both backends.

use crate::tensor::ElementType;

/// Identifies one of the per-step buffers a backend exports to the caller.
///
/// The slot order is the arena layout order on both backends; the manager
/// maps each slot to its documented tensor shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ExportSlot {
    Reset = 0,
    Action,
    Reward,
    Done,
    SelfObservation,
    PartnerObservations,
    RoomEntityObservations,
    DoorObservation,
    Lidar,
    StepsRemaining,
}

impl ExportSlot {
    /// Number of export slots.
    pub const COUNT: usize = 10;

    /// Element type of the tensor exported from this slot.
    #[inline]
    pub const fn element_type(self) -> ElementType {
        match self {
            ExportSlot::Reset
            | ExportSlot::Action
            | ExportSlot::Done
            | ExportSlot::StepsRemaining => ElementType::I32,
            ExportSlot::Reward
            | ExportSlot::SelfObservation
            | ExportSlot::PartnerObservations
            | ExportSlot::RoomEntityObservations
            | ExportSlot::DoorObservation
            | ExportSlot::Lidar => ElementType::F32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_types() {
        assert_eq!(ExportSlot::Reset.element_type(), ElementType::I32);
        assert_eq!(ExportSlot::Reward.element_type(), ElementType::F32);
        assert_eq!(ExportSlot::Lidar.element_type(), ElementType::F32);
        assert_eq!(ExportSlot::StepsRemaining.element_type(), ElementType::I32);
    }
}
