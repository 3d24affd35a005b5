//! Simulation-object enumeration and the registered rigid-body table.
//!
//! Both asset tables (render and physics) are indexed by [`SimObject`]. The
//! physics side of the pipeline produces one [`RigidBodyMetadata`] record
//! per kind; the assembled [`ObjectTable`] is registered with the active
//! backend at initialization and is immutable afterward, shared read-only
//! across every world.

use bytemuck::{Pod, Zeroable};

/// The fixed enumeration of simulation-object kinds.
///
/// Every kind has exactly one render asset and (apart from [`Plane`], which
/// is an implicit infinite collision plane) at least one collision hull.
///
/// [`Plane`]: SimObject::Plane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SimObject {
    Cube = 0,
    Wall,
    Door,
    Agent,
    Button,
    BasketballHoop,
    Basketball,
    BasketballCourt,
    Plane,
}

impl SimObject {
    /// Number of object kinds.
    pub const COUNT: usize = 9;

    /// All kinds in table order.
    pub const ALL: [SimObject; Self::COUNT] = [
        SimObject::Cube,
        SimObject::Wall,
        SimObject::Door,
        SimObject::Agent,
        SimObject::Button,
        SimObject::BasketballHoop,
        SimObject::Basketball,
        SimObject::BasketballCourt,
        SimObject::Plane,
    ];

    /// Table index of this kind.
    #[inline]
    pub const fn index(self) -> usize {
        self as u32 as usize
    }
}

/// Per-kind rotational freedom, applied after generic mass/inertia
/// computation.
///
/// Declared as data rather than in code so that constraining a new kind is
/// a table edit: the asset pipeline looks each kind up in its constraint
/// table and zeroes the corresponding inverse-inertia components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationConstraint {
    /// No constraint; the hull-derived inertia tensor stands.
    Full,
    /// Infinite inertia about both horizontal axes: the body can only yaw.
    YawOnly,
}

/// Backend-ready rigid-body parameters for one object kind.
///
/// `inv_mass == 0` marks immovable scenery. `half_extents` is the combined
/// axis-aligned extent of the kind's collision hulls; the world engine uses
/// it to derive collision radii.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RigidBodyMetadata {
    pub inv_mass: f32,
    /// Static friction coefficient.
    pub mu_s: f32,
    /// Dynamic friction coefficient.
    pub mu_d: f32,
    pub inv_inertia: [f32; 3],
    pub half_extents: [f32; 3],
}

impl RigidBodyMetadata {
    /// Metadata for a kind that never moves and has no hull extent.
    pub const fn fixed() -> Self {
        Self {
            inv_mass: 0.0,
            mu_s: 0.5,
            mu_d: 0.5,
            inv_inertia: [0.0; 3],
            half_extents: [0.0; 3],
        }
    }
}

/// The per-kind rigid-body table registered with the active backend.
#[derive(Clone, Debug)]
pub struct ObjectTable {
    pub metadata: [RigidBodyMetadata; SimObject::COUNT],
}

impl ObjectTable {
    #[inline]
    pub fn get(&self, obj: SimObject) -> &RigidBodyMetadata {
        &self.metadata[obj.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_covers_every_index() {
        for (i, obj) in SimObject::ALL.iter().enumerate() {
            assert_eq!(obj.index(), i);
        }
    }

    #[test]
    fn test_metadata_is_pod() {
        // The CUDA backend uploads the table as raw bytes; the layout must
        // stay free of padding.
        assert_eq!(std::mem::size_of::<RigidBodyMetadata>(), 9 * 4);
        let meta = RigidBodyMetadata::fixed();
        let bytes = bytemuck::bytes_of(&meta);
        assert_eq!(bytes.len(), 36);
    }
}
