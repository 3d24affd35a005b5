//! Vivarium Core - Interchange contract for the multi-world simulator.
//!
//! This crate defines the boundary between the execution manager and the
//! training code that consumes it:
//!
//! - [`Tensor`] - Non-owning typed view over a backend-owned export buffer
//! - [`ElementType`] - Fixed numeric element types for exported tensors
//! - [`SimObject`] / [`ObjectTable`] - The static simulation-object
//!   enumeration and the rigid-body metadata registered per kind
//! - [`ExportSlot`] - The per-step buffers a backend must export
//! - [`VivariumError`] / [`fatal!`] - Error taxonomy and the process-wide
//!   fatal-error path for deployment-invariant failures

pub mod error;
pub mod export;
pub mod objects;
pub mod tensor;

pub use error::{fatal, Result, VivariumError};
pub use export::ExportSlot;
pub use objects::{ObjectTable, RigidBodyMetadata, RotationConstraint, SimObject};
pub use tensor::{ElementType, Tensor};
