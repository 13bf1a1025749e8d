//! Risk controls for the paper-arb engine.
//!
//! Two independent layers: [`StrictAbValidator`] enforces the cross-venue
//! execution law in dual-venue mode, and [`RiskGate`] applies the ordered
//! portfolio rules regardless of venue topology.

pub mod gate;
pub mod validator;

pub use gate::{RiskGate, RiskRejection};
pub use validator::{RejectReason, StrictAbValidator, ValidationReport, ValidationResult};
