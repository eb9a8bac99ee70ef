//! Poll gating and attestation badges for tutorial pages.
//!
//! The page chrome around this crate only needs two things from it: a list of
//! colored badges to draw, and a poll view-model whose vote action is locked
//! behind a verified group-membership proof. Everything here is driven by
//! explicit state passed in from the host; remote services enter through the
//! trait seams in [`services`].

pub mod badges;
pub mod error;
pub mod gate;
pub mod http;
pub mod mocks;
pub mod palette;
pub mod services;
pub mod session;

pub use poll_types;

pub use error::{PollError, ServiceError};
pub use gate::{GateState, ProofGate};
pub use session::{PollSession, SessionPhase, SessionServices};
