//! doppel-flow — The upload → processing → result/error state machine.
//!
//! The orchestrator drives one remote transformation at a time, narrating
//! progress with a scripted schedule while the request is in flight, and
//! routes outcomes to the result, error, or registration-gate states. The
//! registration gate and its `AuthProvider` capability live alongside it.

pub mod gate;
pub mod orchestrator;

pub use gate::{AuthProvider, RegistrationGate, Session, StubAuthProvider};
pub use orchestrator::{FlowState, Orchestrator};
