//! Provider initialization coordinator.
//!
//! Owns the process-wide provider session: configuration state, the
//! identity currently logged in, and the in-flight configure and switch
//! calls that concurrent callers join.

mod identity;
mod initialization;
mod session;

pub use identity::AppIdentity;
pub use initialization::ProviderInitializationCoordinator;
pub use session::{ConfigurationState, CoordinatorError};
