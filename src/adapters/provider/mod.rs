//! Billing provider adapters.
//!
//! Implements the `BillingProvider` port. Only the mock lives here; a real
//! SDK binding is supplied by the composing application.

mod mock_billing_provider;

pub use mock_billing_provider::{MethodCall, MockBillingProvider};
