//! HTTP transport and retrying request executor for the Elliptics HTTP API.
//!
//! [`Transport`] is the only seam to the network; [`ReqwestTransport`] is
//! the production implementation. [`RequestExecutor`] layers the per-phase
//! timeout/retry budgets on top of it.

pub mod error;
pub mod executor;
pub mod transport;

pub use error::Error;
pub use executor::{RequestExecutor, RetryBudget};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
