//! Seams between the submission pipeline and the services it talks to.
//!
//! Each adapter is a small synchronous trait so the handler can be driven by
//! recording fakes in tests. The concrete implementations wrap async clients
//! and bridge them with [`block_on`], which requires a multi-threaded tokio
//! runtime.

pub mod credentials;
pub mod download;
pub mod mailer;
pub mod object_store;
pub mod tracking;

pub(crate) fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
