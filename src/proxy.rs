//! Dialing through a caller-supplied proxy hook.
//!
//! Any function which can open a connection to an address - through a SOCKS
//! or HTTP CONNECT proxy, an SSH tunnel, or an in-memory pipe - can be used
//! as a [`ProxyDial`]. The hook receives a [`DialContext`] carrying the dial
//! deadline and should give up once it has passed.

use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt as _;
use tokio::time::Instant;

use crate::error::timeout_error;
use crate::{BoxError, Conn};

/// Opens a transport connection to `addr` over `network` (always `"tcp"`
/// when called by the [`Dialer`][crate::Dialer]).
///
/// Implemented for closures of the form
/// `Fn(DialContext, &str, &str) -> impl Future<Output = Result<Conn, BoxError>>`.
pub trait ProxyDial: Send + Sync {
    /// Dial `addr` through the proxy.
    fn dial(
        &self,
        cx: DialContext,
        network: &str,
        addr: &str,
    ) -> BoxFuture<'static, Result<Conn, BoxError>>;
}

impl<F, Fut> ProxyDial for F
where
    F: Fn(DialContext, &str, &str) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Conn, BoxError>> + Send + 'static,
{
    fn dial(
        &self,
        cx: DialContext,
        network: &str,
        addr: &str,
    ) -> BoxFuture<'static, Result<Conn, BoxError>> {
        (self)(cx, network, addr).boxed()
    }
}

/// The deadline a dial must complete by.
///
/// A context without a deadline never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialContext {
    deadline: Option<Instant>,
}

impl DialContext {
    /// A context with no deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// A context expiring `timeout` from now. [`Duration::ZERO`] means no
    /// deadline, as does a timeout too large to be represented as an instant.
    pub fn with_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            return Self::background();
        }

        Self {
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// The instant this context expires at.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| deadline <= Instant::now())
    }

    /// Run `future` to completion, or fail with an "i/o timeout" error of kind
    /// [`std::io::ErrorKind::TimedOut`] once the deadline passes.
    pub async fn run<F, T, E>(&self, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<std::io::Error>,
    {
        match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::trace!("dial deadline exceeded");
                    Err(timeout_error().into())
                }
            },
            None => future.await,
        }
    }
}

impl Default for DialContext {
    fn default() -> Self {
        Self::background()
    }
}
