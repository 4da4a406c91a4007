//! Per-IP spacing of form submissions using governor.
//!
//! Each client address may make one rate-limited request per window. A
//! rejected request does not push the window forward. Idle addresses are
//! swept once a minute by [`spawn_sweeper`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::Quota;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions_sqlx_store::SqliteStore;

use crate::error::AppError;
use crate::state::AppState;

/// Body of every 429 response.
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too Many Requests. Please try again later.";

/// How often stale entries are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type KeyedLimiter<C> = governor::RateLimiter<
    IpAddr,
    DefaultKeyedStateStore<IpAddr>,
    C,
    NoOpMiddleware<<C as Clock>::Instant>,
>;

/// Keyed limiter allowing one request per window for each client address.
#[derive(Clone)]
pub struct RateLimiter<C: Clock = DefaultClock> {
    /// `None` when the window is zero.
    limiter: Option<Arc<KeyedLimiter<C>>>,
}

impl RateLimiter {
    /// A zero `window` disables limiting.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, DefaultClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    fn with_clock(window: Duration, clock: C) -> Self {
        let limiter = Quota::with_period(window).map(|quota| {
            Arc::new(governor::RateLimiter::new(
                quota,
                DefaultKeyedStateStore::default(),
                clock,
            ))
        });
        Self { limiter }
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    #[must_use]
    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter
            .as_ref()
            .is_none_or(|limiter| limiter.check_key(&ip).is_ok())
    }

    /// Forget addresses whose window has long passed.
    pub fn cleanup(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        let before = limiter.len();
        limiter.retain_recent();
        limiter.shrink_to_fit();
        let removed = before.saturating_sub(limiter.len());
        if removed > 0 {
            tracing::debug!(removed, "Swept rate limiter entries");
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.limiter.as_ref().map_or(0, |limiter| limiter.len())
    }
}

/// Periodically sweep the rate limiter and expired sessions until `shutdown`
/// is cancelled.
pub fn spawn_sweeper(
    limiter: RateLimiter,
    sessions: SqliteStore,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    limiter.cleanup();
                    if let Err(e) = sessions.delete_expired().await {
                        tracing::warn!(error = %e, "Failed to delete expired sessions");
                    }
                }
            }
        }
        tracing::debug!("Sweeper stopped");
    })
}

/// Peer address of the connection. Forwarding headers are not trusted.
///
/// Requests without connection info share the unspecified address.
fn extract_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip())
}

/// Reject the request with 429 if its address was seen within the window.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = extract_ip(&request);
    if !state.rate_limiter().check(ip) {
        tracing::warn!(%ip, path = %request.uri().path(), "Rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}
