//! Relay server runtime.
//!
//! Owns the listener, the shared driver, and the periodic reservation
//! sweep. Request handling lives in [`crate::http`].

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::driver::{RelayConfig, RelayDriver, SWEEP_INTERVAL};
use crate::error::ServerError;
use crate::http::{AppState, router};

/// Runtime configuration for [`RelayServer`].
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind, e.g. `0.0.0.0:3000`.
    pub bind_address: String,
    /// Relay tuning knobs.
    pub relay: RelayConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:3000".to_string(), relay: RelayConfig::default() }
    }
}

/// A bound, ready-to-run relay server.
pub struct RelayServer {
    listener: TcpListener,
    state: AppState,
}

impl RelayServer {
    /// Bind the listener and set up shared state.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let addr: SocketAddr = config.bind_address.parse()?;
        let listener = TcpListener::bind(addr).await?;
        let state = AppState::new(RelayDriver::new(config.relay));
        Ok(Self { listener, state })
    }

    /// The locally bound address, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the process is stopped.
    pub async fn run(self) -> Result<(), ServerError> {
        let driver = self.state.driver();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let purged = driver.lock().await.sweep(std::time::Instant::now());
                if purged > 0 {
                    tracing::debug!(purged, "expired room reservations swept");
                }
            }
        });

        let app = router(self.state);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}
