//! TCP front end of the download subtest.
//!
//! [`Server`] accepts connections until shutdown is broadcast, bounding the
//! number of concurrent sessions with a semaphore. Each connection runs on its
//! own task: the handshake, the probe attachment and the session loop are all
//! owned by that task and released when it ends.
mod connection;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::args::ServerArgs;
use crate::error::{AppError, AppResult, ValidationError};
use crate::ndt7::download::SessionSettings;
use crate::ndt7::{MAX_DURATION_SECS, MIN_MAX_MESSAGE_SIZE, MIN_MEASUREMENT_INTERVAL};
use crate::probe::platform_probe;
use crate::system::shutdown::ShutdownReceiver;

use connection::{ConnectionSettings, serve_connection};

/// Resolved server settings after CLI and config file were merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub max_connections: u32,
    pub max_message_size: usize,
    pub switch_to_bbr: bool,
    pub session: SessionSettings,
}

impl ServerConfig {
    /// Builds the server settings from parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when the measurement interval is shorter than the
    /// protocol minimum or the connection limit does not fit a semaphore.
    pub fn from_args(args: &ServerArgs) -> AppResult<Self> {
        if args.measurement_interval < MIN_MEASUREMENT_INTERVAL {
            return Err(AppError::validation(
                ValidationError::MeasurementIntervalTooShort {
                    value: args.measurement_interval,
                    min: MIN_MEASUREMENT_INTERVAL,
                },
            ));
        }
        let max_connections = u32::try_from(args.max_connections.get())
            .ok()
            .ok_or_else(|| {
                AppError::validation(ValidationError::ValueTooLarge {
                    field: "max_connections",
                    value: args.max_connections.get(),
                })
            })?;
        Ok(Self {
            listen: args.listen,
            max_connections,
            max_message_size: MIN_MAX_MESSAGE_SIZE,
            switch_to_bbr: !args.no_bbr,
            session: SessionSettings {
                measurement_interval: args.measurement_interval,
                write_timeout: args.write_timeout,
                early_stop: !args.no_early_stop,
            },
        })
    }

    /// Longest time a running session may still need once shutdown starts:
    /// the longest subtest plus a close frame and a measurement write.
    const fn drain_timeout(&self) -> Duration {
        Duration::from_secs(MAX_DURATION_SECS)
            .saturating_add(self.session.write_timeout.saturating_mul(2))
    }
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    limiter: Arc<Semaphore>,
}

impl Server {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> AppResult<Self> {
        let listener = TcpListener::bind(config.listen).await?;
        let permits = usize::try_from(config.max_connections).unwrap_or(usize::MAX);
        Ok(Self {
            listener,
            config,
            limiter: Arc::new(Semaphore::new(permits)),
        })
    }

    /// Address actually bound, useful when listening on port 0.
    ///
    /// # Errors
    ///
    /// Returns an error when the socket address cannot be read.
    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown_rx` fires, then waits for running
    /// sessions to finish on their own.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection limiter is closed.
    pub async fn run_until_shutdown(self, mut shutdown_rx: ShutdownReceiver) -> AppResult<()> {
        let Server {
            listener,
            config,
            limiter,
        } = self;
        info!("ndt7 server listening on {}", listener.local_addr()?);

        let probe = platform_probe(config.switch_to_bbr);
        let settings = ConnectionSettings {
            max_message_size: config.max_message_size,
            session: config.session,
        };

        loop {
            let permit = tokio::select! {
                _ = shutdown_rx.recv() => break,
                permit = limiter.clone().acquire_owned() => permit?,
            };
            let (stream, peer) = tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("Failed to accept connection: {}", err);
                        continue;
                    }
                },
            };
            tokio::spawn(async move {
                serve_connection(stream, peer, probe, settings).await;
                drop(permit);
            });
        }

        drop(listener);
        let in_flight = usize::try_from(config.max_connections)
            .unwrap_or(usize::MAX)
            .saturating_sub(limiter.available_permits());
        if in_flight > 0 {
            info!("Waiting for {} running session(s) to finish", in_flight);
        }
        match tokio::time::timeout(
            config.drain_timeout(),
            limiter.acquire_many(config.max_connections),
        )
        .await
        {
            Ok(permits) => drop(permits?),
            Err(_) => warn!("Sessions still running after {:?}", config.drain_timeout()),
        }
        info!("ndt7 server stopped");
        Ok(())
    }
}
