use crate::runtime::config::ExporterConfig;
use crate::runtime::server::{MetricsServer, ServerState};
use anyhow::Result;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the metrics server lifecycle and handles OS signals for graceful shutdowns.
pub struct Runner {
    config: ExporterConfig,
    shutdown: CancellationToken,
    server: Option<JoinHandle<Result<()>>>,
}

impl Runner {
    pub fn new(config: ExporterConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            server: None,
        }
    }

    /// Binds the listener and spawns the server. Returns the bound address.
    pub async fn start(&mut self) -> Result<std::net::SocketAddr> {
        self.config.validate()?;
        let state = ServerState::from_config(&self.config)?;
        let server = MetricsServer::bind(&self.config.bind_addresses(), state).await?;
        let local_addr = server.local_addr();

        tracing::info!(
            listen_address = %local_addr,
            rest_url = self.config.rest_url(),
            orchestrator = self.config.orchestrator_address(),
            metrics_path = self.config.metrics_path(),
            concurrency = self.config.concurrency(),
            "exporter started"
        );

        self.server = Some(tokio::spawn(server.run(self.shutdown.clone())));
        Ok(local_addr)
    }

    /// Cancels the root token and waits for the server to drain.
    pub async fn stop(&mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(handle) = self.server.take() {
            handle.await??;
        }
        self.shutdown = CancellationToken::new();
        Ok(())
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        if self.server.is_none() {
            self.start().await?;
        }
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down runner");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await
    }
}
