//! HTTP surface serving the landing page and the metrics endpoint.

use crate::collector::exporter::Exporter;
use crate::rest::client::RestClient;
use crate::runtime::config::ExporterConfig;
use crate::runtime::telemetry::Telemetry;
use anyhow::{anyhow, Context, Result};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shared state behind every request.
pub struct ServerState {
    exporter: Exporter,
    rest: RestClient,
    telemetry: Arc<Telemetry>,
    metrics_path: String,
    scrape_gate: Mutex<()>,
}

impl ServerState {
    pub fn new(exporter: Exporter, rest: RestClient, metrics_path: impl Into<String>) -> Self {
        Self {
            exporter,
            rest,
            telemetry: Arc::new(Telemetry::default()),
            metrics_path: metrics_path.into(),
            scrape_gate: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ExporterConfig) -> Result<Self> {
        let rest = RestClient::from_config(config)?;
        let exporter = Exporter::from_config(config, Arc::new(rest.clone()));
        Ok(Self::new(exporter, rest, config.metrics_path()))
    }

    /// Runs one collection cycle and encodes it with the self telemetry.
    /// Cycles are serialized; concurrent scrapes wait for the running one.
    pub async fn gather_text(&self) -> Result<(String, Vec<u8>)> {
        let mut families = {
            let _guard = self.scrape_gate.lock().await;
            let started = Instant::now();
            let scraped = self.exporter.scrape().await;
            self.telemetry
                .record_scrape(scraped.is_ok(), started.elapsed());
            scraped.unwrap_or_default()
        };
        families.extend(self.telemetry.render(self.rest.metrics())?);

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .context("failed to encode metric families")?;
        Ok((encoder.format_type().to_owned(), buffer))
    }

    fn landing_page(&self) -> String {
        format!(
            "<html>\n<head><title>Peggo Exporter</title></head>\n<body>\n\
             <h1>Peggo Exporter</h1>\n<p><a href=\"{path}\">Metrics</a></p>\n\
             </body>\n</html>\n",
            path = self.metrics_path
        )
    }
}

pub struct MetricsServer {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MetricsServer {
    /// Binds the first of `addresses` that succeeds. Hostnames are resolved here.
    pub async fn bind(addresses: &[String], state: ServerState) -> Result<Self> {
        let mut last_error = None;
        for address in addresses {
            match TcpListener::bind(address.as_str()).await {
                Ok(listener) => return Self::from_listener(listener, state),
                Err(err) => {
                    tracing::debug!(address = %address, error = %err, "metrics listener bind failed");
                    last_error = Some(
                        anyhow::Error::new(err)
                            .context(format!("failed to bind metrics listener on {address}")),
                    );
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("no listen address configured")))
    }

    fn from_listener(listener: TcpListener, state: ServerState) -> Result<Self> {
        let local_addr = listener
            .local_addr()
            .context("failed to read metrics listener address")?;
        let listener = listener
            .into_std()
            .context("failed to convert metrics listener")?;
        listener
            .set_nonblocking(true)
            .context("failed to set metrics listener non-blocking")?;

        Ok(Self {
            listener,
            local_addr,
            state: Arc::new(state),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let state = self.state;
        let make_service = make_service_fn(move |_| {
            let state = Arc::clone(&state);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(Arc::clone(&state), req)))
            }
        });

        tracing::info!(address = %self.local_addr, "metrics server listening");
        Server::from_tcp(self.listener)
            .context("failed to build metrics HTTP server")?
            .serve(make_service)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("metrics server failed")?;

        tracing::info!("metrics server stopped");
        Ok(())
    }
}

async fn serve_request(
    state: Arc<ServerState>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        return Ok(plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n"));
    }

    let path = req.uri().path();
    if path == state.metrics_path {
        return Ok(match state.gather_text().await {
            Ok((content_type, body)) => {
                let mut response = Response::new(Body::from(body));
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "failed to render metrics");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics\n")
            }
        });
    }

    if path == "/" {
        let mut response = Response::new(Body::from(state.landing_page()));
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        return Ok(response);
    }

    Ok(plain(StatusCode::NOT_FOUND, "Not Found\n"))
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}
