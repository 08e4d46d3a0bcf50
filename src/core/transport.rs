//! Transports
//!
//! The mode is picked once at startup by [`serve`]:
//! - stdio: newline-delimited JSON-RPC on stdin/stdout. Logging goes to
//!   stderr so the protocol stream stays clean.
//! - rest: an Actix Web listener taking JSON-RPC POSTs on the configured
//!   endpoint, plus `GET /health`.

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer,
    error::{InternalError, JsonPayloadError},
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{error, info, warn};

use crate::core::config::{Config, Mode};
use crate::core::error::ServerError;
use crate::core::server::{MCPRequest, MCPResponse, McpServer, PARSE_ERROR};

/// Bind the dispatcher to the configured transport and run until it stops.
pub async fn serve(config: Arc<Config>) -> Result<(), ServerError> {
    let server = Arc::new(McpServer::new(config.clone()));
    match config.mode {
        Mode::Stdio => run_stdio(server).await,
        Mode::Rest => run_http(server, &config).await,
    }
}

/// Run the MCP server in STDIO mode.
///
/// Returns when stdin reaches EOF.
pub async fn run_stdio(server: Arc<McpServer>) -> Result<(), ServerError> {
    info!(name = server.name(), "MCP server starting (stdio mode)");

    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(&server, stdin, stdout).await?;

    info!("stdin closed, shutting down");
    Ok(())
}

/// Process newline-delimited requests from `reader`, writing one response line
/// per request to `writer`. Requests are handled one at a time, in order.
pub async fn serve_lines<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(8192);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        // Parsed from bytes: a line that is not UTF-8 is a parse error, not an I/O error.
        let response = match serde_json::from_slice::<MCPRequest>(line) {
            Ok(req) => server.handle(req).await,
            Err(e) => {
                warn!(error = %e, "unreadable request line");
                Some(MCPResponse::unreadable(line, &e))
            }
        };
        let Some(response) = response else {
            continue;
        };

        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "error serializing response");
                continue;
            }
        };
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        // Flush per response; clients wait on each line.
        writer.flush().await?;
    }
    Ok(())
}

/// Health check endpoint handler.
async fn health(server: web::Data<McpServer>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": server.name()
    }))
}

/// JSON-RPC endpoint handler. Notifications are acknowledged with 202.
async fn rpc_handler(server: web::Data<McpServer>, req: web::Json<MCPRequest>) -> HttpResponse {
    match server.handle(req.into_inner()).await {
        Some(response) => HttpResponse::Ok().json(response),
        None => HttpResponse::Accepted().finish(),
    }
}

/// Reject undecodable bodies with a JSON-RPC error instead of plain text.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let body = MCPResponse::error(None, PARSE_ERROR, format!("Parse error: {err}"));
    let response = HttpResponse::BadRequest().json(body);
    InternalError::from_response(err, response).into()
}

/// Register the REST routes. The JSON-RPC endpoint is mounted at `endpoint`.
///
/// The app must carry a `web::Data<McpServer>`.
pub fn routes(cfg: &mut web::ServiceConfig, endpoint: &str) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/health", web::get().to(health))
        .route(endpoint, web::post().to(rpc_handler));
}

/// Run the MCP server in REST mode.
///
/// # Configuration
/// - Worker threads: `Config::worker_count`
/// - Keep-alive and request timeout: 30 seconds
/// - Disconnect timeout: 2 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_http(server: Arc<McpServer>, config: &Config) -> Result<(), ServerError> {
    let addr = config.bind_addr();
    let endpoint = config.endpoint.clone();
    let workers = config.worker_count();

    info!(
        name = server.name(),
        addr = %addr,
        endpoint = %endpoint,
        workers,
        "MCP server starting (rest mode)"
    );

    let data = web::Data::from(server);
    let http = HttpServer::new(move || {
        let endpoint = endpoint.clone();
        App::new()
            .app_data(data.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            // %r = request line, %s = status, %D = duration in ms
            .wrap(Logger::new("%r %s %Dms"))
            .configure(move |cfg| routes(cfg, &endpoint))
    })
    .workers(workers)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&addr)
    .map_err(|source| ServerError::Bind {
        addr: addr.clone(),
        source,
    })?;

    http.run().await?;
    info!("rest listener stopped");
    Ok(())
}
