//! HTTP surface.
//!
//! Hand-rolled HTTP/1.1 over `TcpListener`, one thread per connection so a
//! long-lived `/video_feed` stream cannot starve the alert endpoint.
//!
//! Routes:
//! - `GET /`           landing page (stream + alert polling)
//! - `GET /video_feed` multipart MJPEG stream driven by the pipeline
//! - `GET /get_alerts` the last 10 alert log entries, oldest first
//! - `GET /health`     liveness probe

mod page;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::alert::RECENT_WINDOW;
use crate::ingest::{CameraConfig, CameraSource};
use crate::pipeline::{Pipeline, STREAM_BOUNDARY};

pub use page::INDEX_PAGE;

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// The flag shared with every stream; raising it stops the server and
    /// ends in-flight streams at their next frame.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    pipeline: Pipeline,
    camera: CameraConfig,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, pipeline: Pipeline, camera: CameraConfig) -> Self {
        Self {
            cfg,
            pipeline,
            camera,
        }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "api configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let pipeline = self.pipeline;
        let camera = self.camera;
        let join = std::thread::spawn(move || {
            run_api(listener, pipeline, camera, shutdown_thread);
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    pipeline: Pipeline,
    camera: CameraConfig,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                let pipeline = pipeline.clone();
                let camera = camera.clone();
                let shutdown = shutdown.clone();
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &pipeline, &camera, &shutdown) {
                        log::warn!("api request failed: {:#}", err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => {
                log::error!("api accept failed: {}", err);
                break;
            }
        }
    }
}

#[derive(Serialize)]
struct AlertsPayload {
    alerts: Vec<String>,
}

fn handle_connection(
    mut stream: TcpStream,
    pipeline: &Pipeline,
    camera: &CameraConfig,
    shutdown: &AtomicBool,
) -> Result<()> {
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let request = read_request(&mut stream)?;
    if request.method != "GET" {
        write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
        return Ok(());
    }

    match request.path.as_str() {
        "/" => write_response(&mut stream, 200, "text/html", INDEX_PAGE.as_bytes()),
        "/health" => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        "/get_alerts" => {
            let payload = AlertsPayload {
                alerts: pipeline.alert_log().recent(RECENT_WINDOW),
            };
            let body = serde_json::to_vec(&payload)?;
            write_response(&mut stream, 200, "application/json", &body)
        }
        "/video_feed" => serve_video_feed(stream, pipeline, camera, shutdown),
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

/// Open a fresh capture source for this consumer and stream until it ends.
fn serve_video_feed(
    mut stream: TcpStream,
    pipeline: &Pipeline,
    camera: &CameraConfig,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut source = match open_source(camera) {
        Ok(source) => source,
        Err(err) => {
            log::warn!("video feed unavailable: {:#}", err);
            write_json_response(&mut stream, 500, r#"{"error":"camera_unavailable"}"#)?;
            return Ok(());
        }
    };

    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        STREAM_BOUNDARY
    );
    stream.write_all(header.as_bytes())?;

    let stats = pipeline.run(&mut source, &mut stream, shutdown)?;
    log::info!(
        "video feed ended: {} frames streamed, {} skipped, {} alerts ({})",
        stats.frames_streamed,
        stats.frames_skipped,
        stats.alerts_emitted,
        source.stats().source,
    );
    Ok(())
}

fn open_source(camera: &CameraConfig) -> Result<CameraSource> {
    let mut source = CameraSource::new(camera.clone())?;
    source.connect()?;
    Ok(source)
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    parse_request(&data)
}

fn parse_request(data: &[u8]) -> Result<HttpRequest> {
    let text = String::from_utf8_lossy(data);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    #[allow(dead_code)]
    headers: HashMap<String, String>,
}
