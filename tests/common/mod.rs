#![allow(dead_code)]

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use ndarray::Array4;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use touch_grass_lib::config::AppConfig;
use touch_grass_lib::error::AppError;
use touch_grass_lib::models::screen_types::ScreenSnapshot;
use touch_grass_lib::services::camera::{Camera, PermissionStatus};
use touch_grass_lib::services::classifier::inference::Predictor;
use touch_grass_lib::services::classifier::model_manager::ModelSpec;
use touch_grass_lib::services::events::ScreenEvents;
use touch_grass_lib::services::grass_service::GrassService;

pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(320, 240, Rgb(color));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

pub fn write_photo(dir: &Path) -> PathBuf {
    let path = dir.join("capture.png");
    std::fs::write(&path, png_bytes([30, 180, 40])).unwrap();
    path
}

/// Returns fixed scores and counts calls.
pub struct FixedPredictor {
    pub scores: Vec<f32>,
    pub calls: AtomicUsize,
    pub last_shape: Mutex<Option<Vec<usize>>>,
}

impl FixedPredictor {
    pub fn new(scores: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            scores,
            calls: AtomicUsize::new(0),
            last_shape: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Predictor for FixedPredictor {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_shape.lock().unwrap() = Some(input.shape().to_vec());
        Ok(self.scores.clone())
    }
}

/// Blocks inside `predict` until released.
pub struct GatedPredictor {
    pub gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedPredictor {
    pub fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { gate: Mutex::new(rx) }), tx)
    }
}

impl Predictor for GatedPredictor {
    fn predict(&self, _input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let _ = self.gate.lock().unwrap().recv();
        Ok(vec![0.1, 0.9])
    }
}

pub struct FakeCamera {
    pub permission: PermissionStatus,
    pub photo: Option<PathBuf>,
    pub captures: AtomicUsize,
}

impl FakeCamera {
    pub fn new(permission: PermissionStatus, photo: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            permission,
            photo,
            captures: AtomicUsize::new(0),
        })
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl Camera for FakeCamera {
    fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn capture(&self) -> Option<PathBuf> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.photo.clone()
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub snapshots: Mutex<Vec<ScreenSnapshot>>,
    pub alerts: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn last(&self) -> ScreenSnapshot {
        self.snapshots.lock().unwrap().last().cloned().unwrap()
    }

    pub fn all(&self) -> Vec<ScreenSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl ScreenEvents for RecordingEvents {
    fn screen_changed(&self, snapshot: &ScreenSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

pub fn service_with(config: AppConfig) -> (GrassService, Arc<RecordingEvents>) {
    let events = Arc::new(RecordingEvents::default());
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let service = GrassService::with_client(config, events.clone(), client).unwrap();
    (service, events)
}

/// Service whose model is already loaded with `predictor`.
pub async fn ready_service(
    config: AppConfig,
    predictor: Arc<dyn Predictor>,
) -> (GrassService, Arc<RecordingEvents>) {
    let (service, events) = service_with(config);
    let spec = service.default_spec();
    service
        .start(async move { Ok::<(Arc<dyn Predictor>, ModelSpec), AppError>((predictor, spec)) })
        .await
        .unwrap();
    (service, events)
}

/// Serves one canned HTTP response and returns its URL.
pub async fn serve_once(status: &'static str, content_type: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    format!("http://{}/thumb.png", addr)
}

/// One canned response of a [`serve_routes`] server.
#[derive(Clone)]
pub struct Route {
    pub path: &'static str,
    pub body: Vec<u8>,
    /// Pause after each body byte, to stream slowly.
    pub byte_delay: Option<Duration>,
}

impl Route {
    pub fn new(path: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            body: body.into(),
            byte_delay: None,
        }
    }

    pub fn trickle(mut self, delay: Duration) -> Self {
        self.byte_delay = Some(delay);
        self
    }
}

/// Loopback server answering any number of requests from `routes`; unknown
/// paths get a 404. Returns the base URL and the log of requested paths.
pub async fn serve_routes(routes: Vec<Route>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);

    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let request = String::from_utf8_lossy(&request).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                log.lock().unwrap().push(path.clone());

                let route = routes.iter().find(|r| r.path == path).cloned();
                let (status, body, delay) = match route {
                    Some(r) => ("200 OK", r.body, r.byte_delay),
                    None => ("404 Not Found", b"missing".to_vec(), None),
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                match delay {
                    Some(delay) => {
                        for byte in body {
                            if socket.write_all(&[byte]).await.is_err() {
                                return;
                            }
                            socket.flush().await.ok();
                            tokio::time::sleep(delay).await;
                        }
                    }
                    None => {
                        if socket.write_all(&body).await.is_err() {
                            return;
                        }
                    }
                }
                socket.shutdown().await.ok();
            });
        }
    });

    (format!("http://{}", addr), requests)
}
