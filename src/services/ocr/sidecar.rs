use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::http_ocr::SidecarClient;
use crate::error::{OcrError, Result};
use crate::models::config::{BackendSettings, EngineKind};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Bundled server script for engines that run out of process
pub fn script_name(kind: EngineKind) -> Option<&'static str> {
    match kind {
        EngineKind::Paddle => Some("paddle_server.py"),
        EngineKind::Easy => Some("easyocr_server.py"),
        EngineKind::Tesseract => None,
    }
}

/// A spawned inference server, killed on drop
struct SidecarProcess {
    child: Child,
}

impl SidecarProcess {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for SidecarProcess {
    fn drop(&mut self) {
        if !self.is_alive() {
            return;
        }
        match self.child.kill() {
            Ok(()) => {
                let _ = self.child.wait();
                debug!("Stopped sidecar pid {}", self.child.id());
            }
            Err(e) => warn!("Failed to stop sidecar pid {}: {}", self.child.id(), e),
        }
    }
}

/// Inference server manager.
///
/// Starts the bundled PaddleOCR and EasyOCR servers when nothing answers on
/// the configured URL, and stops whatever it started when dropped.
pub struct SidecarLauncher {
    settings: BackendSettings,
    running: Mutex<HashMap<EngineKind, SidecarProcess>>,
}

impl SidecarLauncher {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure the server for `kind` answers its health endpoint.
    ///
    /// With autostart off this only reports; the adapter's own connect
    /// produces the error.
    pub fn ensure_running(&self, kind: EngineKind) -> Result<()> {
        let Some(script) = script_name(kind) else {
            return Ok(());
        };
        let base_url = self.settings.url_for(kind);
        let health = SidecarClient::unchecked(base_url, Duration::from_secs(2))?;

        // one launcher start at a time per process
        let mut running = self.running.lock();
        if health.health_check().is_ok() {
            return Ok(());
        }
        if !self.settings.autostart_sidecars {
            debug!("{} server at {} is down and autostart is off", kind, base_url);
            return Ok(());
        }

        if let Some(mut process) = running.remove(&kind) {
            if process.is_alive() {
                warn!("{} server is running but unhealthy, restarting", kind);
            }
        }

        let script_path = self.locate_script(script)?;
        let (host, port) = host_and_port(base_url)?;
        info!("Starting {} server: {} on {}:{}", kind, script_path.display(), host, port);

        let port = port.to_string();
        let child = Command::new(&self.settings.python_bin)
            .arg(&script_path)
            .args(["--host", host.as_str(), "--port", port.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| {
                OcrError::EngineUnavailable(format!(
                    "Failed to start {} server with {}: {}",
                    kind, self.settings.python_bin, e
                ))
            })?;

        let mut process = SidecarProcess { child };
        wait_for_ready(
            kind,
            &health,
            &mut process,
            Duration::from_secs(self.settings.startup_timeout_secs),
        )?;
        running.insert(kind, process);
        Ok(())
    }

    /// Number of servers this launcher started and still owns
    pub fn owned(&self) -> usize {
        self.running.lock().len()
    }

    /// First existing `<dir>/<script>` among the configured directory, the
    /// directory next to the executable and `./sidecars`.
    fn locate_script(&self, script: &str) -> Result<PathBuf> {
        let candidates = self.script_dirs();
        candidates
            .iter()
            .map(|dir| dir.join(script))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                OcrError::EngineUnavailable(format!(
                    "Server script {} not found in {:?}",
                    script, candidates
                ))
            })
    }

    fn script_dirs(&self) -> Vec<PathBuf> {
        if let Some(dir) = &self.settings.sidecar_dir {
            return vec![dir.clone()];
        }

        let mut dirs = Vec::new();
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
        {
            dirs.push(exe_dir.join("sidecars"));
            // target/<profile>/ in a source checkout
            dirs.push(exe_dir.join("../../sidecars"));
        }
        dirs.push(PathBuf::from("sidecars"));
        dirs
    }
}

/// Poll `/health` until it answers, the process exits, or `timeout` passes
fn wait_for_ready(
    kind: EngineKind,
    health: &SidecarClient,
    process: &mut SidecarProcess,
    timeout: Duration,
) -> Result<()> {
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if health.health_check().is_ok() {
            info!("{} server ready after {} attempts", kind, attempt);
            return Ok(());
        }

        if let Ok(Some(status)) = process.child.try_wait() {
            return Err(OcrError::EngineUnavailable(format!(
                "{} server exited during startup: {}",
                kind, status
            )));
        }

        if started.elapsed() >= timeout {
            return Err(OcrError::EngineUnavailable(format!(
                "{} server at {} not ready within {}s",
                kind,
                health.base_url(),
                timeout.as_secs()
            )));
        }

        if attempt % 20 == 0 {
            debug!("Waiting for {} server (attempt {})", kind, attempt);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn host_and_port(base_url: &str) -> Result<(String, u16)> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| OcrError::Configuration(format!("Invalid server URL {}: {}", base_url, e)))?;

    let host = url
        .host_str()
        .ok_or_else(|| OcrError::Configuration(format!("Server URL {} has no host", base_url)))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| OcrError::Configuration(format!("Server URL {} has no port", base_url)))?;

    Ok((host, port))
}
