use anyhow::Context;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, TryRecvError},
    time::Duration,
};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::sync::ScrubReleasePolicy;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub stream: StreamConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn locate() -> Option<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join("config.toml"));
            candidates.push(current_dir.join("config").join("config.toml"));
            candidates.push(current_dir.join("config").join("flickwav.toml"));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("config.toml"));
                candidates.push(dir.join("config").join("config.toml"));
                candidates.push(dir.join("config").join("flickwav.toml"));
            }
        }

        candidates.into_iter().find(|path| path.exists())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    pub poll_interval_ms: u64,
    pub scrub_release: ScrubReleasePolicy,
    pub autoplay: bool,
    pub default_volume: f64,
    pub rates: Vec<f64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            scrub_release: ScrubReleasePolicy::AlwaysResume,
            autoplay: true,
            default_volume: 50.0,
            rates: vec![0.5, 1.0, 1.5, 2.0],
        }
    }
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(50, 5_000))
    }

    pub fn default_volume(&self) -> f64 {
        self.default_volume.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub resolver: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolver: "yt-dlp".to_string(),
            args: vec!["-g".to_string(), "-f".to_string(), "best".to_string()],
            timeout_secs: 30,
        }
    }
}

impl StreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(1, 300))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    playback: PlaybackSection,
    #[serde(default)]
    stream: StreamSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let defaults = Config::default();

        let mut rates: Vec<f64> = value
            .playback
            .rates
            .unwrap_or(defaults.playback.rates)
            .into_iter()
            .filter(|rate| rate.is_finite() && *rate > 0.0 && *rate <= 8.0)
            .collect();
        if !rates.iter().any(|rate| (*rate - 1.0).abs() < f64::EPSILON) {
            rates.push(1.0);
        }
        rates.sort_by(|a, b| a.total_cmp(b));
        rates.dedup();

        let playback = PlaybackConfig {
            poll_interval_ms: value
                .playback
                .poll_interval_ms
                .unwrap_or(defaults.playback.poll_interval_ms),
            scrub_release: value
                .playback
                .scrub_release
                .unwrap_or(defaults.playback.scrub_release),
            autoplay: value.playback.autoplay.unwrap_or(defaults.playback.autoplay),
            default_volume: value
                .playback
                .default_volume
                .unwrap_or(defaults.playback.default_volume),
            rates,
        };

        let stream = StreamConfig {
            resolver: value.stream.resolver.unwrap_or(defaults.stream.resolver),
            args: value.stream.args.unwrap_or(defaults.stream.args),
            timeout_secs: value
                .stream
                .timeout_secs
                .unwrap_or(defaults.stream.timeout_secs),
        };

        Config { playback, stream }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlaybackSection {
    poll_interval_ms: Option<u64>,
    scrub_release: Option<ScrubReleasePolicy>,
    autoplay: Option<bool>,
    default_volume: Option<f64>,
    rates: Option<Vec<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamSection {
    resolver: Option<String>,
    args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

/// Watches the loaded config file and hands back a fresh [`Config`] after edits.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    changes_rx: Receiver<notify::Result<notify::Event>>,
}

impl ConfigWatcher {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = tx.send(res);
        })
        .context("Failed to create config watcher")?;

        // Editors often replace the file, so watch its directory.
        let watch_root = path.parent().unwrap_or_else(|| Path::new("."));
        watcher
            .watch(watch_root, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", watch_root.display()))?;

        Ok(Self {
            path,
            _watcher: watcher,
            changes_rx: rx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking; returns `Some` only when the file changed and parsed.
    pub fn poll(&mut self) -> Option<Config> {
        let mut touched = false;
        loop {
            match self.changes_rx.try_recv() {
                Ok(Ok(event)) => {
                    if event.paths.iter().any(|p| p.file_name() == self.path.file_name()) {
                        touched = true;
                    }
                }
                Ok(Err(err)) => warn!("Config watcher error: {err}"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        if !touched {
            return None;
        }

        match Config::load_from(&self.path) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!("Ignoring config change: {err:?}");
                None
            }
        }
    }
}
