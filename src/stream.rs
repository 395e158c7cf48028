//! Resolves a web page URL to a direct media URL with an external program.

use crate::{config::StreamConfig, error::PlayerError};
use std::{
    io::Read,
    process::{Command, Stdio},
    sync::mpsc,
    thread,
    time::Duration,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct StreamResolver {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl StreamResolver {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.resolver.clone(), config.args.clone(), config.timeout())
    }

    /// Runs `<program> <args...> <page_url>` and returns the first http(s) line it prints.
    pub fn resolve(&self, page_url: &str) -> Result<String, PlayerError> {
        info!(program = %self.program, url = page_url, "Resolving stream");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(page_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                PlayerError::StreamResolution(format!("could not start {}: {e}", self.program))
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::StreamResolution("no stdout from resolver".into()))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut bytes = Vec::new();
            let res = stdout
                .read_to_end(&mut bytes)
                .map(|_| String::from_utf8_lossy(&bytes).into_owned());
            let _ = tx.send(res);
        });

        let output = match rx.recv_timeout(self.timeout) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PlayerError::StreamResolution(format!(
                    "reading resolver output failed: {e}"
                )));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "Resolver timed out");
                let _ = child.kill();
                let _ = child.wait();
                return Err(PlayerError::StreamResolution(format!(
                    "{} did not finish within {:?}",
                    self.program, self.timeout
                )));
            }
        };

        let status = child
            .wait()
            .map_err(|e| PlayerError::StreamResolution(e.to_string()))?;
        if !status.success() {
            return Err(PlayerError::StreamResolution(format!(
                "{} exited with {status}",
                self.program
            )));
        }

        let url = first_media_url(&output).ok_or_else(|| {
            PlayerError::StreamResolution(format!("{} printed no media URL", self.program))
        })?;
        debug!(url, "Stream resolved");
        Ok(url)
    }
}

fn first_media_url(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_http_line() {
        let output = "WARNING: something\nhttps://cdn.example.com/v.mp4\nhttps://cdn.example.com/a.m4a\n";
        assert_eq!(
            first_media_url(output).as_deref(),
            Some("https://cdn.example.com/v.mp4")
        );
        assert_eq!(first_media_url("nothing here\n"), None);
    }

    #[test]
    fn missing_program_is_a_resolution_failure() {
        let resolver = StreamResolver::new(
            "flickwav-no-such-resolver",
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(
            resolver.resolve("https://example.com/watch"),
            Err(PlayerError::StreamResolution(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn echoing_program_resolves() {
        let resolver = StreamResolver::new("echo", Vec::new(), Duration::from_secs(5));
        assert_eq!(
            resolver.resolve("https://example.com/direct.mp4").ok().as_deref(),
            Some("https://example.com/direct.mp4")
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_noise_does_not_hide_the_url() {
        let resolver = StreamResolver::new(
            "sh",
            vec![
                "-c".into(),
                r"printf 'warn \377\376\nhttps://cdn.example.com/v.mp4\n'".into(),
            ],
            Duration::from_secs(5),
        );
        assert_eq!(
            resolver.resolve("ignored").ok().as_deref(),
            Some("https://cdn.example.com/v.mp4")
        );
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_fails_even_with_output() {
        let resolver = StreamResolver::new(
            "sh",
            vec!["-c".into(), "echo https://example.com/x.mp4; exit 3".into()],
            Duration::from_secs(5),
        );
        assert!(resolver.resolve("ignored").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn slow_program_times_out() {
        let resolver = StreamResolver::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(200),
        );
        let err = resolver.resolve("ignored").expect_err("should time out");
        assert!(err.to_string().contains("did not finish"));
    }
}
