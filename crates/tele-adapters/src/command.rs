//! Colaboradores externos invocados como procesos.
//!
//! - `CommandScraper`: `<cmd> <channel> <limit>`, con `TELEFLOW_IMAGES_DIR` en
//!   el entorno; stdout debe ser un array JSON de mensajes.
//! - `CommandDetector`: `<cmd> <image>`; stdout debe ser
//!   `[{"label": .., "confidence": ..}, ..]`.
use std::path::Path;
use std::process::{Command, Output};

use log::debug;
use serde_json::Value;
use tele_domain::{ChannelScraper, Detection, Detector, DetectorError, ScrapeError};

pub const IMAGES_DIR_ENV: &str = "TELEFLOW_IMAGES_DIR";

/// Programa y argumentos fijos, separados por espacios.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self { program,
                    args: parts.collect() })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

fn stderr_tail(out: &Output) -> String {
    let text = String::from_utf8_lossy(&out.stderr);
    let trimmed = text.trim();
    let start = trimmed.len().saturating_sub(400);
    let start = (start..=trimmed.len()).find(|&i| trimmed.is_char_boundary(i)).unwrap_or(0);
    format!("exit status {}: {}", out.status, &trimmed[start..])
}

#[derive(Debug, Clone)]
pub struct CommandScraper {
    line: CommandLine,
}

impl CommandScraper {
    /// `None` si la línea de comandos está vacía.
    pub fn new(command_line: &str) -> Option<Self> {
        CommandLine::parse(command_line).map(|line| Self { line })
    }
}

impl ChannelScraper for CommandScraper {
    fn scrape(&self, channel: &str, limit: usize, images_dir: &Path) -> Result<Vec<Value>, ScrapeError> {
        debug!("scraping '{channel}' via {}", self.line.program);
        let out = self.line
                      .command()
                      .arg(channel)
                      .arg(limit.to_string())
                      .env(IMAGES_DIR_ENV, images_dir)
                      .output()
                      .map_err(|e| ScrapeError::Failed { channel: channel.to_string(),
                                                         reason: e.to_string() })?;
        if !out.status.success() {
            return Err(ScrapeError::Failed { channel: channel.to_string(),
                                             reason: stderr_tail(&out) });
        }
        match serde_json::from_slice::<Value>(&out.stdout) {
            Ok(Value::Array(messages)) => Ok(messages),
            Ok(_) => Err(ScrapeError::Output { channel: channel.to_string(),
                                               reason: "expected a JSON array".into() }),
            Err(e) => Err(ScrapeError::Output { channel: channel.to_string(),
                                                reason: e.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandDetector {
    line: CommandLine,
}

impl CommandDetector {
    pub fn new(command_line: &str) -> Option<Self> {
        CommandLine::parse(command_line).map(|line| Self { line })
    }
}

impl Detector for CommandDetector {
    fn detect(&self, artifact: &Path) -> Result<Vec<Detection>, DetectorError> {
        if !artifact.is_file() {
            return Err(DetectorError::Unreadable(artifact.display().to_string()));
        }
        let out = self.line
                      .command()
                      .arg(artifact)
                      .output()
                      .map_err(|e| DetectorError::Invocation(e.to_string()))?;
        if !out.status.success() {
            return Err(DetectorError::Invocation(stderr_tail(&out)));
        }
        serde_json::from_slice(&out.stdout).map_err(|e| DetectorError::Output(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_splits_program_and_args() {
        let line = CommandLine::parse("  python3 detect.py --model yolov8n.pt ").expect("line");
        assert_eq!(line.program, "python3");
        assert_eq!(line.args, vec!["detect.py", "--model", "yolov8n.pt"]);
        assert!(CommandLine::parse("   ").is_none());
    }

    #[test]
    fn detector_rejects_missing_artifact_without_spawning() {
        let detector = CommandDetector::new("definitely-not-a-real-binary").expect("detector");
        let err = detector.detect(Path::new("/no/such/image.jpg")).expect_err("missing file");
        assert!(matches!(err, DetectorError::Unreadable(_)));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path.display().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn scraper_passes_channel_limit_and_images_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cmd = script(dir.path(),
                         "scrape.sh",
                         r#"echo "[{\"id\": 1, \"channel\": \"$1\", \"limit\": $2, \"images\": \"$TELEFLOW_IMAGES_DIR\"}]""#);
        let scraper = CommandScraper::new(&cmd).expect("scraper");
        let messages = scraper.scrape("CheMed123", 5, Path::new("/tmp/imgs")).expect("scrape");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["channel"], "CheMed123");
        assert_eq!(messages[0]["limit"], 5);
        assert_eq!(messages[0]["images"], "/tmp/imgs");
    }

    #[cfg(unix)]
    #[test]
    fn detector_parses_detections_and_reports_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("7.jpg");
        std::fs::write(&image, b"jpg").expect("image");

        let ok = script(dir.path(), "ok.sh", r#"echo '[{"label": "box", "confidence": 0.9}, {"label": "bag", "confidence": 0.3}]'"#);
        let detections = CommandDetector::new(&ok).expect("detector").detect(&image).expect("detect");
        assert_eq!(detections, vec![Detection::new("box", 0.9), Detection::new("bag", 0.3)]);

        let failing = script(dir.path(), "fail.sh", "echo 'model missing' >&2; exit 3");
        let err = CommandDetector::new(&failing).expect("detector").detect(&image).expect_err("fails");
        assert!(matches!(err, DetectorError::Invocation(msg) if msg.contains("model missing")));
    }
}
