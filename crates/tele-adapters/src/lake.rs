//! Layout del data lake.
//!
//! ```text
//! <root>/telegram_messages/<YYYY-MM-DD>/<channel>.json   (un array JSON por canal y día)
//! <root>/telegram_images/<record_id>.jpg
//! ```
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::debug;
use serde_json::Value;
use tele_domain::{ArtifactRef, RecordId};
use walkdir::WalkDir;

pub const MESSAGES_DIR: &str = "telegram_messages";
pub const IMAGES_DIR: &str = "telegram_images";
const PARTITION_FORMAT: &str = "%Y-%m-%d";

/// Un archivo de mensajes: la unidad transaccional del loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// Derivado del nombre del archivo (sin extensión).
    pub channel: String,
    /// Derivado del directorio padre, si es una fecha.
    pub partition: Option<NaiveDate>,
}

impl SourceUnit {
    /// Etiqueta para logs: `<fecha>/<canal>.json`.
    pub fn label(&self) -> String {
        match self.partition {
            Some(d) => format!("{}/{}.json", d.format(PARTITION_FORMAT), self.channel),
            None => format!("{}.json", self.channel),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataLake {
    root: PathBuf,
}

impl DataLake {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn messages_dir(&self) -> PathBuf {
        self.root.join(MESSAGES_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.messages_dir())?;
        fs::create_dir_all(self.images_dir())
    }

    pub fn partition_file(&self, date: NaiveDate, channel: &str) -> PathBuf {
        self.messages_dir()
            .join(date.format(PARTITION_FORMAT).to_string())
            .join(format!("{channel}.json"))
    }

    /// Escribe la partición de un canal de forma atómica (archivo temporal +
    /// rename): un loader concurrente nunca ve un archivo a medio escribir.
    pub fn write_partition(&self, date: NaiveDate, channel: &str, messages: &[Value]) -> io::Result<PathBuf> {
        let target = self.partition_file(date, channel);
        let dir = target.parent().map(Path::to_path_buf).unwrap_or_else(|| self.messages_dir());
        fs::create_dir_all(&dir)?;
        let tmp = dir.join(format!(".{channel}.json.tmp"));
        let body = serde_json::to_vec_pretty(messages).map_err(io::Error::other)?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &target)?;
        debug!("wrote {} messages to {}", messages.len(), target.display());
        Ok(target)
    }

    /// Archivos `*.json` bajo `telegram_messages/`, ordenados por fecha y
    /// luego por canal. Un directorio inexistente equivale a un lake vacío.
    pub fn source_units(&self) -> io::Result<Vec<SourceUnit>> {
        let dir = self.messages_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut units = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let Some(channel) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if channel.starts_with('.') {
                continue;
            }
            let partition = path.parent()
                                .and_then(|p| p.file_name())
                                .and_then(|n| NaiveDate::parse_from_str(&n.to_string_lossy(), PARTITION_FORMAT).ok());
            units.push(SourceUnit { path: path.to_path_buf(),
                                    channel,
                                    partition });
        }
        units.sort_by(|a, b| (a.partition, &a.channel, &a.path).cmp(&(b.partition, &b.channel, &b.path)));
        Ok(units)
    }

    /// Imágenes `<record_id>.jpg`, ordenadas por id. Los nombres no numéricos
    /// se ignoran.
    pub fn image_artifacts(&self) -> io::Result<Vec<ArtifactRef>> {
        let dir = self.images_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut artifacts = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |e| e != "jpg") {
                continue;
            }
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            match stem.parse::<RecordId>() {
                Ok(record_id) => artifacts.push(ArtifactRef { record_id, path }),
                Err(_) => debug!("ignoring image with non-numeric name: {}", path.display()),
            }
        }
        artifacts.sort_by_key(|a| a.record_id);
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn units_are_ordered_by_partition_then_channel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lake = DataLake::new(dir.path());
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 1).expect("date");
        let d2 = NaiveDate::from_ymd_opt(2024, 5, 2).expect("date");
        lake.write_partition(d2, "tikvahpharma", &[json!({"id": 1})]).expect("write");
        lake.write_partition(d1, "tikvahpharma", &[json!({"id": 1})]).expect("write");
        lake.write_partition(d1, "CheMed123", &[json!({"id": 2})]).expect("write");

        let labels: Vec<String> = lake.source_units().expect("units").iter().map(SourceUnit::label).collect();
        assert_eq!(labels,
                   vec!["2024-05-01/CheMed123.json", "2024-05-01/tikvahpharma.json", "2024-05-02/tikvahpharma.json"]);
    }

    #[test]
    fn only_numeric_jpgs_are_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lake = DataLake::new(dir.path());
        lake.ensure_dirs().expect("dirs");
        for name in ["12.jpg", "3.jpg", "logo.jpg", "4.png"] {
            fs::write(lake.images_dir().join(name), b"x").expect("write");
        }
        let ids: Vec<RecordId> = lake.image_artifacts().expect("artifacts").iter().map(|a| a.record_id).collect();
        assert_eq!(ids, vec![3, 12]);
    }

    #[test]
    fn missing_lake_is_empty() {
        let lake = DataLake::new("/definitely/not/a/lake");
        assert!(lake.source_units().expect("units").is_empty());
        assert!(lake.image_artifacts().expect("artifacts").is_empty());
    }
}
