use std::fs;
use std::path::{Path, PathBuf};

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use log::{debug, info};
use tele_domain::{TransformError, Transformer};

use super::ConnectionProvider;
use crate::error::PersistenceError;

/// Fallo dentro de la transacción, con el script que lo produjo.
enum ScriptFailure {
    Db(diesel::result::Error),
    Script { name: String, source: diesel::result::Error },
}

impl From<diesel::result::Error> for ScriptFailure {
    fn from(e: diesel::result::Error) -> Self {
        ScriptFailure::Db(e)
    }
}

/// Transformación analítica: aplica los `*.sql` de un directorio, ordenados
/// por nombre, dentro de una única transacción (todo o nada).
pub struct SqlScriptTransformer<P: ConnectionProvider> {
    provider: P,
    dir: PathBuf,
}

impl<P: ConnectionProvider> SqlScriptTransformer<P> {
    pub fn new(provider: P, dir: impl Into<PathBuf>) -> Self {
        Self { provider,
               dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Scripts `*.sql` de `dir` ordenados por nombre de archivo.
pub fn load_scripts(dir: &Path) -> Result<Vec<(String, String)>, TransformError> {
    let entries = fs::read_dir(dir).map_err(|e| TransformError::Io(format!("{}: {e}", dir.display())))?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path()))
                                         .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == "sql"))
                                         .collect();
    paths.sort();
    paths.into_iter()
         .map(|p| {
             let name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
             let sql = fs::read_to_string(&p).map_err(|e| TransformError::Io(format!("{}: {e}", p.display())))?;
             Ok((name, sql))
         })
         .collect()
}

impl<P: ConnectionProvider> Transformer for SqlScriptTransformer<P> {
    fn transform(&self) -> Result<usize, TransformError> {
        let scripts = load_scripts(&self.dir)?;
        if scripts.is_empty() {
            info!("no transform scripts in {}", self.dir.display());
            return Ok(0);
        }
        let mut conn = self.provider
                           .connection()
                           .map_err(|e| TransformError::Store(e.into()))?;
        conn.build_transaction()
            .read_write()
            .run(|tx| {
                for (name, sql) in &scripts {
                    debug!("applying transform script {name}");
                    tx.batch_execute(sql).map_err(|source| ScriptFailure::Script { name: name.clone(), source })?;
                }
                Ok::<(), ScriptFailure>(())
            })
            .map_err(|failure| match failure {
                ScriptFailure::Db(e) => TransformError::Store(PersistenceError::from(e).into()),
                ScriptFailure::Script { name, source } => TransformError::Script { script: name,
                                                                                   reason: source.to_string() },
            })?;
        info!("applied {} transform script(s) from {}", scripts.len(), self.dir.display());
        Ok(scripts.len())
    }
}
