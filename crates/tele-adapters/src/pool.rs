//! Pool de workers acotado para el trabajo interno de un stage.
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Pool rayon con `concurrency` hilos (mínimo 1), nombrados `<prefix>-<n>`.
pub fn worker_pool(prefix: &str, concurrency: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    let prefix = prefix.to_string();
    ThreadPoolBuilder::new().num_threads(concurrency.max(1))
                            .thread_name(move |i| format!("{prefix}-{i}"))
                            .build()
}
