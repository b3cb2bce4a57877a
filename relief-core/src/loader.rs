/// One-shot heightmap load tasks
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::error::{ReliefError, Result};
use crate::heightfield::Heightfield;
use crate::scene::SceneCommand;

/// Shared flag checked by a load task before it reports back.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ReliefError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A decode running off the render loop.
///
/// The result arrives on the command channel as a [`SceneCommand`]; a
/// cancelled task sends nothing.
#[derive(Debug)]
pub struct LoadTask {
    source: String,
    token: CancelToken,
    #[cfg(not(target_arch = "wasm32"))]
    handle: Option<std::thread::JoinHandle<()>>,
    #[cfg(target_arch = "wasm32")]
    done: Arc<AtomicBool>,
}

impl LoadTask {
    /// Read and decode `path` on a worker thread.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn_path(path: PathBuf, sender: Sender<SceneCommand>) -> Self {
        let source = path.display().to_string();
        Self::spawn_job(source, sender, move || Heightfield::from_path(&path))
    }

    /// Decode bytes the host already read, e.g. from a dropped file.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn_bytes(source: impl Into<String>, bytes: Vec<u8>, sender: Sender<SceneCommand>) -> Self {
        Self::spawn_job(source.into(), sender, move || Heightfield::from_bytes(&bytes))
    }

    /// Decode bytes handed over by the page. Runs as a local future once
    /// the current event callback returns.
    #[cfg(target_arch = "wasm32")]
    pub fn spawn_bytes(source: impl Into<String>, bytes: Vec<u8>, sender: Sender<SceneCommand>) -> Self {
        let source = source.into();
        let token = CancelToken::new();
        let done = Arc::new(AtomicBool::new(false));

        let task_token = token.clone();
        let task_source = source.clone();
        let task_done = done.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = task_token
                .check()
                .and_then(|_| Heightfield::from_bytes(&bytes));
            finish(task_source, result, &task_token, &sender);
            task_done.store(true, Ordering::Release);
        });

        Self {
            source,
            token,
            done,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn spawn_job<F>(source: String, sender: Sender<SceneCommand>, job: F) -> Self
    where
        F: FnOnce() -> Result<Heightfield> + Send + 'static,
    {
        let token = CancelToken::new();

        let task_token = token.clone();
        let task_source = source.clone();
        let task_sender = sender.clone();
        let spawned = std::thread::Builder::new()
            .name("relief-load".to_string())
            .spawn(move || {
                let result = task_token.check().and_then(|_| job());
                finish(task_source, result, &task_token, &task_sender);
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not spawn load thread");
                finish(source.clone(), Err(ReliefError::Spawn(e)), &token, &sender);
                None
            }
        };

        Self {
            source,
            token,
            handle,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Whether the task has stopped running
    pub fn is_finished(&self) -> bool {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.handle.as_ref().map_or(true, |h| h.is_finished())
        }
        #[cfg(target_arch = "wasm32")]
        {
            self.done.load(Ordering::Acquire)
        }
    }
}

fn finish(
    source: String,
    result: Result<Heightfield>,
    token: &CancelToken,
    sender: &Sender<SceneCommand>,
) {
    let command = match result.and_then(|field| token.check().map(|_| field)) {
        Ok(heightfield) => SceneCommand::ReplaceMesh {
            source,
            heightfield,
        },
        Err(ReliefError::Cancelled) => {
            debug!(%source, "load cancelled, dropping result");
            return;
        }
        Err(error) => SceneCommand::LoadFailed { source, error },
    };

    if sender.send(command).is_err() {
        debug!("render loop gone, dropping load result");
    }
}
