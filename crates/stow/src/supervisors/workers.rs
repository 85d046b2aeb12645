//! 🧵 Workers: the ones who actually do the work while the Supervisor takes
//! all the credit in the sprint retro.
//!
//! ⚠️ Private to `supervisors`. Workers answer to their supervisor and nobody else.

use tokio::task::JoinHandle;

mod upload_worker;
pub(super) use upload_worker::UploadWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// `start` hands the worker to the runtime and gives back a handle to await.
/// What comes back through the handle is whatever the worker wants its
/// supervisor to know when it's done.
pub(crate) trait Worker {
    type Output: Send + 'static;

    fn start(self) -> JoinHandle<Self::Output>;
}
