use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use log::{error, info};

use crate::error::BabyVisionError;
use crate::vision::{ImageprocBackend, VisionBackend};

/// A loaded vision backend, shared by every pipeline of the session.
pub type SharedBackend = Arc<dyn VisionBackend>;

/// Produces the vision backend.
#[async_trait(?Send)]
pub trait BackendSource {
    async fn load(&self) -> Result<SharedBackend, BabyVisionError>;
}

/// Resolves immediately to the built-in [`ImageprocBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSource;

#[async_trait(?Send)]
impl BackendSource for BuiltinSource {
    async fn load(&self) -> Result<SharedBackend, BabyVisionError> {
        Ok(Arc::new(ImageprocBackend))
    }
}

type Readiness = Shared<LocalBoxFuture<'static, Option<SharedBackend>>>;

/// Loads the vision backend once and tells every interested party when it is
/// ready.
///
/// The load runs the first time any readiness future is polled and its result
/// is handed to all of them. A failed load is logged, resolves readiness to
/// `None` and is never retried.
#[derive(Clone)]
pub struct LibraryLoader {
    ready: Readiness,
}

impl LibraryLoader {
    pub fn start<S>(source: S) -> Self
    where
        S: BackendSource + 'static,
    {
        let ready = async move {
            match source.load().await {
                Ok(backend) => {
                    info!("vision library {} is ready", backend.name());
                    Some(backend)
                }
                Err(e) => {
                    error!("failed to load vision library: {e}");
                    None
                }
            }
        }
        .boxed_local()
        .shared();

        Self { ready }
    }

    /// Loader for the built-in backend.
    pub fn builtin() -> Self {
        Self::start(BuiltinSource)
    }

    /// Resolves once the load has finished.
    pub fn ready(&self) -> Readiness {
        self.ready.clone()
    }

    /// The backend, if loading has already finished successfully.
    pub fn peek(&self) -> Option<SharedBackend> {
        self.ready.peek().cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSource {
        loads: Rc<Cell<usize>>,
        fail: bool,
    }

    #[async_trait(?Send)]
    impl BackendSource for CountingSource {
        async fn load(&self) -> Result<SharedBackend, BabyVisionError> {
            self.loads.set(self.loads.get() + 1);
            if self.fail {
                Err(BabyVisionError::BackendUnavailable)
            } else {
                Ok(Arc::new(ImageprocBackend))
            }
        }
    }

    #[test]
    fn every_waiter_sees_the_same_single_load() {
        let loads = Rc::new(Cell::new(0));
        let loader = LibraryLoader::start(CountingSource {
            loads: loads.clone(),
            fail: false,
        });

        let first = block_on(loader.ready());
        let second = block_on(loader.clone().ready());
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn peek_is_empty_until_resolved() {
        let loader = LibraryLoader::builtin();
        assert!(loader.peek().is_none());
        block_on(loader.ready());
        assert_eq!(loader.peek().map(|b| b.name().to_string()), Some("imageproc".to_string()));
    }

    #[test]
    fn failed_load_stays_failed() {
        let loads = Rc::new(Cell::new(0));
        let loader = LibraryLoader::start(CountingSource {
            loads: loads.clone(),
            fail: true,
        });

        assert!(block_on(loader.ready()).is_none());
        assert!(block_on(loader.ready()).is_none());
        assert!(loader.peek().is_none());
        assert_eq!(loads.get(), 1);
    }
}
