//! Engine lease: one rendering engine reused for a bounded number of tasks,
//! then torn down and relaunched.

use std::sync::Arc;

use super::{Launcher, RenderResult, RenderSurface, Renderer};

pub struct EngineLease {
    launcher: Arc<dyn Launcher>,
    engine: Option<Box<dyn Renderer>>,
    max_uses: usize,
    uses: usize,
    launches: usize,
}

impl EngineLease {
    /// `max_uses` of zero disables recycling.
    pub fn new(launcher: Arc<dyn Launcher>, max_uses: usize) -> Self {
        Self {
            launcher,
            engine: None,
            max_uses,
            uses: 0,
            launches: 0,
        }
    }

    /// Open a fresh surface, launching the engine first if none is running.
    pub async fn surface(&mut self) -> RenderResult<Box<dyn RenderSurface>> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                let engine = self.launcher.launch().await?;
                self.launches += 1;
                engine
            }
        };
        let surface = engine.new_surface().await;
        self.engine = Some(engine);
        surface
    }

    /// Count one task served by the current engine.
    pub fn record_use(&mut self) {
        self.uses += 1;
    }

    /// Tear the engine down if it has served its quota. Returns true when a
    /// recycle happened; the next `surface` call relaunches.
    pub async fn recycle_if_due(&mut self) -> bool {
        if self.max_uses == 0 || self.uses < self.max_uses {
            return false;
        }
        tracing::info!("Recycling rendering engine after {} tasks", self.uses);
        self.shutdown().await;
        true
    }

    /// Shut the current engine down. Close failures are logged, not raised.
    pub async fn shutdown(&mut self) {
        self.uses = 0;
        if let Some(engine) = self.engine.take() {
            if let Err(e) = engine.shutdown().await {
                tracing::warn!("Error closing rendering engine: {e}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    /// Engines started over the lifetime of the lease.
    pub fn launches(&self) -> usize {
        self.launches
    }

    pub fn uses(&self) -> usize {
        self.uses
    }
}
