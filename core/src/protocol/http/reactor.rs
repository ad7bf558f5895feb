/*
 * reactor.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Divhttp, an HTTP client engine.
 *
 * Divhttp is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Divhttp is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Divhttp.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Background worker pool shared by every session of one request manager.
//!
//! A multi-thread tokio runtime with a fixed number of workers. A panicking session task is
//! caught by the runtime and reported as an aborted call; the workers keep running.

use std::future::Future;
use std::sync::Mutex;
use std::thread::JoinHandle as ThreadHandle;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;

use crate::error::{ConfigError, HttpError};

/// How long `stop` lets in-flight sessions wind down before the workers are torn down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Default)]
struct State {
    runtime: Option<Runtime>,
    /// Thread tearing down a stopped runtime; taken by `join`.
    stopping: Option<ThreadHandle<()>>,
}

pub struct Reactor {
    state: Mutex<State>,
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Launch `threads` workers (at least one). Does nothing if already running.
    pub fn start(&self, threads: usize) -> Result<(), ConfigError> {
        let mut state = self.state();
        if state.runtime.is_some() {
            return Ok(());
        }
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("divhttp-reactor")
            .on_thread_start(|| tracing::debug!("reactor worker started"))
            .on_thread_stop(|| tracing::debug!("reactor worker stopped"))
            .enable_all()
            .build()
            .map_err(ConfigError::Reactor)?;
        tracing::info!(threads, "reactor started");
        state.runtime = Some(runtime);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state().runtime.is_some()
    }

    pub fn handle(&self) -> Option<Handle> {
        self.state().runtime.as_ref().map(|rt| rt.handle().clone())
    }

    /// Run `fut` on the workers. The receiver yields its output, or `Aborted` if the task
    /// panicked or the reactor went away first.
    pub fn submit<F, T>(&self, fut: F) -> oneshot::Receiver<Result<T, HttpError>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = match self.handle() {
            Some(h) => h,
            None => {
                let _ = tx.send(Err(HttpError::Aborted("reactor is not running".to_string())));
                return rx;
            }
        };
        let task = handle.spawn(fut);
        handle.spawn(async move {
            let outcome = match task.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_panic() => {
                    tracing::error!("session task panicked: {}", e);
                    Err(HttpError::Aborted("session task panicked".to_string()))
                }
                Err(e) => Err(HttpError::Aborted(format!("session task cancelled: {}", e))),
            };
            // The caller may have stopped waiting.
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Stop accepting work and begin tearing down the workers. In-flight sessions get a short
    /// grace period. Safe to call more than once.
    pub fn stop(&self) {
        let mut state = self.state();
        let runtime = match state.runtime.take() {
            Some(rt) => rt,
            None => return,
        };
        tracing::info!("reactor stopping");
        // Runtime teardown blocks, which is not allowed on a runtime thread.
        let spawned = std::thread::Builder::new()
            .name("divhttp-reactor-stop".to_string())
            .spawn(move || runtime.shutdown_timeout(SHUTDOWN_GRACE));
        match spawned {
            Ok(t) => state.stopping = Some(t),
            Err(e) => tracing::error!("could not spawn reactor shutdown thread: {}", e),
        }
    }

    /// Wait until the workers of a stopped reactor have exited.
    pub fn join(&self) {
        let stopping = self.state().stopping.take();
        if let Some(t) = stopping {
            if t.join().is_err() {
                tracing::error!("reactor shutdown thread panicked");
            }
            tracing::info!("reactor stopped");
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
