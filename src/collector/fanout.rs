//! Fan-out / fan-in executor for per-host probe tasks.
//!
//! Tasks are launched one at a time with a small stagger so the local
//! network stack is not hit by a burst of sockets, optionally capped by a
//! semaphore, and their results are collected over an MPSC channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};

use crate::collector::hosts::Host;

/// Launch policy for one probing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Delay between consecutive task launches.
    pub stagger: Duration,
    /// Upper bound on concurrently running tasks (`None` = unbounded).
    pub max_in_flight: Option<usize>,
}

impl FanOut {
    pub fn new(stagger: Duration) -> Self {
        Self {
            stagger,
            max_in_flight: None,
        }
    }

    /// Cap the number of concurrently running tasks.
    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.filter(|n| *n > 0);
        self
    }

    /// Run `task` once per host and wait for every result.
    ///
    /// Results arrive in completion order, not launch order. A task that
    /// panics contributes no result; the shortfall is logged.
    pub async fn run<T, F, Fut>(&self, hosts: Vec<Host>, task: F) -> Vec<(Host, T)>
    where
        F: Fn(Host) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let expected = hosts.len();
        if expected == 0 {
            return Vec::new();
        }

        let (tx, mut rx) = mpsc::channel(expected);
        let limiter = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));

        for (i, host) in hosts.into_iter().enumerate() {
            if i > 0 && !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }

            // The semaphore is never closed, so acquisition only fails if it is.
            let permit = match &limiter {
                Some(sem) => Arc::clone(sem).acquire_owned().await.ok(),
                None => None,
            };

            let fut = task(host.clone());
            let tx = tx.clone();
            tokio::spawn(async move {
                let output = fut.await;
                drop(permit);
                let _ = tx.send((host, output)).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        if results.len() != expected {
            tracing::warn!(
                expected,
                received = results.len(),
                "Some probe tasks ended without reporting a result"
            );
        }
        results
    }
}
