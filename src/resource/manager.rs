//! Resource manager: budget counters, reservations, deadline latch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Fixed per-run resource budget
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourcePool {
    /// Parallel CPU slots
    pub cpu_slots: usize,
    /// Memory budget in MiB
    pub memory_mb: u64,
    /// GPU devices
    pub gpus: usize,
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self { cpu_slots: 4, memory_mb: 8192, gpus: 0 }
    }
}

/// One trial's resource demand
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cpu_slots: usize,
    pub memory_mb: u64,
    pub gpus: usize,
}

/// Why a reservation was refused
///
/// Denial is a stop signal, not a retry hint: the caller must stop
/// scheduling new trials at the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReserveDenied {
    #[error("cpu budget exhausted")]
    Cpu,

    #[error("memory budget exhausted")]
    Memory,

    #[error("gpu budget exhausted")]
    Gpu,

    #[error("run deadline reached")]
    DeadlineReached,

    #[error("remaining time below minimum viable trial duration")]
    InsufficientTime,
}

#[derive(Debug, Default)]
struct Usage {
    cpu_slots: usize,
    memory_mb: u64,
    gpus: usize,
}

/// Tracks usage against the budget and the run deadline
///
/// Over-subscription is never allowed. Deadline expiry is monotonic: once
/// observed, the latch stays set and every later reservation is denied even
/// if capacity frees up.
#[derive(Debug)]
pub struct ResourceManager {
    pool: ResourcePool,
    used: Mutex<Usage>,
    deadline: Instant,
    min_trial_duration: Duration,
    expired: AtomicBool,
}

impl ResourceManager {
    /// New manager; the deadline is `time_limit` from now
    #[must_use]
    pub fn new(pool: ResourcePool, time_limit: Duration, min_trial_duration: Duration) -> Self {
        Self {
            pool,
            used: Mutex::new(Usage::default()),
            deadline: Instant::now() + time_limit,
            min_trial_duration,
            expired: AtomicBool::new(false),
        }
    }

    /// The configured budget
    #[must_use]
    pub fn pool(&self) -> ResourcePool {
        self.pool
    }

    /// Wall-clock time left before the deadline
    #[must_use]
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed (latching)
    #[must_use]
    pub fn deadline_expired(&self) -> bool {
        if self.expired.load(Ordering::SeqCst) {
            return true;
        }
        if Instant::now() >= self.deadline {
            self.expired.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    /// Reserve capacity for one trial
    ///
    /// Denied if any budget dimension would be exceeded, the deadline has
    /// passed, or the remaining time is below the minimum viable trial
    /// duration. The returned [`Allocation`] releases on drop.
    pub fn try_reserve(&self, request: ResourceRequest) -> Result<Allocation<'_>, ReserveDenied> {
        if self.deadline_expired() {
            return Err(ReserveDenied::DeadlineReached);
        }
        if self.remaining_time() < self.min_trial_duration {
            return Err(ReserveDenied::InsufficientTime);
        }

        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        if used.cpu_slots + request.cpu_slots > self.pool.cpu_slots {
            return Err(ReserveDenied::Cpu);
        }
        if used.memory_mb + request.memory_mb > self.pool.memory_mb {
            return Err(ReserveDenied::Memory);
        }
        if used.gpus + request.gpus > self.pool.gpus {
            return Err(ReserveDenied::Gpu);
        }
        used.cpu_slots += request.cpu_slots;
        used.memory_mb += request.memory_mb;
        used.gpus += request.gpus;
        debug!(
            cpu = used.cpu_slots,
            memory_mb = used.memory_mb,
            gpus = used.gpus,
            "reservation granted"
        );
        Ok(Allocation { manager: self, request })
    }

    /// Current usage snapshot `(cpu_slots, memory_mb, gpus)`
    #[must_use]
    pub fn usage(&self) -> (usize, u64, usize) {
        let used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        (used.cpu_slots, used.memory_mb, used.gpus)
    }

    fn release(&self, request: ResourceRequest) {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        used.cpu_slots = used.cpu_slots.saturating_sub(request.cpu_slots);
        used.memory_mb = used.memory_mb.saturating_sub(request.memory_mb);
        used.gpus = used.gpus.saturating_sub(request.gpus);
    }
}

/// Granted reservation; releases its capacity when dropped
#[derive(Debug)]
pub struct Allocation<'a> {
    manager: &'a ResourceManager,
    request: ResourceRequest,
}

impl Allocation<'_> {
    /// The reserved amounts
    #[must_use]
    pub fn request(&self) -> ResourceRequest {
        self.request
    }
}

impl Drop for Allocation<'_> {
    fn drop(&mut self) {
        self.manager.release(self.request);
    }
}
