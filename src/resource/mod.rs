//! Resource budget tracking
//!
//! One [`ResourceManager`] per run owns the only scheduling state mutated by
//! multiple workers: usage counters behind a mutex plus a latched deadline
//! flag. Allocations release on drop, so a panicking trial cannot leak
//! capacity.

mod manager;

pub use manager::{
    Allocation, ReserveDenied, ResourceManager, ResourcePool, ResourceRequest,
};
