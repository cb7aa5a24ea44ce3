//! Synchronization primitives.
//!
//! All primitives are async-aware and `Send + Sync`, so they can be shared
//! across tasks. Channels support the multi-producer patterns the player
//! relies on (one command queue, many submitters).

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
