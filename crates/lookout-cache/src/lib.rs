//! # lookout-cache
//!
//! Resilient cache layer for the Lookout gateway: key/value caching, user
//! sessions, query-result memoization, pattern-based invalidation and
//! distributed locks behind one contract.
//!
//! ## Overview
//!
//! The main trait is [`CacheStore`]. Four implementations sit behind it:
//!
//! - [`ClusterCache`]: sharded Redis/Valkey deployment
//! - [`SingleNodeCache`]: one endpoint with an optional database selector
//! - [`MemoryCache`]: in-process fallback for degraded operation
//! - [`ReconnectingCache`]: starts on the fallback and swaps to a live backend
//!   as soon as it becomes reachable
//!
//! Consumers hold an `Arc<dyn CacheStore>` and never learn which one they got.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lookout_cache::{
//!     CacheStore, CacheStoreExt, SingleNodeCache, SingleNodeSettings, UserSession,
//! };
//!
//! let store: Arc<dyn CacheStore> =
//!     Arc::new(SingleNodeCache::connect(&SingleNodeSettings::new("localhost:6379")).await?);
//!
//! let mut session = UserSession::new("tok1", "t1", "alice").with_roles(["admin"]);
//! store.set_session(&mut session).await?;
//! store.set_json("report:42", &report, Duration::ZERO).await?;
//! ```

mod error;
pub mod keys;
mod memory;
pub mod metrics;
mod redis;
mod settings;
mod store;
mod supervisor;
mod types;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use self::redis::{ClusterCache, PoolHandle, RedisCache, SingleNodeCache, parse_memory_info};
pub use settings::{ClusterSettings, ConnectOptions, LiveTarget, SingleNodeSettings};
pub use store::{CacheStore, CacheStoreExt};
pub use supervisor::{Connector, ReconnectingCache};
pub use types::{BackendKind, CacheMemoryInfo, CacheValue, UserSession};
