//! Common type aliases

// some of the imports here are not used yet, but are pre-defined for symmetry
#![allow(unused)]

// Anyhow error handling
pub use anyhow::{anyhow, bail, ensure, Context, Result};

// Common synchronization types
pub use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};

// hashbrown Hash* types
pub use hashbrown::{HashMap, HashSet};

// Generation-wide random number generator
pub use strata_schemas::rng::{stage_seed, GenRng, RegionSeeder};
