use std::sync::{Arc, RwLock};

use crate::error::StoreError;

// Type alias, not a new type, cannot define methods on it
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, StoreError>;
pub type StoreResult = Result<(), StoreError>;
