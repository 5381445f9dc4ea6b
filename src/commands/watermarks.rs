//! Watermark maintenance: the bulk clear operation.

use serde_json::{json, Value};

use crate::error::Result;
use crate::store::Store;
use crate::watermarks::WatermarkStore;

/// Delete all watermarks; the next digest processes everything fresh.
pub fn clear(store: &Store) -> Result<Value> {
    let watermark_store = WatermarkStore::new(store.dir());
    let existed = watermark_store.exists();
    watermark_store.clear();

    Ok(json!({
        "success": true,
        "cleared": existed,
    }))
}
