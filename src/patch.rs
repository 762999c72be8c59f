//! Field-by-field patching of one serializable value onto another.
//!
//! Both sides are viewed through their serde representation: a patch is a JSON
//! object whose keys name target fields.

use crate::model::ID_COLUMN;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("{0} is not an object")]
    NotAnObject(&'static str),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Copy every non-null field of `patch` that also exists on `target`.
/// `id` is never copied and unknown keys are ignored. Returns whether `target` changed.
pub fn merge(target: &mut Value, patch: &Value) -> Result<bool, PatchError> {
    let patch = patch.as_object().ok_or(PatchError::NotAnObject("patch"))?;
    let target = target.as_object_mut().ok_or(PatchError::NotAnObject("target"))?;
    let mut changed = false;
    for (key, value) in patch {
        if key == ID_COLUMN || value.is_null() {
            continue;
        }
        if let Some(slot) = target.get_mut(key) {
            if slot != value {
                *slot = value.clone();
                changed = true;
            }
        }
    }
    Ok(changed)
}

/// Patch `patch` onto a typed value. Fails without touching `target` when a
/// patched field does not fit the target's field type.
pub fn patch_struct<T>(target: &mut T, patch: &Value) -> Result<bool, PatchError>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(&*target)?;
    if !merge(&mut value, patch)? {
        return Ok(false);
    }
    *target = serde_json::from_value(value)?;
    Ok(true)
}
