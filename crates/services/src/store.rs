// Path: crates/services/src/store.rs
//! Typed read/write helpers over raw state keys.

use meridian_api::state::StateAccess;
use meridian_types::codec;
use meridian_types::error::StateError;
use parity_scale_codec::{Decode, Encode};

pub(crate) fn get_typed<T: Decode>(
    state: &dyn StateAccess,
    key: &[u8],
) -> Result<Option<T>, StateError> {
    match state.get(key)? {
        Some(bytes) => Ok(Some(
            codec::from_bytes_canonical(&bytes).map_err(StateError::Decode)?,
        )),
        None => Ok(None),
    }
}

pub(crate) fn put_typed<T: Encode>(
    state: &mut dyn StateAccess,
    key: &[u8],
    value: &T,
) -> Result<(), StateError> {
    let bytes = codec::to_bytes_canonical(value).map_err(StateError::InvalidValue)?;
    state.insert(key, &bytes)
}
