//! Display ordering of an exercise's media set.

use crate::error::{MediaError, MediaResult};
use crate::models::{MediaAsset, OrderUpdate};
use std::collections::HashSet;

/// Stable sort by the server-assigned `order` value.
pub fn sort_by_order(assets: &mut [MediaAsset]) {
    assets.sort_by_key(|a| a.order);
}

/// Rewrite `order` to 1..N following sequence position and return the full mapping.
pub fn assign_sequential_order(assets: &mut [MediaAsset]) -> Vec<OrderUpdate> {
    assets
        .iter_mut()
        .enumerate()
        .map(|(index, asset)| {
            asset.order = index as i32 + 1;
            OrderUpdate {
                id: asset.id.clone(),
                order: asset.order,
            }
        })
        .collect()
}

/// Arrange `current` in the order given by `sequence`.
///
/// The sequence must name every asset of `current` exactly once; anything else
/// is a [`MediaError::Validation`] and nothing is returned.
pub fn arrange<S: AsRef<str>>(
    current: &[MediaAsset],
    sequence: &[S],
) -> MediaResult<Vec<MediaAsset>> {
    let mut seen = HashSet::with_capacity(sequence.len());
    let mut arranged = Vec::with_capacity(sequence.len());
    for id in sequence {
        let id = id.as_ref();
        if !seen.insert(id) {
            return Err(MediaError::Validation(format!(
                "Media {} is listed more than once",
                id
            )));
        }
        let asset = current.iter().find(|m| m.id == id).ok_or_else(|| {
            MediaError::Validation(format!("Media {} is not part of this exercise", id))
        })?;
        arranged.push(asset.clone());
    }
    if arranged.len() != current.len() {
        return Err(MediaError::Validation(format!(
            "Reorder must list all {} media items exactly once",
            current.len()
        )));
    }
    Ok(arranged)
}

/// Move the element at `from` so that it ends up at index `to`.
///
/// Returns false and leaves the sequence untouched when either index is out of range.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}
