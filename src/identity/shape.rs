use super::{HostError, HostProperty, PlayerHandle, ProfileRef, PropertyField};
use std::sync::atomic::{AtomicU8, Ordering};

/// How the backing profile is reached on a given host build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileShape {
    /// Direct accessor method on the player handle.
    Method,
    /// Field lookup by declared profile type.
    TypedField,
}

impl ProfileShape {
    pub const ORDER: [ProfileShape; 2] = [ProfileShape::Method, ProfileShape::TypedField];

    pub(crate) fn resolve(self, handle: &dyn PlayerHandle) -> Result<ProfileRef, HostError> {
        match self {
            ProfileShape::Method => handle.profile_by_method(),
            ProfileShape::TypedField => handle.profile_by_field(),
        }
    }
}

/// How a single property field is read on a given host build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldShape {
    /// Getter style: getName / getValue / getSignature.
    Getter,
    /// Record style: name() / value() / signature().
    RecordAccessor,
}

impl FieldShape {
    pub const ORDER: [FieldShape; 2] = [FieldShape::Getter, FieldShape::RecordAccessor];

    pub(crate) fn read(
        self,
        property: &dyn HostProperty,
        field: PropertyField,
    ) -> Result<Option<String>, HostError> {
        match self {
            FieldShape::Getter => property.get(field),
            FieldShape::RecordAccessor => property.accessor(field),
        }
    }
}

/// Remembers the index of the first shape that worked, so later calls skip probing.
#[derive(Debug, Default)]
pub(crate) struct ShapeCache {
    // 0 = not probed yet, otherwise index + 1
    slot: AtomicU8,
}

impl ShapeCache {
    pub(crate) fn get(&self) -> Option<usize> {
        match self.slot.load(Ordering::Acquire) {
            0 => None,
            n => Some(n as usize - 1),
        }
    }

    fn remember(&self, index: usize) {
        self.slot.store(index as u8 + 1, Ordering::Release);
    }
}

/// Run `attempt` over `order`, starting at the cached shape and wrapping
/// around, so every shape is tried at most once.
///
/// Only a missing accessor moves on to the next shape. Any other failure
/// is returned immediately. When every shape is missing, the last miss
/// is returned.
pub(crate) fn probe<S, T>(
    cache: &ShapeCache,
    order: &[S],
    mut attempt: impl FnMut(S) -> Result<T, HostError>,
) -> Result<T, HostError>
where
    S: Copy,
{
    let start = cache.get().unwrap_or(0);
    let mut last_miss = None;

    for index in (0..order.len()).map(|offset| (start + offset) % order.len()) {
        match attempt(order[index]) {
            Ok(value) => {
                if cache.get() != Some(index) {
                    cache.remember(index);
                }
                return Ok(value);
            }
            Err(HostError::Missing(accessor)) => last_miss = Some(HostError::Missing(accessor)),
            Err(err) => return Err(err),
        }
    }

    Err(last_miss.unwrap_or_else(|| HostError::Missing("no accessor shape available".to_string())))
}
