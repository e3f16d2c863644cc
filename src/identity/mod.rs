//! Version-tolerant access to the property collection of a host player profile.
//!
//! Host builds expose the backing profile and its property entries through
//! different accessor shapes. Each shape is an enum variant in a fixed
//! fallback order ([`ProfileShape`], [`FieldShape`]); the first one that
//! works is cached per accessor so later calls skip probing.
//!
//! Mutation of one identity's collection is serialized through a lock keyed
//! by player name. Reads through the accessor take the same lock, so the
//! remove-then-insert sequence of [`IdentityAccessor::apply_property`] is
//! never observed half done.

use crate::property::PropertyRecord;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

pub mod memory;
mod shape;

pub use shape::{FieldShape, ProfileShape};
use shape::{probe, ShapeCache};

/// Backing profile object owned by the host.
pub type ProfileRef = Arc<dyn HostProfile>;

/// Failure of a single host accessor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The accessor does not exist on this host build. Recoverable: the next shape is tried.
    Missing(String),
    /// The accessor exists but failed.
    Failed(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing(accessor) => write!(f, "accessor '{}' not available", accessor),
            HostError::Failed(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for HostError {}

/// Field of a backing property entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyField {
    Name,
    Value,
    Signature,
}

impl PropertyField {
    fn index(self) -> usize {
        match self {
            PropertyField::Name => 0,
            PropertyField::Value => 1,
            PropertyField::Signature => 2,
        }
    }
}

impl fmt::Display for PropertyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyField::Name => write!(f, "name"),
            PropertyField::Value => write!(f, "value"),
            PropertyField::Signature => write!(f, "signature"),
        }
    }
}

/// Errors locating the backing profile or one of its fields.
///
/// Fatal for the call that raised it; never retried automatically.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionError {
    ProfileUnavailable { player: String, reason: String },
    FieldUnavailable { player: String, field: PropertyField, reason: String },
    CollectionUnavailable { player: String, reason: String },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::ProfileUnavailable { player, reason } => {
                write!(f, "cannot resolve profile of '{}': {}", player, reason)
            }
            ResolutionError::FieldUnavailable { player, field, reason } => {
                write!(f, "cannot read property {} of '{}': {}", field, player, reason)
            }
            ResolutionError::CollectionUnavailable { player, reason } => {
                write!(f, "cannot access properties of '{}': {}", player, reason)
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Player identity object owned by the host. The core never owns its lifetime.
pub trait PlayerHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Profile through the direct accessor method.
    fn profile_by_method(&self) -> Result<ProfileRef, HostError>;

    /// Profile through a field lookup by declared profile type.
    fn profile_by_field(&self) -> Result<ProfileRef, HostError>;
}

/// Property multimap hanging off a backing profile.
pub trait HostProfile: Send + Sync {
    fn entries(&self) -> Result<Vec<(String, Arc<dyn HostProperty>)>, HostError>;

    fn remove_all(&self, name: &str) -> Result<(), HostError>;

    /// Insert a backing entry built from `record`, keyed by its name.
    fn put(&self, record: &PropertyRecord) -> Result<(), HostError>;
}

/// One backing property entry.
pub trait HostProperty: Send + Sync {
    /// Getter-style accessor.
    fn get(&self, field: PropertyField) -> Result<Option<String>, HostError>;

    /// Record-style accessor, present on builds where the getters are gone.
    fn accessor(&self, field: PropertyField) -> Result<Option<String>, HostError>;
}

/// Reads and mutates PropertyRecords on host profiles.
#[derive(Default)]
pub struct IdentityAccessor {
    profile_shape: ShapeCache,
    field_shapes: [ShapeCache; 3],
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IdentityAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile shape that succeeded last, if any call resolved a profile yet.
    pub fn profile_shape(&self) -> Option<ProfileShape> {
        self.profile_shape.get().map(|i| ProfileShape::ORDER[i])
    }

    /// Field shape that succeeded last for `field`.
    pub fn field_shape(&self, field: PropertyField) -> Option<FieldShape> {
        self.field_shapes[field.index()].get().map(|i| FieldShape::ORDER[i])
    }

    /// Locate the backing profile: accessor method first, typed field lookup
    /// only if the method is missing on this build.
    pub fn resolve_profile(&self, handle: &dyn PlayerHandle) -> Result<ProfileRef, ResolutionError> {
        probe(&self.profile_shape, &ProfileShape::ORDER, |shape| shape.resolve(handle)).map_err(
            |err| ResolutionError::ProfileUnavailable {
                player: handle.name().to_string(),
                reason: err.to_string(),
            },
        )
    }

    /// Replace every entry named `record.name()` with `record`.
    pub fn apply_property(
        &self,
        handle: &dyn PlayerHandle,
        record: &PropertyRecord,
    ) -> Result<(), ResolutionError> {
        self.with_identity_lock(handle.name(), || -> Result<(), ResolutionError> {
            let profile = self.resolve_profile(handle)?;
            let collection_error = |err: HostError| ResolutionError::CollectionUnavailable {
                player: handle.name().to_string(),
                reason: err.to_string(),
            };

            profile.remove_all(record.name()).map_err(collection_error)?;
            profile.put(record).map_err(collection_error)?;
            Ok(())
        })?;

        debug!(
            player = %handle.name(),
            property = %record.name(),
            signed = record.is_signed(),
            "Applied property"
        );
        Ok(())
    }

    /// Every property of the player, grouped by name.
    ///
    /// Degrades to an empty map when the profile or any field cannot be
    /// read; a partially populated record is never returned.
    pub fn read_all_properties(&self, handle: &dyn PlayerHandle) -> HashMap<String, Vec<PropertyRecord>> {
        match self.try_read_all_properties(handle) {
            Ok(properties) => properties,
            Err(err) => {
                warn!(player = %handle.name(), error = %err, "Failed to read player properties");
                HashMap::new()
            }
        }
    }

    /// Like [`read_all_properties`](Self::read_all_properties) but surfaces the failure.
    pub fn try_read_all_properties(
        &self,
        handle: &dyn PlayerHandle,
    ) -> Result<HashMap<String, Vec<PropertyRecord>>, ResolutionError> {
        type Properties = HashMap<String, Vec<PropertyRecord>>;

        self.with_identity_lock(handle.name(), || -> Result<Properties, ResolutionError> {
            let profile = self.resolve_profile(handle)?;
            let entries = profile
                .entries()
                .map_err(|err| ResolutionError::CollectionUnavailable {
                    player: handle.name().to_string(),
                    reason: err.to_string(),
                })?;

            let mut properties = Properties::new();
            for (key, entry) in entries {
                let record = self.translate(handle.name(), entry.as_ref())?;
                properties.entry(key).or_default().push(record);
            }

            Ok(properties)
        })
    }

    /// Records stored under `name`; empty when none or unreadable.
    pub fn read_property(&self, handle: &dyn PlayerHandle, name: &str) -> Vec<PropertyRecord> {
        self.read_all_properties(handle).remove(name).unwrap_or_default()
    }

    fn translate(&self, player: &str, entry: &dyn HostProperty) -> Result<PropertyRecord, ResolutionError> {
        let name = self
            .read_field(player, entry, PropertyField::Name)?
            .ok_or_else(|| missing_field(player, PropertyField::Name))?;
        let value = self
            .read_field(player, entry, PropertyField::Value)?
            .ok_or_else(|| missing_field(player, PropertyField::Value))?;
        let signature = self.read_field(player, entry, PropertyField::Signature)?;

        Ok(match signature {
            Some(signature) => PropertyRecord::new(name, value, signature),
            None => PropertyRecord::unsigned(name, value),
        })
    }

    fn read_field(
        &self,
        player: &str,
        entry: &dyn HostProperty,
        field: PropertyField,
    ) -> Result<Option<String>, ResolutionError> {
        probe(&self.field_shapes[field.index()], &FieldShape::ORDER, |shape| shape.read(entry, field))
            .map_err(|err| ResolutionError::FieldUnavailable {
                player: player.to_string(),
                field,
                reason: err.to_string(),
            })
    }

    /// Run `f` holding the lock of `player`. The lock entry is dropped
    /// again once no other caller holds it.
    fn with_identity_lock<T>(&self, player: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.identity_lock(player);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);

        self.locks.remove_if(player, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn identity_lock(&self, player: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(player.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn missing_field(player: &str, field: PropertyField) -> ResolutionError {
    ResolutionError::FieldUnavailable {
        player: player.to_string(),
        field,
        reason: "no value".to_string(),
    }
}
