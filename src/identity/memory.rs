//! In-memory host used by the worker binary and tests.
//!
//! `HostBuild` picks which accessor shapes are present, emulating the
//! difference between modern and legacy server builds.

use super::{HostError, HostProfile, HostProperty, PlayerHandle, ProfileRef, PropertyField};
use crate::property::PropertyRecord;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBuild {
    /// Profile accessor method and getter-style property fields.
    Modern,
    /// Profile only reachable through its typed field, record-style property fields.
    Legacy,
}

#[derive(Debug)]
pub struct MemoryProperty {
    build: HostBuild,
    name: String,
    value: String,
    signature: Option<String>,
}

impl MemoryProperty {
    fn field(&self, field: PropertyField) -> Option<String> {
        match field {
            PropertyField::Name => Some(self.name.clone()),
            PropertyField::Value => Some(self.value.clone()),
            PropertyField::Signature => self.signature.clone(),
        }
    }
}

impl HostProperty for MemoryProperty {
    fn get(&self, field: PropertyField) -> Result<Option<String>, HostError> {
        match self.build {
            HostBuild::Modern => Ok(self.field(field)),
            HostBuild::Legacy => Err(HostError::Missing(format!("get_{}", field))),
        }
    }

    fn accessor(&self, field: PropertyField) -> Result<Option<String>, HostError> {
        match self.build {
            HostBuild::Modern => Err(HostError::Missing(field.to_string())),
            HostBuild::Legacy => Ok(self.field(field)),
        }
    }
}

/// Insertion-ordered property multimap.
#[derive(Debug)]
pub struct MemoryProfile {
    build: HostBuild,
    properties: Mutex<Vec<(String, Arc<MemoryProperty>)>>,
}

impl MemoryProfile {
    pub fn new(build: HostBuild) -> Self {
        Self {
            build,
            properties: Mutex::new(Vec::new()),
        }
    }

    /// Number of raw entries stored under `name`, bypassing any accessor.
    pub fn count(&self, name: &str) -> usize {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key == name)
            .count()
    }
}

impl HostProfile for MemoryProfile {
    fn entries(&self) -> Result<Vec<(String, Arc<dyn HostProperty>)>, HostError> {
        let properties = self.properties.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(properties
            .iter()
            .map(|(key, property)| (key.clone(), property.clone() as Arc<dyn HostProperty>))
            .collect())
    }

    fn remove_all(&self, name: &str) -> Result<(), HostError> {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(key, _)| key != name);
        Ok(())
    }

    fn put(&self, record: &PropertyRecord) -> Result<(), HostError> {
        let property = MemoryProperty {
            build: self.build,
            name: record.name().to_string(),
            value: record.value().to_string(),
            signature: record.signature().map(str::to_string),
        };
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((record.name().to_string(), Arc::new(property)));
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryPlayer {
    name: String,
    build: HostBuild,
    profile: Arc<MemoryProfile>,
}

impl MemoryPlayer {
    pub fn new(name: impl Into<String>, build: HostBuild) -> Self {
        Self {
            name: name.into(),
            build,
            profile: Arc::new(MemoryProfile::new(build)),
        }
    }

    pub fn profile(&self) -> &Arc<MemoryProfile> {
        &self.profile
    }
}

impl PlayerHandle for MemoryPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile_by_method(&self) -> Result<ProfileRef, HostError> {
        match self.build {
            HostBuild::Modern => Ok(self.profile.clone() as ProfileRef),
            HostBuild::Legacy => Err(HostError::Missing("get_profile".to_string())),
        }
    }

    fn profile_by_field(&self) -> Result<ProfileRef, HostError> {
        Ok(self.profile.clone() as ProfileRef)
    }
}

/// Online players of an in-memory host, keyed by name.
#[derive(Default)]
pub struct MemoryDirectory {
    players: DashMap<String, Arc<MemoryPlayer>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, player: MemoryPlayer) -> Arc<MemoryPlayer> {
        let player = Arc::new(player);
        self.players.insert(player.name.clone(), player.clone());
        player
    }

    pub fn quit(&self, name: &str) {
        self.players.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<MemoryPlayer>> {
        self.players.get(name).map(|p| p.clone())
    }
}

impl crate::messaging::PlayerDirectory for MemoryDirectory {
    fn find(&self, name: &str) -> Option<Arc<dyn PlayerHandle>> {
        self.get(name).map(|p| p as Arc<dyn PlayerHandle>)
    }
}
