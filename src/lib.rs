// Signed profile properties (name, value, signature)
pub mod property;

// Per-identity property access on the host's player objects
pub mod identity;

// Outbound HTTPS fetch client
pub mod http;

// Per-player request cooldown
pub mod cooldown;

// Router → worker skull frames and channels
pub mod messaging;

// Mojang profile and session lookups
pub mod mojang;

// Skull request state machine (router side)
pub mod skull;

// Configuration
pub mod config;
