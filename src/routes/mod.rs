/// Router Module Index
///
/// Splits the routing surface into the unauthenticated probes and the generic
/// resource routes. Authentication is not a router layer here: each resource
/// controller runs its own gate, so one route table serves public, authenticated
/// and admin resources alike.

/// Routes that never authenticate (health probes).
pub mod public;

/// The generic CRUD routes under `/api/{resource}`.
pub mod resources;
