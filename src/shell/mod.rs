// Composition root.
//
// Responsibilities
// - Read config from environment.
// - Wire adapters into the use case handlers and the inbound surfaces.
// - Spawn background workers (intent consumer, storage consumers, periodic sweep).

pub mod config;
pub mod graphql;
pub mod http;
pub mod state;
pub mod workers;
