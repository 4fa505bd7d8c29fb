//! Request deduplication and TTL caching for the Sojourn client.

pub mod flight;

pub use flight::FlightCache;
