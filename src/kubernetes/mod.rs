mod client;

pub use client::{Connection, PodApiSource, connect};
