//! End-to-end workflow tests against in-memory collaborators.

mod invariants;
mod scenarios;
