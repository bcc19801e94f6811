//! Cross-crate test suite for the ebb engine.
//!
//! Integration tests drive a [`VotingEscrow`](ebb_escrow::VotingEscrow)
//! through full lock lifecycles over a manual clock and an in-memory vault,
//! and check weights, aggregate supply, and history against closed-form
//! expectations.

pub mod helpers;
