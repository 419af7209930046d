//! # convene
//!
//! A convener and a fixed set of participants meet, again and again, in a
//! shared hall, trading work items through FIFO queues.
//!
//! The core is two monitors: [`coordinator::MeetingCoordinator`] for the
//! hall's joint state and [`queue::WorkQueue`] for the blocking handoff of
//! work. The actor loops, simulation wiring, configuration and telemetry
//! around them are thin.

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod queue;
pub mod simulation;
pub mod sync;
pub mod telemetry;
