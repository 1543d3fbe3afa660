//! Colony Forge - worker and production-chain simulation
//!
//! Workers take tasks from a shared pool, fetch what the recipe needs, and
//! synthesize sub-tasks for anything missing, all inside a deterministic
//! fixed-order tick.

pub mod city;
pub mod command;
pub mod core;
pub mod ecs;
pub mod entity;
pub mod simulation;
pub mod spatial;
pub mod ui;
pub mod world;
