//! Client-side session: per-action state and the backends it calls

pub mod backend;
pub mod controller;
