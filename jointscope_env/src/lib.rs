//! JointScope Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" time source that lets the JointScope
//! playback engine run against either the **Wall Clock** (tokio) or a
//! **Virtual Clock** (deterministic simulation).
//!
//! # Core Concept: Pumped, Not Self-Scheduled
//!
//! The playback clock never schedules itself. A host loop pumps it at a
//! fixed cadence and the clock reads "now" from the context:
//! - Time (`now()`, `sleep()`)
//!
//! Swapping the context for a virtual one makes every frame index
//! reproducible in tests.
//!
//! # Example
//!
//! ```ignore
//! use jointscope_env::{ReplayContext, TokioContext};
//!
//! async fn host_loop<Ctx: ReplayContext>(ctx: &Ctx, session: &mut Session) {
//!     loop {
//!         session.pump();
//!         session.tick(&mut sinks);
//!         ctx.sleep(Duration::from_millis(33)).await;
//!     }
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::ReplayContext;
pub use types::RobotId;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
