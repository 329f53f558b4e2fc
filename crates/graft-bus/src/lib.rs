//! Hook bus for Graft.
//!
//! Every behaviour of a Graft store (storage, networking, live query
//! delivery) is a hook registered on one of a fixed set of named stages.
//! Dispatching a stage runs its hooks in registration order; each hook
//! either hands the (possibly rewritten) message on with [`Flow::Continue`]
//! or ends the chain with [`Flow::Halt`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use graft_bus::{Dispatch, HookBus, Observer, Stage};
//!
//! # tokio_test_block_on(async {
//! let bus: HookBus<(), u32> = HookBus::new();
//! bus.register(Stage::In, Arc::new(Observer::new("log", |_: &(), n: &u32| println!("saw {n}"))));
//! let outcome = bus.dispatch(Stage::In, &(), 7).await;
//! assert_eq!(outcome, Dispatch::Completed(7));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod bus;
pub mod stage;

pub use bus::{Dispatch, HookBus};
pub use stage::{Flow, Hook, Observer, Stage};
