#![forbid(unsafe_code)]

//! Fine-grained reactivity for alpen.
//!
//! - [`Value`], [`ReactiveArray`], [`ReactiveObject`]: deep-reactive data.
//!   Reads made while an effect runs are recorded; writes re-trigger the
//!   readers.
//! - [`Effect`]: a tracked computation, either re-run inline or delegated to
//!   a scheduler hook.
//! - [`ScopeArena`]: nested data scopes that own effects and stop them on
//!   disposal.
//!
//! Everything here is single-threaded (`Rc` based). Tracking state is
//! thread-local.

pub mod effect;
pub mod scope;
pub mod value;

pub use effect::{Effect, EffectId, is_tracking, untracked};
pub use scope::{ScopeArena, ScopeId};
pub use value::{ReactiveArray, ReactiveObject, Value, format_number, observe};
