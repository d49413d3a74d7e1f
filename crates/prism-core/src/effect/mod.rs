//! Effects: what can be applied, and how each effect reaches the backend.
//!
//! - **registry**: effect ids to canonical names, in application order
//! - **factory**: canonical names to handler constructors
//! - **handler**: per-effect adapters to the image backend
//! - **params**: parameter value parsing for each effect

pub mod factory;
pub mod handler;
pub mod params;
pub mod registry;

pub use factory::{EffectFactory, HandlerConstructor};
pub use handler::{BlurHandler, ConvertHandler, EffectContext, EffectHandler, ResizeHandler};
pub use registry::{EffectDescriptor, EffectRegistry};
