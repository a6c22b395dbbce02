//! Repeater and flexible content fields

pub mod flexible;
pub mod locks;
pub mod repeater;

pub use flexible::{FlexibleContent, RenderContext, RenderedSection, Section};
pub use locks::KeyedLocks;
pub use repeater::{RepeaterService, RowChange};
