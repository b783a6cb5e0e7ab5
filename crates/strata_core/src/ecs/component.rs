//! # Component System
//!
//! Components are pure data containers with no behavior.
//! They must be plain old data so tables can store them in flat columns
//! and reset vacated cells without running destructors.

use bytemuck::{Pod, Zeroable};

/// Marker trait for components.
///
/// Components must be:
/// - `Copy` + `Pod`: bitwise copyable, no heap ownership
/// - `Zeroable`: vacated column cells are zeroed
/// - `Default`: the value a fresh column cell reads as
///
/// A type that is not plain old data cannot implement this trait, so a shape
/// naming one is rejected at compile time.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use strata_core::Component;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// Human-readable name used in errors and logs.
    #[must_use]
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}
