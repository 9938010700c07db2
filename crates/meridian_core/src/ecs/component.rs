//! # Component Trait
//!
//! Components are plain data values tagged with a type. They carry no
//! behavior; systems read and write them through the manager's typed
//! tables. Unlike fixed-layout game components, map components own heap
//! data (geometry, payload handles, queries), so the only bounds are
//! thread-safety and `'static`.

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Send + Sync`: tables live inside the manager, which crosses no
///   threads itself, but completion values produced off-thread must be
///   storable
/// - `'static`: tables are type-erased behind `TypeId`
///
/// # Example
///
/// ```rust,ignore
/// struct DownloadState {
///     attempts: u32,
/// }
///
/// impl Component for DownloadState {
///     const NAME: &'static str = "DownloadState";
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Component name used in diagnostics and invariant reports.
    const NAME: &'static str;
}
