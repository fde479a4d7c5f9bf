//! Read model trait for query-side views.

/// A read model giving query access to denormalized data.
///
/// Read models are only ever written by their own projection.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of rows currently held.
    fn count(&self) -> usize;
}
