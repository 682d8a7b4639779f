//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. In
/// this domain the stock identity (material, batch, status, unit of measure)
/// and the storage-profile key are value objects: two pallets holding the
/// same material/batch/status/uom draw from the same fungible stock pool.
///
/// To "modify" a value object, build a new one.
pub trait ValueObject: Clone + PartialEq + Eq + core::hash::Hash + core::fmt::Debug {}
