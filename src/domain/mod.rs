// ============================================================================
// Domain Models - Entities and Input Types
// ============================================================================
//
// Plain data carriers for the storefront core:
// - Product (catalog row with the contended stock counter)
// - Order / OrderItem (order aggregate with price snapshots)
// - Payment (local mirror of a gateway payment intent)
//
// Invariants that span rows (stock never negative, total equals the sum of
// item subtotals) are enforced by the placement transaction in
// `service::orders`, not here.
//
// ============================================================================

pub mod order;
pub mod payment;
pub mod product;

pub use order::*;
pub use payment::*;
pub use product::*;
