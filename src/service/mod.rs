// ============================================================================
// Application Services
// ============================================================================
//
// - orders: transactional order placement, retrieval, listing
// - payments: payment intent creation, webhook event application
//
// Services speak `AppError` and repository ports only; HTTP concerns stay in
// `http`.
//
// ============================================================================

pub mod orders;
pub mod payments;

pub use orders::OrderService;
pub use payments::PaymentService;
