//! # milkrecord-core: Pure Types for MilkRecord Sync
//!
//! This crate holds the domain model that both the local store and the sync
//! engine agree on. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MilkRecord Sync Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Route layer (Flask / desktop UI)                  │   │
//! │  │     save customer, record milk collection, sync status ...      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                milkrecord-sync (write path, sync loop)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ milkrecord-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  payload  │  │   money   │  │ validation│  │   │
//! │  │   │ Record<P> │  │  Farmer   │  │   Money   │  │  Validate │  │   │
//! │  │   │SyncStatus │  │  Sale ... │  │  (paise)  │  │   rules   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Record envelope, record kinds, sync status, sync log, results
//! - [`payload`] - Typed dairy payloads (Farmer, Customer, Sale, ...)
//! - [`money`] - Money type with integer arithmetic in paise
//! - [`error`] - Domain error types
//! - [`validation`] - Payload validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use milkrecord_core::money::Money;
//!
//! // 2.5 litres at ₹64.00 per litre
//! let rate = Money::from_paise(6400);
//! assert_eq!(rate.times_quantity(2.5).paise(), 16000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod payload;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use payload::*;
pub use types::*;
pub use validation::Validate;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Walk-in customer name used when a sale has no ledger customer attached.
pub const WALK_IN_CUSTOMER: &str = "Walking Customer";

/// Upper bound for a single milk collection, in litres.
///
/// ## Business Reason
/// Catches a slipped decimal point on the weighing scale (e.g. 1250 instead
/// of 12.50) before it lands in a farmer's balance.
pub const MAX_COLLECTION_LITRES: f64 = 1000.0;

/// Maximum line items allowed in a single sale.
pub const MAX_SALE_ITEMS: usize = 100;
