//! # Validation Module
//!
//! Business rules every payload must pass before the write path persists it.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Route layer                                                  │
//! │  └── Type validation (deserialization into the payload struct)         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Write path                                                   │
//! │  └── THIS MODULE: Validate::validate() on the payload                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  └── NOT NULL / CHECK constraints on the envelope columns              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use milkrecord_core::validation::{validate_name, validate_phone};
//!
//! assert!(validate_name("Ramesh Patel").is_ok());
//! assert!(validate_phone(Some("98765 43210")).is_ok());
//! assert!(validate_phone(Some("call me")).is_err());
//! ```

use crate::error::ValidationError;
use crate::payload::{Customer, Farmer, LedgerEntry, MilkCollection, Product, Sale, SaleItem};
use crate::{MAX_COLLECTION_LITRES, MAX_SALE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Implemented by every payload.
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a person or product name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, 200)
}

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an optional phone number.
///
/// ## Rules
/// - Digits plus `+`, `-` and spaces only
/// - 7 to 15 digits
pub fn validate_phone(phone: Option<&str>) -> ValidationResult<()> {
    let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(());
    };

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, '+' and '-'".to_string(),
        });
    }

    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must have between 7 and 15 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional email address (shape only).
pub fn validate_email(email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        }),
    }
}

fn validate_positive_paise(field: &str, paise: i64) -> ValidationResult<()> {
    if paise <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative_paise(field: &str, paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_quantity(field: &str, quantity: f64, max: f64) -> ValidationResult<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if quantity > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max,
        });
    }

    Ok(())
}

/// Fat and SNF readings are percentages.
fn validate_percentage(field: &str, value: Option<f64>) -> ValidationResult<()> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: 100.0,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Payload Rules
// =============================================================================

impl Validate for Farmer {
    fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_phone(self.phone.as_deref())
    }
}

impl Validate for Customer {
    fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_phone(self.phone.as_deref())?;
        validate_email(self.email.as_deref())
    }
}

impl Validate for Product {
    fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_required_text("category", &self.category, 50)?;
        validate_required_text("unit", &self.unit, 10)?;
        validate_non_negative_paise("price_paise", self.price_paise)
    }
}

impl Validate for SaleItem {
    fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_quantity("quantity", self.quantity, f64::MAX)?;
        validate_non_negative_paise("rate_paise", self.rate_paise)?;
        validate_non_negative_paise("amount_paise", self.amount_paise)
    }
}

impl Validate for Sale {
    fn validate(&self) -> ValidationResult<()> {
        validate_required_text("customer_name", &self.customer_name, 200)?;

        if self.items.is_empty() {
            return Err(ValidationError::required("items"));
        }

        if self.items.len() > MAX_SALE_ITEMS {
            return Err(ValidationError::TooMany {
                field: "items".to_string(),
                max: MAX_SALE_ITEMS,
            });
        }

        for item in &self.items {
            item.validate()?;
        }

        validate_non_negative_paise("total_paise", self.total_paise)?;
        validate_non_negative_paise("paid_paise", self.paid_paise)
    }
}

impl Validate for MilkCollection {
    fn validate(&self) -> ValidationResult<()> {
        validate_required_text("farmer_id", &self.farmer_id, 64)?;
        validate_quantity("quantity_litres", self.quantity_litres, MAX_COLLECTION_LITRES)?;
        validate_percentage("fat", self.fat)?;
        validate_percentage("snf", self.snf)?;
        validate_non_negative_paise("rate_paise", self.rate_paise)?;
        validate_non_negative_paise("amount_paise", self.amount_paise)
    }
}

impl Validate for LedgerEntry {
    fn validate(&self) -> ValidationResult<()> {
        validate_required_text("customer_id", &self.customer_id, 64)?;
        validate_positive_paise("amount_paise", self.amount_paise)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
