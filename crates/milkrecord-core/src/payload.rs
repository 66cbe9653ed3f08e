//! # Domain Payloads
//!
//! Typed payloads for every synced table. Each one knows its [`RecordKind`]
//! and how to validate itself; the envelope around it is [`crate::Record`].
//!
//! ```text
//!   Farmer ──────────► farmers           Customer ─────► customers
//!   MilkCollection ──► milk_collections  LedgerEntry ──► ledger_entries
//!   Product ─────────► products          Sale ─────────► sales
//! ```
//!
//! All amounts are integer paise. Quantities (litres, kg) stay f64 because
//! the scale reports them that way; they only become money through
//! [`Money::times_quantity`].

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{decode_payload, RecordKind};
use crate::validation::Validate;

// =============================================================================
// Payload Trait
// =============================================================================

/// A domain payload that can travel inside a [`crate::Record`].
pub trait Payload: Serialize + DeserializeOwned + Validate + Send + Sync + 'static {
    /// The table this payload lives in.
    const KIND: RecordKind;
}

/// Checks an untyped payload against the typed payload for `kind`.
///
/// Used by dynamically-typed callers that hand the write path raw JSON.
pub fn validate_json(kind: RecordKind, value: &serde_json::Value) -> CoreResult<()> {
    fn check<P: Payload>(value: &serde_json::Value) -> CoreResult<()> {
        let payload: P = decode_payload(value.clone())?;
        payload.validate()?;
        Ok(())
    }

    match kind {
        RecordKind::Farmers => check::<Farmer>(value),
        RecordKind::Customers => check::<Customer>(value),
        RecordKind::Sales => check::<Sale>(value),
        RecordKind::Products => check::<Product>(value),
        RecordKind::MilkCollections => check::<MilkCollection>(value),
        RecordKind::LedgerEntries => check::<LedgerEntry>(value),
    }
}

// =============================================================================
// Farmer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AnimalType {
    Cow,
    Buffalo,
    Mixed,
}

impl Default for AnimalType {
    fn default() -> Self {
        AnimalType::Cow
    }
}

/// A farmer who sells milk to the shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Farmer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub animal_type: AnimalType,
    /// Amount the shop owes the farmer.
    #[serde(default)]
    pub balance_paise: i64,
}

impl Farmer {
    pub fn balance(&self) -> Money {
        Money::from_paise(self.balance_paise)
    }
}

impl Payload for Farmer {
    const KIND: RecordKind = RecordKind::Farmers;
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with a running credit ("udhar") balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Amount the customer owes the shop.
    #[serde(default)]
    pub balance_paise: i64,
}

impl Customer {
    pub fn balance(&self) -> Money {
        Money::from_paise(self.balance_paise)
    }
}

impl Payload for Customer {
    const KIND: RecordKind = RecordKind::Customers;
}

// =============================================================================
// Product
// =============================================================================

/// A catalogue entry (milk, paneer, sweets ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub name: String,
    pub category: String,
    /// Selling unit: "L", "kg", "pcs".
    pub unit: String,
    /// Price per unit.
    pub price_paise: i64,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }
}

impl Payload for Product {
    const KIND: RecordKind = RecordKind::Products;
}

// =============================================================================
// Sale
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Upi,
    /// Added to the customer's ledger balance.
    Credit,
}

impl Default for PaymentMode {
    fn default() -> Self {
        PaymentMode::Cash
    }
}

/// One line of a sale, denormalized so the bill survives product edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    #[serde(default)]
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub rate_paise: i64,
    pub amount_paise: i64,
}

impl SaleItem {
    /// Builds a line, pricing it from rate and quantity.
    pub fn priced(name: impl Into<String>, unit: impl Into<String>, quantity: f64, rate: Money) -> Self {
        SaleItem {
            product_id: None,
            name: name.into(),
            quantity,
            unit: unit.into(),
            rate_paise: rate.paise(),
            amount_paise: rate.times_quantity(quantity).paise(),
        }
    }

    pub fn amount(&self) -> Money {
        Money::from_paise(self.amount_paise)
    }
}

/// A completed bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub items: Vec<SaleItem>,
    pub total_paise: i64,
    #[serde(default)]
    pub paid_paise: i64,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
}

impl Sale {
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }

    /// Sum of line amounts.
    pub fn items_total(&self) -> Money {
        Money::sum(self.items.iter().map(SaleItem::amount))
    }

    /// Unpaid remainder, never negative.
    pub fn due(&self) -> Money {
        Money::from_paise((self.total_paise - self.paid_paise).max(0))
    }
}

impl Payload for Sale {
    const KIND: RecordKind = RecordKind::Sales;
}

// =============================================================================
// Milk Collection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Morning,
    Evening,
}

impl Default for Shift {
    fn default() -> Self {
        Shift::Morning
    }
}

/// Milk bought from a farmer in one shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MilkCollection {
    pub farmer_id: String,
    pub quantity_litres: f64,
    /// Fat percentage from the analyzer.
    #[serde(default)]
    pub fat: Option<f64>,
    /// Solids-not-fat percentage from the analyzer.
    #[serde(default)]
    pub snf: Option<f64>,
    /// Rate per litre.
    pub rate_paise: i64,
    pub amount_paise: i64,
    #[serde(default)]
    pub shift: Shift,
    #[ts(as = "String")]
    pub collection_date: NaiveDate,
}

impl MilkCollection {
    /// Builds a collection, pricing it from rate and quantity.
    pub fn priced(
        farmer_id: impl Into<String>,
        quantity_litres: f64,
        rate: Money,
        shift: Shift,
        collection_date: NaiveDate,
    ) -> Self {
        MilkCollection {
            farmer_id: farmer_id.into(),
            quantity_litres,
            fat: None,
            snf: None,
            rate_paise: rate.paise(),
            amount_paise: rate.times_quantity(quantity_litres).paise(),
            shift,
            collection_date,
        }
    }

    pub fn amount(&self) -> Money {
        Money::from_paise(self.amount_paise)
    }
}

impl Payload for MilkCollection {
    const KIND: RecordKind = RecordKind::MilkCollections;
}

// =============================================================================
// Ledger Entry
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Customer owes more (credit sale).
    Debit,
    /// Customer paid back.
    Credit,
}

/// A movement on a customer's credit account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub customer_id: String,
    pub entry_type: EntryType,
    pub amount_paise: i64,
    /// Sale that produced the entry, if any.
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl LedgerEntry {
    /// Effect on the customer's balance: debits add, credits subtract.
    pub fn signed_amount(&self) -> Money {
        match self.entry_type {
            EntryType::Debit => Money::from_paise(self.amount_paise),
            EntryType::Credit => -Money::from_paise(self.amount_paise),
        }
    }
}

impl Payload for LedgerEntry {
    const KIND: RecordKind = RecordKind::LedgerEntries;
}

// =============================================================================
// Unit Tests
// =============================================================================
