//! # Validation Module
//!
//! Input validation for catalog operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI collaborator                                              │
//! │  ├── Prompt parsing (numbers, dates)                                   │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: ledger-engine Catalog                                        │
//! │  ├── THIS MODULE: field rules                                          │
//! │  └── Duplicate code check among active products                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store                                                        │
//! │  ├── NOT NULL / CHECK (stock_quantity >= 0)                            │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sale-building quantity checks live in [`crate::builder`] and raise
//! [`crate::CoreError::InvalidQuantity`] instead of a `ValidationError`.
//!
//! ## Usage
//! ```rust
//! use ledger_core::validation::{normalize_code, validate_code};
//!
//! let code = normalize_code("  coke-330 ");
//! assert_eq!(code, "COKE-330");
//! validate_code(&code).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{NewProduct, ProductChanges};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted product code.
pub const MAX_CODE_LEN: usize = 50;

/// Longest accepted product name.
pub const MAX_NAME_LEN: usize = 200;

/// Longest accepted description / category / notes text.
pub const MAX_TEXT_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Canonical form of a product code: trimmed and upper-cased.
///
/// Registration and every lookup go through this, so `"a1"` and `"A1 "`
/// address the same product.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only letters, digits, hyphens and underscores
///
/// ## Example
/// ```rust
/// use ledger_core::validation::validate_code;
///
/// assert!(validate_code("COKE-330").is_ok());
/// assert!(validate_code("").is_err());
/// assert!(validate_code("HAS SPACE").is_err());
/// ```
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1 to 200 characters after trimming).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates optional free text (description, category, notes).
pub fn validate_optional_text(field: &str, text: Option<&str>) -> ValidationResult<()> {
    match text {
        Some(t) if t.chars().count() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        }),
        _ => Ok(()),
    }
}

/// Validates a search fragment.
///
/// ## Returns
/// The trimmed fragment. Empty fragments are rejected: an empty "contains"
/// search would match the first product arbitrarily.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.is_empty() {
        return Err(ValidationError::Required {
            field: "query".to_string(),
        });
    }

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents. Zero is allowed (free items).
///
/// ## Example
/// ```rust
/// use ledger_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    validate_non_negative("price", cents)
}

/// Validates a stock level or threshold (`>= 0`).
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the quantity of a stock entry or exit (`> 0`).
pub fn validate_movement_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates every field of a registration.
///
/// The code is checked in normalised form. Duplicate detection needs the
/// store and happens in the catalog service.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_code(&normalize_code(&product.code))?;
    validate_product_name(&product.name)?;
    validate_optional_text("description", product.description.as_deref())?;
    validate_optional_text("category", product.category.as_deref())?;
    validate_price_cents(product.unit_price_cents)?;
    validate_non_negative("stock_quantity", product.stock_quantity)?;
    validate_non_negative("min_stock_threshold", product.min_stock_threshold)?;
    Ok(())
}

/// Validates the fields present in an edit.
pub fn validate_changes(changes: &ProductChanges) -> ValidationResult<()> {
    if let Some(name) = &changes.name {
        validate_product_name(name)?;
    }
    validate_optional_text("description", changes.description.as_deref())?;
    validate_optional_text("category", changes.category.as_deref())?;
    if let Some(price) = changes.unit_price_cents {
        validate_price_cents(price)?;
    }
    if let Some(min) = changes.min_stock_threshold {
        validate_non_negative("min_stock_threshold", min)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
