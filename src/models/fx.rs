//! Currency conversion result

use serde::{Deserialize, Serialize};

/// Converted amount plus the effective rate used
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FxConversion {
    /// Units of the target currency per unit of the source currency
    pub rate: f64,
    /// Amount expressed in the target currency
    pub converted_amount: f64,
}
