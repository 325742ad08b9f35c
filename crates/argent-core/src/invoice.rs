//! # Invoice Calculator
//!
//! Turns raw item measurements and a silver rate into per-item and invoice
//! totals. Pure and deterministic: identical inputs always produce identical
//! integers.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ItemInput (JSON numbers or strings)                                    │
//! │      │  into_measurement()  exact decimal parse, defaults applied       │
//! │      ▼                                                                  │
//! │  ItemMeasurement                                                        │
//! │      │  per item:                                                       │
//! │      │    silver = (touch + wastage) × net / 100          (mg)          │
//! │      │    labour = gross / 1000 × labour_rate_per_kg      (paise)       │
//! │      │    amount = silver × silver_rate + labour          (paise)       │
//! │      ▼                                                                  │
//! │  Invoice                                                                │
//! │      subtotal = Σ amount                                                │
//! │      cgst/sgst = subtotal × rate   (only when tax applies)              │
//! │      total    = subtotal + cgst + sgst                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every product is rounded once, half away from zero, to the unit it is
//! stored in. Any bad item fails the whole invoice.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::decimal::{self, DecimalParseError};
use crate::money::Money;
use crate::types::TaxConfig;
use crate::weight::{Percentage, Weight};

// =============================================================================
// Raw Input
// =============================================================================

/// A measurement as a caller sent it: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(serde_json::Number),
    Text(String),
}

impl RawNumber {
    fn parse_with<T>(
        &self,
        parse: impl Fn(&str) -> Result<T, DecimalParseError>,
    ) -> Result<T, DecimalParseError> {
        match self {
            RawNumber::Number(n) => parse(&n.to_string()),
            RawNumber::Text(s) => parse(s),
        }
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

impl From<i64> for RawNumber {
    fn from(value: i64) -> Self {
        RawNumber::Number(value.into())
    }
}

/// One invoice line as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pieces: Option<RawNumber>,
    #[serde(default)]
    pub gross_weight: Option<RawNumber>,
    #[serde(default)]
    pub net_weight: Option<RawNumber>,
    #[serde(default)]
    pub stone_weight: Option<RawNumber>,
    #[serde(default)]
    pub wastage: Option<RawNumber>,
    #[serde(default)]
    pub touch: Option<RawNumber>,
    #[serde(default)]
    pub labor_rate_per_kg: Option<RawNumber>,
}

impl ItemInput {
    /// Parses the raw fields of the item at `index`.
    ///
    /// `gross_weight` and `net_weight` are required. `stone_weight`,
    /// `wastage`, `touch` and `labor_rate_per_kg` default to zero, `pieces`
    /// to one.
    pub fn into_measurement(self, index: usize) -> CoreResult<ItemMeasurement> {
        let fail = |field: &str, reason: String| {
            CoreError::Calculation(format!("item {}: {} {}", index + 1, field, reason))
        };

        let required = |field: &str, raw: &Option<RawNumber>| -> CoreResult<Weight> {
            let raw = raw
                .as_ref()
                .ok_or_else(|| fail(field, "is required".to_string()))?;
            raw.parse_with(str::parse::<Weight>)
                .map_err(|e| fail(field, e.to_string()))
        };

        let gross_weight = required("gross_weight", &self.gross_weight)?;
        let net_weight = required("net_weight", &self.net_weight)?;

        let stone_weight = match &self.stone_weight {
            Some(raw) => raw
                .parse_with(str::parse::<Weight>)
                .map_err(|e| fail("stone_weight", e.to_string()))?,
            None => Weight::zero(),
        };

        let percentage = |field: &str, raw: &Option<RawNumber>| -> CoreResult<Percentage> {
            match raw {
                Some(raw) => raw
                    .parse_with(str::parse::<Percentage>)
                    .map_err(|e| fail(field, e.to_string())),
                None => Ok(Percentage::zero()),
            }
        };
        let wastage = percentage("wastage", &self.wastage)?;
        let touch = percentage("touch", &self.touch)?;

        let labor_rate_per_kg = match &self.labor_rate_per_kg {
            Some(raw) => raw
                .parse_with(str::parse::<Money>)
                .map_err(|e| fail("labor_rate_per_kg", e.to_string()))?,
            None => Money::zero(),
        };

        let pieces = match &self.pieces {
            Some(raw) => raw
                .parse_with(|s| decimal::parse_units(s, 0))
                .map_err(|e| fail("pieces", e.to_string()))?,
            None => 1,
        };

        Ok(ItemMeasurement {
            product_id: self.product_id,
            description: self.description,
            pieces,
            gross_weight,
            stone_weight,
            net_weight,
            wastage,
            touch,
            labor_rate_per_kg,
        })
    }
}

/// Parses every item, failing on the first bad one.
pub fn parse_items(items: Vec<ItemInput>) -> CoreResult<Vec<ItemMeasurement>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| item.into_measurement(index))
        .collect()
}

// =============================================================================
// Typed Measurements
// =============================================================================

/// The measured facts of one invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMeasurement {
    pub product_id: Option<String>,
    pub description: Option<String>,
    pub pieces: i64,
    pub gross_weight: Weight,
    pub stone_weight: Weight,
    pub net_weight: Weight,
    pub wastage: Percentage,
    pub touch: Percentage,
    pub labor_rate_per_kg: Money,
}

impl ItemMeasurement {
    /// Builds a line with only the required weights set.
    pub fn new(gross_weight: Weight, net_weight: Weight) -> Self {
        ItemMeasurement {
            product_id: None,
            description: None,
            pieces: 1,
            gross_weight,
            stone_weight: Weight::zero(),
            net_weight,
            wastage: Percentage::zero(),
            touch: Percentage::zero(),
            labor_rate_per_kg: Money::zero(),
        }
    }

    fn check(&self, index: usize) -> CoreResult<()> {
        let fail = |reason: &str| CoreError::Calculation(format!("item {}: {}", index + 1, reason));

        if !self.net_weight.is_positive() {
            return Err(fail("net_weight must be greater than zero"));
        }
        if self.gross_weight.is_negative() {
            return Err(fail("gross_weight cannot be negative"));
        }
        if self.stone_weight.is_negative() {
            return Err(fail("stone_weight cannot be negative"));
        }
        if self.wastage.is_negative() {
            return Err(fail("wastage cannot be negative"));
        }
        if self.touch.is_negative() {
            return Err(fail("touch cannot be negative"));
        }
        if self.labor_rate_per_kg.is_negative() {
            return Err(fail("labor_rate_per_kg cannot be negative"));
        }
        if self.pieces < 1 {
            return Err(fail("pieces must be at least 1"));
        }
        Ok(())
    }
}

// =============================================================================
// Calculated Invoice
// =============================================================================

/// One line with its derived values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub item: ItemMeasurement,
    pub silver_weight: Weight,
    pub labor_charges: Money,
    pub item_amount: Money,
}

/// The priced invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub lines: Vec<InvoiceLine>,
    pub silver_rate: Money,
    pub total_net_weight: Weight,
    pub total_wastage: Percentage,
    pub total_silver_weight: Weight,
    pub total_labor_charges: Money,
    pub subtotal: Money,
    pub tax: TaxConfig,
    pub cgst: Money,
    pub sgst: Money,
    pub total_amount: Money,
}

/// Prices one line.
pub fn calculate_line(item: ItemMeasurement, silver_rate: Money) -> InvoiceLine {
    let silver_weight = (item.touch + item.wastage).of(item.net_weight);
    let labor_charges = item.labor_rate_per_kg.for_weight_per_kg(item.gross_weight);
    let item_amount = silver_rate.for_weight(silver_weight) + labor_charges;

    InvoiceLine {
        item,
        silver_weight,
        labor_charges,
        item_amount,
    }
}

/// Calculates a complete invoice.
///
/// ## Errors
/// [`CoreError::Calculation`] for an empty item list, a non-positive silver
/// rate, or any item with a non-positive net weight or a negative optional
/// measurement.
///
/// ## Example
/// ```rust
/// use argent_core::invoice::{calculate_invoice, ItemMeasurement};
/// use argent_core::{Money, Percentage, TaxConfig, Weight};
///
/// let mut item = ItemMeasurement::new(Weight::from_grams(100), Weight::from_grams(95));
/// item.touch = Percentage::from_percent(80);
/// item.wastage = Percentage::from_percent(2);
/// item.labor_rate_per_kg = Money::from_rupees(500);
///
/// let invoice = calculate_invoice(vec![item], Money::from_rupees(75), TaxConfig::none()).unwrap();
/// assert_eq!(invoice.total_silver_weight.milligrams(), 77_900);
/// assert_eq!(invoice.total_amount.paise(), 589_250);
/// ```
pub fn calculate_invoice(
    items: Vec<ItemMeasurement>,
    silver_rate: Money,
    tax: TaxConfig,
) -> CoreResult<Invoice> {
    if items.is_empty() {
        return Err(CoreError::Calculation(
            "an invoice needs at least one item".to_string(),
        ));
    }
    if !silver_rate.is_positive() {
        return Err(CoreError::Calculation(format!(
            "silver rate must be greater than zero, got {}",
            silver_rate
        )));
    }
    for (index, item) in items.iter().enumerate() {
        item.check(index)?;
    }

    let lines: Vec<InvoiceLine> = items
        .into_iter()
        .map(|item| calculate_line(item, silver_rate))
        .collect();

    let total_net_weight = lines.iter().map(|l| l.item.net_weight).sum();
    let total_wastage = lines.iter().map(|l| l.item.wastage).sum();
    let total_silver_weight = lines.iter().map(|l| l.silver_weight).sum();
    let total_labor_charges = lines.iter().map(|l| l.labor_charges).sum();
    let subtotal: Money = lines.iter().map(|l| l.item_amount).sum();

    let (cgst, sgst) = if tax.applicable {
        (subtotal.calculate_tax(tax.cgst), subtotal.calculate_tax(tax.sgst))
    } else {
        (Money::zero(), Money::zero())
    };

    Ok(Invoice {
        lines,
        silver_rate,
        total_net_weight,
        total_wastage,
        total_silver_weight,
        total_labor_charges,
        subtotal,
        tax,
        cgst,
        sgst,
        total_amount: subtotal + cgst + sgst,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaxRate;

    fn bangle() -> ItemInput {
        ItemInput {
            description: Some("Bangle".to_string()),
            gross_weight: Some("100".into()),
            net_weight: Some("95".into()),
            wastage: Some("2".into()),
            touch: Some("80".into()),
            labor_rate_per_kg: Some("500".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_item_invoice() {
        let items = parse_items(vec![bangle()]).unwrap();
        let invoice = calculate_invoice(items, Money::from_rupees(75), TaxConfig::none()).unwrap();

        let line = &invoice.lines[0];
        assert_eq!(line.silver_weight, Weight::from_milligrams(77_900));
        assert_eq!(line.labor_charges, Money::from_rupees(50));
        assert_eq!(line.item_amount, Money::from_paise(589_250));
        assert_eq!(invoice.total_amount, Money::from_paise(589_250));
        assert_eq!(invoice.cgst, Money::zero());
    }

    #[test]
    fn test_tax_applied_to_subtotal() {
        let items = parse_items(vec![bangle()]).unwrap();
        let tax = TaxConfig::gst(TaxRate::from_bps(150), TaxRate::from_bps(150));
        let invoice = calculate_invoice(items, Money::from_rupees(75), tax).unwrap();

        // 5892.50 × 1.5% = 88.3875 → 88.39
        assert_eq!(invoice.cgst, Money::from_paise(8_839));
        assert_eq!(invoice.sgst, Money::from_paise(8_839));
        assert_eq!(invoice.total_amount, Money::from_paise(589_250 + 2 * 8_839));
    }

    #[test]
    fn test_tax_ignored_when_not_applicable() {
        let items = parse_items(vec![bangle()]).unwrap();
        let tax = TaxConfig {
            applicable: false,
            cgst: TaxRate::from_bps(150),
            sgst: TaxRate::from_bps(150),
        };
        let invoice = calculate_invoice(items, Money::from_rupees(75), tax).unwrap();
        assert_eq!(invoice.total_amount, invoice.subtotal);
    }

    #[test]
    fn test_aggregates_sum_lines() {
        let second = ItemInput {
            gross_weight: Some("10.5".into()),
            net_weight: Some("10.25".into()),
            touch: Some("92.5".into()),
            ..Default::default()
        };
        let items = parse_items(vec![bangle(), second]).unwrap();
        let invoice = calculate_invoice(items, Money::from_rupees(75), TaxConfig::none()).unwrap();

        // 92.5% of 10.250 g = 9.48125 g → 9.481 g
        assert_eq!(invoice.lines[1].silver_weight.milligrams(), 9_481);
        assert_eq!(invoice.total_net_weight.milligrams(), 105_250);
        assert_eq!(invoice.total_silver_weight.milligrams(), 77_900 + 9_481);
        assert_eq!(invoice.total_wastage, Percentage::from_percent(2));
        assert_eq!(
            invoice.subtotal,
            invoice.lines.iter().map(|l| l.item_amount).sum::<Money>()
        );
    }

    #[test]
    fn test_defaults_for_missing_optionals() {
        let item = ItemInput {
            gross_weight: Some("5".into()),
            net_weight: Some("5".into()),
            ..Default::default()
        }
        .into_measurement(0)
        .unwrap();

        assert_eq!(item.pieces, 1);
        assert_eq!(item.touch, Percentage::zero());
        assert_eq!(item.labor_rate_per_kg, Money::zero());
        assert_eq!(item.stone_weight, Weight::zero());
    }

    #[test]
    fn test_deserializes_mixed_numbers_and_strings() {
        let json = r#"{"gross_weight": 100, "net_weight": "95", "touch": 80.5, "wastage": "2"}"#;
        let input: ItemInput = serde_json::from_str(json).unwrap();
        let item = input.into_measurement(0).unwrap();
        assert_eq!(item.net_weight, Weight::from_grams(95));
        assert_eq!(item.touch, Percentage::from_millipercent(80_500));
    }

    #[test]
    fn test_rejects_bad_items() {
        let missing_net = ItemInput {
            gross_weight: Some("10".into()),
            ..Default::default()
        };
        let err = parse_items(vec![missing_net]).unwrap_err();
        assert!(err.to_string().contains("net_weight is required"));

        let garbage = ItemInput {
            gross_weight: Some("10".into()),
            net_weight: Some("ten".into()),
            ..Default::default()
        };
        assert!(matches!(
            parse_items(vec![bangle(), garbage]),
            Err(CoreError::Calculation(msg)) if msg.starts_with("item 2")
        ));

        let zero_net = ItemMeasurement::new(Weight::from_grams(1), Weight::zero());
        let result = calculate_invoice(vec![zero_net], Money::from_rupees(75), TaxConfig::none());
        assert!(result.is_err());

        let mut negative_touch = ItemMeasurement::new(Weight::from_grams(1), Weight::from_grams(1));
        negative_touch.touch = Percentage::from_percent(-5);
        assert!(
            calculate_invoice(vec![negative_touch], Money::from_rupees(75), TaxConfig::none())
                .is_err()
        );
    }

    #[test]
    fn test_rejects_empty_items_and_bad_rate() {
        assert!(calculate_invoice(vec![], Money::from_rupees(75), TaxConfig::none()).is_err());

        let items = parse_items(vec![bangle()]).unwrap();
        assert!(calculate_invoice(items, Money::zero(), TaxConfig::none()).is_err());
    }

    #[test]
    fn test_calculation_is_deterministic() {
        let build = || {
            let items = parse_items(vec![bangle(), bangle()]).unwrap();
            calculate_invoice(
                items,
                "74.35".parse().unwrap(),
                TaxConfig::gst(TaxRate::from_bps(150), TaxRate::from_bps(150)),
            )
            .unwrap()
        };
        assert_eq!(build(), build());
    }
}
