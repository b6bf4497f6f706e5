use std::fmt;

use serde::{Deserialize, Serialize};

/// The general-attribute children copied from each instrument record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentField {
    Id,
    FullName,
    ClassificationType,
    CommodityDerivativeIndicator,
    NotionalCurrency,
}

impl InstrumentField {
    pub const ALL: [InstrumentField; 5] = [
        InstrumentField::Id,
        InstrumentField::FullName,
        InstrumentField::ClassificationType,
        InstrumentField::CommodityDerivativeIndicator,
        InstrumentField::NotionalCurrency,
    ];

    /// Local element name inside `FinInstrmGnlAttrbts`.
    pub fn element_name(&self) -> &'static str {
        match self {
            InstrumentField::Id => "Id",
            InstrumentField::FullName => "FullNm",
            InstrumentField::ClassificationType => "ClssfctnTp",
            InstrumentField::CommodityDerivativeIndicator => "CmmdtyDerivInd",
            InstrumentField::NotionalCurrency => "NtnlCcy",
        }
    }

    pub fn from_element_name(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.element_name().as_bytes() == name)
    }
}

impl fmt::Display for InstrumentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// One `FinInstrmGnlAttrbts` node.
///
/// `None` means the child element was absent; `Some("")` means it was present
/// with empty or whitespace-only text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentRecord {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub classification_type: Option<String>,
    pub commodity_derivative_indicator: Option<String>,
    pub notional_currency: Option<String>,
    pub(crate) element: usize,
    pub(crate) parent: usize,
}

impl InstrumentRecord {
    pub fn get(&self, field: InstrumentField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Stores `value` unless the field was already seen; the first child wins.
    pub fn set_if_absent(&mut self, field: InstrumentField, value: String) {
        let slot = self.slot_mut(field);
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    pub fn is_complete(&self) -> bool {
        InstrumentField::ALL
            .into_iter()
            .all(|field| self.slot(field).is_some())
    }

    pub fn missing_fields(&self) -> Vec<InstrumentField> {
        InstrumentField::ALL
            .into_iter()
            .filter(|field| self.slot(*field).is_none())
            .collect()
    }

    fn slot(&self, field: InstrumentField) -> &Option<String> {
        match field {
            InstrumentField::Id => &self.id,
            InstrumentField::FullName => &self.full_name,
            InstrumentField::ClassificationType => &self.classification_type,
            InstrumentField::CommodityDerivativeIndicator => &self.commodity_derivative_indicator,
            InstrumentField::NotionalCurrency => &self.notional_currency,
        }
    }

    fn slot_mut(&mut self, field: InstrumentField) -> &mut Option<String> {
        match field {
            InstrumentField::Id => &mut self.id,
            InstrumentField::FullName => &mut self.full_name,
            InstrumentField::ClassificationType => &mut self.classification_type,
            InstrumentField::CommodityDerivativeIndicator => {
                &mut self.commodity_derivative_indicator
            }
            InstrumentField::NotionalCurrency => &mut self.notional_currency,
        }
    }
}

/// Trimmed text of one `Issr` node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerValue {
    pub value: String,
    pub(crate) parent: usize,
}

impl IssuerValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            parent: 0,
        }
    }
}

/// Everything collected from a single pass over a document, in document order.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub instruments: Vec<InstrumentRecord>,
    pub issuers: Vec<IssuerValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "FinInstrmGnlAttrbts.Id")]
    pub id: String,
    #[serde(rename = "FinInstrmGnlAttrbts.FullNm")]
    pub full_name: String,
    #[serde(rename = "FinInstrmGnlAttrbts.ClssfctnTp")]
    pub classification_type: String,
    #[serde(rename = "FinInstrmGnlAttrbts.CmmdtyDerivInd")]
    pub commodity_derivative_indicator: String,
    #[serde(rename = "FinInstrmGnlAttrbts.NtnlCcy")]
    pub notional_currency: String,
    #[serde(rename = "Issr")]
    pub issuer: String,
}

impl OutputRow {
    /// Absent fields become empty cells.
    pub fn new(record: &InstrumentRecord, issuer: &IssuerValue) -> Self {
        let cell = |field| record.get(field).unwrap_or_default().to_string();
        Self {
            id: cell(InstrumentField::Id),
            full_name: cell(InstrumentField::FullName),
            classification_type: cell(InstrumentField::ClassificationType),
            commodity_derivative_indicator: cell(InstrumentField::CommodityDerivativeIndicator),
            notional_currency: cell(InstrumentField::NotionalCurrency),
            issuer: issuer.value.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub instruments: usize,
    pub issuers: usize,
    pub rows: usize,
    pub incomplete_records: usize,
    pub unpaired: usize,
}
