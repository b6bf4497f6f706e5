use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::errors::TransformError;
use crate::model::{ExtractedDocument, IssuerValue, OutputRow};

/// How instruments and issuers that cannot be paired are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairingPolicy {
    /// Drop whatever has no partner and keep going.
    #[default]
    Truncate,
    /// Fail the transform.
    Strict,
}

/// Where the issuer of an instrument is looked up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IssuerScope {
    /// Nth `FinInstrmGnlAttrbts` pairs with the Nth `Issr` of the whole document.
    #[default]
    Document,
    /// The `Issr` sitting in the same record element as the attributes node
    /// (or directly inside it).
    Record,
}

impl PairingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairingPolicy::Truncate => "truncate",
            PairingPolicy::Strict => "strict",
        }
    }
}

impl fmt::Display for PairingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PairingPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(PairingPolicy::Truncate),
            "strict" => Ok(PairingPolicy::Strict),
            other => Err(format!("unknown pairing policy '{other}' (expected truncate or strict)")),
        }
    }
}

impl IssuerScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuerScope::Document => "document",
            IssuerScope::Record => "record",
        }
    }
}

impl fmt::Display for IssuerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssuerScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(IssuerScope::Document),
            "record" => Ok(IssuerScope::Record),
            other => Err(format!("unknown issuer scope '{other}' (expected document or record)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub pairing: PairingPolicy,
    pub issuer_scope: IssuerScope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairedRows {
    pub rows: Vec<OutputRow>,
    /// Instruments or issuers dropped for lack of a partner.
    pub unpaired: usize,
}

pub fn pair_rows(
    document: &ExtractedDocument,
    options: &TransformOptions,
) -> Result<PairedRows, TransformError> {
    match options.issuer_scope {
        IssuerScope::Document => pair_by_position(document, options.pairing),
        IssuerScope::Record => pair_by_record(document, options.pairing),
    }
}

fn pair_by_position(
    document: &ExtractedDocument,
    policy: PairingPolicy,
) -> Result<PairedRows, TransformError> {
    let instruments = document.instruments.len();
    let issuers = document.issuers.len();

    if instruments != issuers {
        if policy == PairingPolicy::Strict {
            return Err(TransformError::PairingMismatch {
                instruments,
                issuers,
            });
        }
        warn!(
            instruments,
            issuers,
            "instrument and issuer counts differ; extra entries are dropped"
        );
    }

    let rows = document
        .instruments
        .iter()
        .zip(&document.issuers)
        .map(|(record, issuer)| OutputRow::new(record, issuer))
        .collect();

    Ok(PairedRows {
        rows,
        unpaired: instruments.abs_diff(issuers),
    })
}

fn pair_by_record(
    document: &ExtractedDocument,
    policy: PairingPolicy,
) -> Result<PairedRows, TransformError> {
    let mut by_parent: HashMap<usize, &IssuerValue> = HashMap::new();
    for issuer in &document.issuers {
        by_parent.entry(issuer.parent).or_insert(issuer);
    }

    let mut rows = Vec::with_capacity(document.instruments.len());
    let mut unpaired = 0;

    for (index, record) in document.instruments.iter().enumerate() {
        let issuer = by_parent
            .get(&record.parent)
            .or_else(|| by_parent.get(&record.element))
            .copied();

        match issuer {
            Some(issuer) => rows.push(OutputRow::new(record, issuer)),
            None if policy == PairingPolicy::Strict => {
                return Err(TransformError::MissingIssuer {
                    index,
                    id: record.id.clone(),
                });
            }
            None => {
                warn!(index, id = ?record.id, "instrument record has no issuer; skipped");
                unpaired += 1;
            }
        }
    }

    Ok(PairedRows { rows, unpaired })
}
