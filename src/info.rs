//! Dynamic INFO field value model.
//!
//! VCF `INFO` values are declared with a `Number=` cardinality (`A`, `R`,
//! `G`, a fixed integer, or `.`) and a `Type=`. Rather than stringly-typing
//! every extractor, INFO values are parsed into this tagged representation
//! once, and narrowed with typed accessors afterwards.

use std::collections::HashMap;

/// A single INFO (or FORMAT) value, after type coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    /// The key was declared but has no `=value` (a flag, or present-but-empty).
    Missing,
    /// A `Type=Flag` field: present with no value.
    Flag,
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<InfoValue>),
}

impl InfoValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InfoValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Float(f) => Some(*f),
            InfoValue::Int(i) => Some(*i as f64),
            InfoValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            InfoValue::Int(i) => Some(*i),
            InfoValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool_flag(&self) -> bool {
        matches!(self, InfoValue::Flag)
    }

    pub fn as_list(&self) -> Option<&[InfoValue]> {
        match self {
            InfoValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Parse a raw comma-separated INFO value string into a scalar or list,
    /// based on the field's declared `Number=`.
    pub fn parse_scalar(raw: &str) -> InfoValue {
        if raw.is_empty() || raw == "." {
            return InfoValue::Missing;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return InfoValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return InfoValue::Float(f);
        }
        InfoValue::String(raw.to_string())
    }

    /// Parse a raw INFO value, splitting on `,` when the field is declared
    /// with a list cardinality (`A`, `R`, `G`, or an integer > 1).
    pub fn parse(raw: &str, number: &Cardinality) -> InfoValue {
        match number {
            Cardinality::Scalar => InfoValue::parse_scalar(raw),
            _ => {
                let parts: Vec<InfoValue> = raw.split(',').map(InfoValue::parse_scalar).collect();
                InfoValue::List(parts)
            }
        }
    }
}

/// The `Number=` cardinality declared for an INFO/FORMAT field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A single value (`Number=1`, or `Number=0` for flags).
    Scalar,
    /// One value per alternate allele (`Number=A`).
    PerAlt,
    /// One value per allele, REF included (`Number=R`).
    PerAllele,
    /// One value per possible genotype (`Number=G`).
    PerGenotype,
    /// A fixed count greater than one, or unknown (`Number=.`).
    Other,
}

impl Cardinality {
    pub fn from_header_str(s: &str) -> Cardinality {
        match s {
            "0" | "1" => Cardinality::Scalar,
            "A" => Cardinality::PerAlt,
            "R" => Cardinality::PerAllele,
            "G" => Cardinality::PerGenotype,
            _ => Cardinality::Other,
        }
    }
}

/// Declared schema for one INFO/FORMAT field, extracted from a `##INFO` or
/// `##FORMAT` header line.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub id: String,
    pub number: Cardinality,
    pub ty: String,
    pub description: String,
}

/// Parsed `INFO` column: declared-field-aware map from key to value.
pub type InfoMap = HashMap<String, InfoValue>;

/// Parse a raw `INFO` column (`KEY=VAL;KEY2;KEY3=A,B,C`) into an [`InfoMap`],
/// given the field declarations discovered from the header. Unknown keys
/// default to scalar parsing.
pub fn parse_info_column(raw: &str, decls: &HashMap<String, FieldDecl>) -> InfoMap {
    let mut map = InfoMap::new();
    if raw == "." || raw.is_empty() {
        return map;
    }
    for entry in raw.split(';') {
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((key, value)) => {
                let number = decls
                    .get(key)
                    .map(|d| d.number)
                    .unwrap_or(Cardinality::Other);
                map.insert(key.to_string(), InfoValue::parse(value, &number));
            }
            None => {
                map.insert(entry.to_string(), InfoValue::Flag);
            }
        }
    }
    map
}

/// Re-slice a `Number=A` value down to the entry for one ALT index
/// (0-based, among the decomposed ALTs).
pub fn reslice_per_alt(value: &InfoValue, alt_index: usize) -> InfoValue {
    match value {
        InfoValue::List(items) => items.get(alt_index).cloned().unwrap_or(InfoValue::Missing),
        other => {
            if alt_index == 0 {
                other.clone()
            } else {
                InfoValue::Missing
            }
        }
    }
}

/// Re-slice a `Number=R` value (REF, ALT_0, ALT_1, ...) down to `[REF,
/// ALT_i]` for one decomposed ALT.
pub fn reslice_per_allele(value: &InfoValue, alt_index: usize) -> InfoValue {
    match value {
        InfoValue::List(items) => {
            let reference = items.first().cloned().unwrap_or(InfoValue::Missing);
            let alt = items.get(alt_index + 1).cloned().unwrap_or(InfoValue::Missing);
            InfoValue::List(vec![reference, alt])
        }
        other => InfoValue::List(vec![other.clone(), InfoValue::Missing]),
    }
}
