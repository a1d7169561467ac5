//! CSQ (VEP) and ANN (SnpEff) annotation extraction (C2).

use std::collections::HashMap;

/// Variant impact, ranked `HIGH > MODERATE > LOW > MODIFIER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display, strum::EnumString)]
pub enum Impact {
    #[strum(serialize = "MODIFIER")]
    Modifier,
    #[strum(serialize = "LOW")]
    Low,
    #[strum(serialize = "MODERATE")]
    Moderate,
    #[strum(serialize = "HIGH")]
    High,
}

impl Impact {
    /// Numeric rank used for tie-breaking (`HIGH=3 .. MODIFIER=0`), matching
    /// the order `Ord` already gives us since variants are declared
    /// low-to-high above.
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

/// The pipe-delimited sub-schema declared for a CSQ/ANN INFO field, as
/// found in its header `Description=`.
#[derive(Debug, Clone)]
pub struct AnnotationSchema {
    pub fields: Vec<String>,
}

/// Default VEP CSQ field order, used when the header did not declare one.
pub const DEFAULT_CSQ_FIELDS: &[&str] = &[
    "Allele",
    "Consequence",
    "IMPACT",
    "SYMBOL",
    "Gene",
    "Feature_type",
    "Feature",
    "BIOTYPE",
    "HGVSc",
    "HGVSp",
];

/// Default SnpEff ANN field order, used when the header did not declare one.
pub const DEFAULT_ANN_FIELDS: &[&str] = &[
    "Allele",
    "Annotation",
    "Annotation_Impact",
    "Gene_Name",
    "Gene_ID",
    "Feature_Type",
    "Feature_ID",
    "Transcript_BioType",
    "HGVS.c",
    "HGVS.p",
];

impl AnnotationSchema {
    /// Parse the `Format: A|B|C` suffix commonly embedded in VEP/SnpEff
    /// `Description=` header strings.
    pub fn from_description(description: &str, fallback: &[&str]) -> AnnotationSchema {
        if let Some(idx) = description.find("Format: ") {
            let rest = &description[idx + "Format: ".len()..];
            let rest = rest.trim_end_matches('"').trim();
            let fields: Vec<String> = rest.split('|').map(|s| s.trim().to_string()).collect();
            if !fields.is_empty() {
                return AnnotationSchema { fields };
            }
        }
        AnnotationSchema {
            fields: fallback.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

/// Which flavor of transcript annotation a header declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSource {
    Csq,
    Ann,
}

/// Header-discovered annotation field configuration: which INFO key to read
/// and how to split its pipe-delimited entries.
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    pub source: AnnotationSource,
    pub info_key: String,
    pub schema: AnnotationSchema,
}

impl AnnotationConfig {
    /// Discover CSQ/ANN configuration from the `##INFO` header lines. When
    /// both are declared, CSQ wins.
    pub fn discover(info_descriptions: &HashMap<String, String>) -> Option<AnnotationConfig> {
        if let Some(desc) = info_descriptions.get("CSQ") {
            return Some(AnnotationConfig {
                source: AnnotationSource::Csq,
                info_key: "CSQ".to_string(),
                schema: AnnotationSchema::from_description(desc, DEFAULT_CSQ_FIELDS),
            });
        }
        if let Some(desc) = info_descriptions.get("ANN") {
            return Some(AnnotationConfig {
                source: AnnotationSource::Ann,
                info_key: "ANN".to_string(),
                schema: AnnotationSchema::from_description(desc, DEFAULT_ANN_FIELDS),
            });
        }
        None
    }
}

/// One decoded annotation entry's fields of interest, picked as the
/// worst-impact match for a given ALT allele.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationPick {
    pub gene: Option<String>,
    pub consequence: Option<String>,
    pub impact: Option<String>,
    pub hgvs_c: Option<String>,
    pub hgvs_p: Option<String>,
    pub transcript: Option<String>,
}

fn field_name_for(source: AnnotationSource, canonical: &str) -> &'static str {
    match (source, canonical) {
        (AnnotationSource::Csq, "gene") => "SYMBOL",
        (AnnotationSource::Csq, "consequence") => "Consequence",
        (AnnotationSource::Csq, "impact") => "IMPACT",
        (AnnotationSource::Csq, "hgvs_c") => "HGVSc",
        (AnnotationSource::Csq, "hgvs_p") => "HGVSp",
        (AnnotationSource::Csq, "transcript") => "Feature",
        (AnnotationSource::Ann, "gene") => "Gene_Name",
        (AnnotationSource::Ann, "consequence") => "Annotation",
        (AnnotationSource::Ann, "impact") => "Annotation_Impact",
        (AnnotationSource::Ann, "hgvs_c") => "HGVS.c",
        (AnnotationSource::Ann, "hgvs_p") => "HGVS.p",
        (AnnotationSource::Ann, "transcript") => "Feature_ID",
        _ => unreachable!(),
    }
}

/// Parse a raw CSQ/ANN INFO value (semicolon-free, already extracted from
/// the INFO map) and pick the worst-impact entry whose leading `Allele`
/// field equals `alt` (case-insensitive). Returns `None` if no entry
/// matches.
pub fn pick_worst_impact(raw_value: &str, config: &AnnotationConfig, alt: &str) -> Option<AnnotationPick> {
    let allele_idx = config.schema.index_of("Allele").unwrap_or(0);

    let mut best: Option<(Impact, Vec<String>)> = None;

    for entry in raw_value.split(',') {
        let mut fields: Vec<&str> = entry.split('|').collect();
        // Pad with empty trailing fields if the entry is shorter than the
        // declared schema.
        while fields.len() < config.schema.fields.len() {
            fields.push("");
        }

        let Some(&allele_field) = fields.get(allele_idx) else {
            continue;
        };
        if !allele_field.eq_ignore_ascii_case(alt) {
            continue;
        }

        let impact_idx = config
            .schema
            .index_of(field_name_for(config.source, "impact"));
        let impact = impact_idx
            .and_then(|i| fields.get(i))
            .and_then(|s| s.parse::<Impact>().ok())
            .unwrap_or(Impact::Modifier);

        let replace = match &best {
            None => true,
            Some((best_impact, _)) => impact > *best_impact,
        };
        if replace {
            best = Some((impact, fields.iter().map(|s| s.to_string()).collect()));
        }
    }

    best.map(|(impact, fields)| {
        let get = |canonical: &str| -> Option<String> {
            let name = field_name_for(config.source, canonical);
            config
                .schema
                .index_of(name)
                .and_then(|i| fields.get(i))
                .filter(|s| !s.is_empty())
                .cloned()
        };
        AnnotationPick {
            gene: get("gene"),
            consequence: get("consequence"),
            impact: Some(impact.to_string()),
            hgvs_c: get("hgvs_c"),
            hgvs_p: get("hgvs_p"),
            transcript: get("transcript"),
        }
    })
}
