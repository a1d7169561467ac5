//! gnomAD-style population-frequency extraction and popmax computation (A6).

use std::collections::HashMap;

use crate::info::InfoValue;

pub const GNOMAD_POPULATIONS: &[&str] = &["AFR", "AMR", "ASJ", "EAS", "FIN", "NFE", "SAS"];

/// Populations gnomAD excludes from popmax by default: both have undergone
/// genetic bottlenecks that can inflate allele frequency for some variants.
pub const BOTTLENECKED_POPULATIONS: &[&str] = &["ASJ", "FIN"];

/// One population's gnomAD-style frequency record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PopulationFrequency {
    pub ac: Option<i64>,
    pub an: Option<i64>,
    pub af: Option<f64>,
    pub hom_count: Option<i64>,
    pub faf_95: Option<f64>,
}

fn first_value<'a>(info: &'a HashMap<String, InfoValue>, keys: &[String]) -> Option<&'a InfoValue> {
    keys.iter().find_map(|k| info.get(k))
}

/// Parse gnomAD-style `AC_<POP>`/`AN_<POP>`/`AF_<POP>`/`nhomalt_<POP>`/
/// `faf95_<POP>` INFO keys (v2/v3/v4, case-insensitive population suffix,
/// optional `prefix` such as `"gnomad_"` from a vcfanno re-annotation) into
/// one [`PopulationFrequency`] per population with any data present.
pub fn parse_gnomad_info(info: &HashMap<String, InfoValue>, prefix: &str) -> HashMap<String, PopulationFrequency> {
    let mut result = HashMap::new();

    for &pop in GNOMAD_POPULATIONS {
        let pop_lower = pop.to_ascii_lowercase();
        let keys_for = |field: &str| -> Vec<String> {
            vec![
                format!("{prefix}{field}_{pop}"),
                format!("{prefix}{field}_{pop_lower}"),
                format!("{field}_{pop}"),
                format!("{field}_{pop_lower}"),
            ]
        };

        let ac = first_value(info, &keys_for("AC"));
        let an = first_value(info, &keys_for("AN"));
        let af = first_value(info, &keys_for("AF"));

        if ac.is_none() && an.is_none() && af.is_none() {
            continue;
        }

        let hom = first_value(info, &keys_for("nhomalt"));
        let faf = first_value(info, &keys_for("faf95"));

        result.insert(
            pop.to_string(),
            PopulationFrequency {
                ac: ac.and_then(|v| v.as_i64()),
                an: an.and_then(|v| v.as_i64()),
                af: af.and_then(|v| v.as_f64()),
                hom_count: hom.and_then(|v| v.as_i64()),
                faf_95: faf.and_then(|v| v.as_f64()),
            },
        );
    }

    result
}

/// Compute the (population-maximum allele frequency, population) pair,
/// excluding [`BOTTLENECKED_POPULATIONS`] by default.
pub fn compute_popmax(
    frequencies: &HashMap<String, PopulationFrequency>,
    exclude_bottlenecked: bool,
) -> (Option<f64>, Option<String>) {
    if frequencies.is_empty() {
        return (None, None);
    }

    let mut max_af: Option<f64> = None;
    let mut max_pop: Option<String> = None;

    let mut pops: Vec<&String> = frequencies.keys().collect();
    pops.sort();

    for pop in &pops {
        if exclude_bottlenecked && BOTTLENECKED_POPULATIONS.contains(&pop.as_str()) {
            continue;
        }
        let freq = &frequencies[*pop];
        if let Some(af) = freq.af {
            if max_af.is_none() || af > max_af.unwrap() {
                max_af = Some(af);
                max_pop = Some((*pop).clone());
            }
        }
    }

    if max_af.is_none() {
        if let Some(pop) = pops
            .iter()
            .find(|pop| !exclude_bottlenecked || !BOTTLENECKED_POPULATIONS.contains(&pop.as_str()))
        {
            let freq = &frequencies[pop.as_str()];
            return (freq.af, Some((*pop).clone()));
        }
    }

    (max_af, max_pop)
}

#[cfg(test)]
mod test {
    use super::*;

    fn info_with(entries: &[(&str, InfoValue)]) -> HashMap<String, InfoValue> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn parses_population_fields_by_suffix() {
        let info = info_with(&[
            ("AC_AFR", InfoValue::Int(10)),
            ("AN_AFR", InfoValue::Int(100)),
            ("AF_AFR", InfoValue::Float(0.1)),
            ("nhomalt_AFR", InfoValue::Int(2)),
        ]);
        let parsed = parse_gnomad_info(&info, "");
        let afr = parsed.get("AFR").unwrap();
        assert_eq!(afr.ac, Some(10));
        assert_eq!(afr.an, Some(100));
        assert_eq!(afr.af, Some(0.1));
        assert_eq!(afr.hom_count, Some(2));
    }

    #[test]
    fn absent_population_is_skipped() {
        let info = info_with(&[]);
        let parsed = parse_gnomad_info(&info, "");
        assert!(parsed.is_empty());
    }

    #[test]
    fn vcfanno_prefix_is_honored() {
        let info = info_with(&[("gnomad_AF_EAS", InfoValue::Float(0.25))]);
        let parsed = parse_gnomad_info(&info, "gnomad_");
        assert_eq!(parsed.get("EAS").unwrap().af, Some(0.25));
    }

    #[test]
    fn popmax_excludes_bottlenecked_populations_by_default() {
        let mut freqs = HashMap::new();
        freqs.insert("FIN".to_string(), PopulationFrequency { af: Some(0.9), ..Default::default() });
        freqs.insert("NFE".to_string(), PopulationFrequency { af: Some(0.3), ..Default::default() });
        let (af, pop) = compute_popmax(&freqs, true);
        assert_eq!(af, Some(0.3));
        assert_eq!(pop, Some("NFE".to_string()));
    }

    #[test]
    fn popmax_falls_back_to_bottlenecked_when_nothing_else_present() {
        let mut freqs = HashMap::new();
        freqs.insert("ASJ".to_string(), PopulationFrequency { af: Some(0.9), ..Default::default() });
        let (af, pop) = compute_popmax(&freqs, true);
        assert_eq!(af, Some(0.9));
        assert_eq!(pop, Some("ASJ".to_string()));
    }

    #[test]
    fn popmax_empty_is_none() {
        assert_eq!(compute_popmax(&HashMap::new(), true), (None, None));
    }
}
