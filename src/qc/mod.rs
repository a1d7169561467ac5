//! Quality-control computation (C5): genotype tallies, allele-frequency
//! statistics, Hardy-Weinberg equilibrium, and per-sample metrics.

pub mod genotype;
pub mod sample;
pub mod variant;

pub use genotype::{decode_gt, evaluate_adj_filter, AdjThresholds, Call};
pub use sample::{InferredSex, SampleQc, SampleQcAccumulator};
pub use variant::{compute_allele_frequency, compute_genotype_counts, hwe_exact_test, AlleleFrequencyStats, GenotypeCounts};

/// Full per-variant QC summary, as persisted alongside the normalized
/// variant row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantQc {
    pub counts: GenotypeCounts,
    pub frequency: Option<AlleleFrequencyStats>,
    pub hwe_p_value: Option<f64>,
}

/// Compute the full QC summary for one decomposed variant from its decoded
/// per-sample calls.
pub fn compute_variant_qc<I: IntoIterator<Item = Call>>(calls: I) -> VariantQc {
    let counts = compute_genotype_counts(calls);
    let frequency = compute_allele_frequency(&counts);
    let hwe_p_value = if counts.n_hom_ref + counts.n_het + counts.n_hom_alt > 0 {
        Some(hwe_exact_test(counts.n_het, counts.n_hom_ref, counts.n_hom_alt))
    } else {
        None
    };
    VariantQc {
        counts,
        frequency,
        hwe_p_value,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compute_variant_qc_combines_counts_frequency_and_hwe() {
        let calls = vec![Call::HomRef, Call::HomRef, Call::Het, Call::HomAlt];
        let qc = compute_variant_qc(calls);
        assert_eq!(qc.counts.n_called(), 4);
        assert!(qc.frequency.is_some());
        assert!(qc.hwe_p_value.is_some());
    }
}
