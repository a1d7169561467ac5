//! Per-sample QC metrics, aggregated across all variants for one sample.

/// Running accumulator for one sample's QC metrics across a VCF.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleQcAccumulator {
    pub n_sites: u32,
    pub n_called: u32,
    pub n_het: u32,
    pub n_hom_alt: u32,
    pub n_hom_ref: u32,
    pub n_ts: u32,
    pub n_tv: u32,
    /// Het count at non-pseudoautosomal chrX sites, for sex inference.
    pub n_x_het: u32,
    pub n_x_called: u32,
    /// Sum of `(observed_hom - expected_hom) / (1 - expected_hom_freq)` per
    /// site, for method-of-moments inbreeding coefficient estimation.
    pub f_sum: f64,
    pub f_sites: u32,
}

/// Finalized per-sample QC metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleQc {
    pub call_rate: f64,
    pub het_hom_ratio: Option<f64>,
    pub ti_tv_ratio: Option<f64>,
    pub inferred_sex: InferredSex,
    pub f_inbreeding: Option<f64>,
    pub qc_pass: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredSex {
    Male,
    Female,
    Unknown,
}

/// Transitions: A<->G, C<->T.
fn is_transition(r#ref: &str, alt: &str) -> bool {
    matches!(
        (r#ref, alt),
        ("A", "G") | ("G", "A") | ("C", "T") | ("T", "C")
    )
}

fn is_transversion(r#ref: &str, alt: &str) -> bool {
    matches!(r#ref.len(), 1) && matches!(alt.len(), 1) && r#ref != alt && !is_transition(r#ref, alt)
}

impl SampleQcAccumulator {
    /// Record one adj-filter-passing call (biallelic SNV) at a site.
    pub fn record_call(
        &mut self,
        call: super::genotype::Call,
        chrom: &str,
        r#ref: &str,
        alt: &str,
        expected_het_freq: Option<f64>,
    ) {
        use super::genotype::Call;

        self.n_sites += 1;
        match call {
            Call::Missing => return,
            Call::HomRef => {
                self.n_called += 1;
                self.n_hom_ref += 1;
            }
            Call::Het => {
                self.n_called += 1;
                self.n_het += 1;
                if is_transition(r#ref, alt) {
                    self.n_ts += 1;
                } else if is_transversion(r#ref, alt) {
                    self.n_tv += 1;
                }
            }
            Call::HomAlt => {
                self.n_called += 1;
                self.n_hom_alt += 1;
                if is_transition(r#ref, alt) {
                    self.n_ts += 1;
                } else if is_transversion(r#ref, alt) {
                    self.n_tv += 1;
                }
            }
            Call::OtherAltHet | Call::Haploid { .. } => {
                self.n_called += 1;
            }
        }

        let normalized_chrom = crate::common::normalize_chrom(chrom);
        if normalized_chrom == "X" && !matches!(call, Call::Missing) {
            self.n_x_called += 1;
            if matches!(call, Call::Het) {
                self.n_x_het += 1;
            }
        }

        if let Some(expected_het_freq) = expected_het_freq {
            if matches!(call, Call::HomRef | Call::HomAlt) {
                self.f_sites += 1;
                let observed_hom = 1.0;
                let expected_hom_freq = 1.0 - expected_het_freq;
                if expected_hom_freq < 1.0 {
                    self.f_sum += (observed_hom - expected_hom_freq) / (1.0 - expected_hom_freq);
                }
            } else if matches!(call, Call::Het) {
                self.f_sites += 1;
                let expected_hom_freq = 1.0 - expected_het_freq;
                if expected_hom_freq < 1.0 {
                    self.f_sum += (0.0 - expected_hom_freq) / (1.0 - expected_hom_freq);
                }
            }
        }
    }

    /// Infer chromosomal sex from chrX heterozygosity: a high X-het rate
    /// indicates two X copies (female); a near-zero rate indicates one
    /// (male). Ambiguous or data-poor samples are `Unknown`.
    fn infer_sex(&self) -> InferredSex {
        if self.n_x_called < 20 {
            return InferredSex::Unknown;
        }
        let x_het_rate = self.n_x_het as f64 / self.n_x_called as f64;
        if x_het_rate > 0.15 {
            InferredSex::Female
        } else if x_het_rate < 0.05 {
            InferredSex::Male
        } else {
            InferredSex::Unknown
        }
    }

    /// Finalize accumulated counts into a [`SampleQc`] report.
    ///
    /// `min_call_rate` gates `qc_pass`: a sample with `call_rate` below this
    /// threshold fails QC regardless of its other metrics.
    pub fn finish(&self, min_call_rate: f64) -> SampleQc {
        let call_rate = if self.n_sites == 0 {
            0.0
        } else {
            self.n_called as f64 / self.n_sites as f64
        };
        let het_hom_ratio = if self.n_hom_alt == 0 {
            None
        } else {
            Some(self.n_het as f64 / self.n_hom_alt as f64)
        };
        let ti_tv_ratio = if self.n_tv == 0 {
            None
        } else {
            Some(self.n_ts as f64 / self.n_tv as f64)
        };
        let f_inbreeding = if self.f_sites == 0 {
            None
        } else {
            Some(self.f_sum / self.f_sites as f64)
        };

        let qc_pass = call_rate >= min_call_rate;

        SampleQc {
            call_rate,
            het_hom_ratio,
            ti_tv_ratio,
            inferred_sex: self.infer_sex(),
            f_inbreeding,
            qc_pass,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::qc::genotype::Call;

    #[test]
    fn call_rate_and_het_hom_ratio() {
        let mut acc = SampleQcAccumulator::default();
        acc.record_call(Call::Het, "1", "A", "G", None);
        acc.record_call(Call::HomAlt, "1", "C", "T", None);
        acc.record_call(Call::Missing, "1", "A", "G", None);

        let qc = acc.finish(0.5);
        assert!((qc.call_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(qc.het_hom_ratio, Some(1.0));
        assert!(qc.qc_pass);
    }

    #[test]
    fn low_call_rate_fails_qc() {
        let mut acc = SampleQcAccumulator::default();
        for _ in 0..9 {
            acc.record_call(Call::Missing, "1", "A", "G", None);
        }
        acc.record_call(Call::Het, "1", "A", "G", None);
        let qc = acc.finish(0.95);
        assert!(!qc.qc_pass);
    }

    #[test]
    fn ti_tv_counts_transitions_and_transversions() {
        let mut acc = SampleQcAccumulator::default();
        acc.record_call(Call::Het, "1", "A", "G", None); // transition
        acc.record_call(Call::Het, "1", "A", "T", None); // transversion
        acc.record_call(Call::Het, "1", "C", "T", None); // transition
        let qc = acc.finish(0.0);
        assert_eq!(qc.ti_tv_ratio, Some(2.0));
    }

    #[test]
    fn sex_inference_from_x_heterozygosity() {
        let mut female = SampleQcAccumulator::default();
        for _ in 0..30 {
            female.record_call(Call::Het, "X", "A", "G", None);
        }
        assert_eq!(female.finish(0.0).inferred_sex, InferredSex::Female);

        let mut male = SampleQcAccumulator::default();
        for _ in 0..30 {
            male.record_call(Call::HomAlt, "X", "A", "G", None);
        }
        assert_eq!(male.finish(0.0).inferred_sex, InferredSex::Male);

        let mut sparse = SampleQcAccumulator::default();
        sparse.record_call(Call::Het, "X", "A", "G", None);
        assert_eq!(sparse.finish(0.0).inferred_sex, InferredSex::Unknown);
    }

    #[test]
    fn inbreeding_coefficient_negative_for_excess_het() {
        let mut acc = SampleQcAccumulator::default();
        for _ in 0..20 {
            acc.record_call(Call::Het, "1", "A", "G", Some(0.5));
        }
        let qc = acc.finish(0.0);
        assert!(qc.f_inbreeding.unwrap() < 0.0);
    }
}
