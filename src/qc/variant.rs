//! Per-variant QC: genotype counting, allele frequency statistics, and the
//! Hardy-Weinberg-equilibrium exact test.

use super::genotype::Call;

/// Tally of decoded calls across all samples at one variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenotypeCounts {
    pub n_hom_ref: u32,
    pub n_het: u32,
    pub n_hom_alt: u32,
    pub n_missing: u32,
    /// Haploid and `OtherAltHet` calls are counted but excluded from the
    /// Hardy-Weinberg triad below.
    pub n_other: u32,
}

impl GenotypeCounts {
    pub fn n_called(&self) -> u32 {
        self.n_hom_ref + self.n_het + self.n_hom_alt + self.n_other
    }

    pub fn total(&self) -> u32 {
        self.n_called() + self.n_missing
    }
}

/// Count decoded calls into a [`GenotypeCounts`] tally.
pub fn compute_genotype_counts<I: IntoIterator<Item = Call>>(calls: I) -> GenotypeCounts {
    let mut counts = GenotypeCounts::default();
    for call in calls {
        match call {
            Call::HomRef => counts.n_hom_ref += 1,
            Call::Het => counts.n_het += 1,
            Call::HomAlt => counts.n_hom_alt += 1,
            Call::Missing => counts.n_missing += 1,
            Call::OtherAltHet => counts.n_other += 1,
            // Haploid calls are tracked in `n_other` only: they are not a
            // diploid hom-ref/hom-alt observation and must not feed AAF/HWE
            // computation, which assume two alleles per sample.
            Call::Haploid { .. } => counts.n_other += 1,
        }
    }
    counts
}

/// Allele frequency statistics derived from genotype counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlleleFrequencyStats {
    /// Alternate allele frequency.
    pub aaf: f64,
    /// Minor allele frequency (`min(aaf, 1-aaf)`).
    pub maf: f64,
    /// Minor allele count, in called chromosomes.
    pub mac: u32,
}

/// Derive AAF/MAF/MAC from hom-ref/het/hom-alt counts (diploid calls only;
/// `n_other` callers should exclude non-diploid calls before calling this).
pub fn compute_allele_frequency(counts: &GenotypeCounts) -> Option<AlleleFrequencyStats> {
    let n_diploid = counts.n_hom_ref + counts.n_het + counts.n_hom_alt;
    if n_diploid == 0 {
        return None;
    }
    let total_alleles = n_diploid * 2;
    let alt_alleles = counts.n_het + counts.n_hom_alt * 2;
    let aaf = alt_alleles as f64 / total_alleles as f64;
    let maf = aaf.min(1.0 - aaf);
    let mac = alt_alleles.min(total_alleles - alt_alleles);
    Some(AlleleFrequencyStats { aaf, maf, mac })
}

/// Exact Hardy-Weinberg-equilibrium test p-value (Wigginton, Cutler &
/// Abecasis, 2005), mirroring the PL/pgSQL `hwe_exact_test` function this
/// pipeline also runs inside the database.
///
/// `obs_hets`, `obs_hom1`, `obs_hom2` are observed het / hom-allele-1 /
/// hom-allele-2 genotype counts (allele-1 and allele-2 are interchangeable).
pub fn hwe_exact_test(obs_hets: u32, obs_hom1: u32, obs_hom2: u32) -> f64 {
    if obs_hets + obs_hom1 + obs_hom2 == 0 {
        return 1.0;
    }

    let obs_homr = obs_hom1.min(obs_hom2);
    let obs_homc = obs_hom1.max(obs_hom2);
    let rare_copies = 2 * obs_homr + obs_hets;
    let genotypes = obs_hets + obs_homc + obs_homr;

    if genotypes == 0 {
        return 1.0;
    }

    let mut het_probs = vec![0.0f64; rare_copies as usize + 1];

    let mut mid = rare_copies * (2 * genotypes - rare_copies) / (2 * genotypes);
    if mid % 2 != rare_copies % 2 {
        mid += 1;
    }

    let mut curr_hets = mid;
    let mut curr_homr = (rare_copies - mid) / 2;
    let mut curr_homc = genotypes - curr_hets - curr_homr;

    het_probs[mid as usize] = 1.0;
    let mut sum = het_probs[mid as usize];

    curr_hets = mid;
    curr_homr = (rare_copies - mid) / 2;
    curr_homc = genotypes - curr_hets - curr_homr;
    while curr_hets >= 2 {
        het_probs[(curr_hets - 2) as usize] = het_probs[curr_hets as usize] * curr_hets as f64
            * (curr_hets - 1) as f64
            / (4.0 * (curr_homr + 1) as f64 * (curr_homc + 1) as f64);
        sum += het_probs[(curr_hets - 2) as usize];
        curr_homr += 1;
        curr_homc += 1;
        curr_hets -= 2;
    }

    curr_hets = mid;
    curr_homr = (rare_copies - mid) / 2;
    curr_homc = genotypes - curr_hets - curr_homr;
    while curr_hets <= rare_copies.saturating_sub(2) {
        het_probs[(curr_hets + 2) as usize] = het_probs[curr_hets as usize]
            * 4.0
            * curr_homr as f64
            * curr_homc as f64
            / ((curr_hets + 2) as f64 * (curr_hets + 1) as f64);
        sum += het_probs[(curr_hets + 2) as usize];
        curr_homr = curr_homr.saturating_sub(1);
        curr_homc = curr_homc.saturating_sub(1);
        curr_hets += 2;
    }

    for prob in het_probs.iter_mut() {
        *prob /= sum;
    }

    let target = het_probs[obs_hets as usize];
    let p_value: f64 = het_probs.iter().filter(|&&p| p <= target + 1e-12).sum();

    p_value.min(1.0)
}
