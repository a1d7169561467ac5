//! HapMap3 reference panel matching (C6): chromosome normalization, allele
//! flip/strand-complement matching, and strand-ambiguity detection.

use std::path::Path;

use sqlx::PgPool;

use crate::err::{LoaderError, LoaderResult};

/// One HapMap3 reference panel entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hapmap3Variant {
    pub chrom: String,
    pub pos: u64,
    pub ref_allele: String,
    pub alt_allele: String,
}

/// How a query variant's alleles related to a matched HapMap3 entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOrientation {
    /// REF/ALT identical to the reference entry.
    Exact,
    /// REF/ALT swapped relative to the reference entry.
    Flipped,
    /// REF/ALT are the strand-complement of the reference entry.
    StrandComplement,
    /// Strand-complement AND swapped.
    FlippedStrandComplement,
}

fn complement_base(base: char) -> Option<char> {
    match base.to_ascii_uppercase() {
        'A' => Some('T'),
        'T' => Some('A'),
        'C' => Some('G'),
        'G' => Some('C'),
        _ => None,
    }
}

/// Complement every base of a single-character-per-base allele string.
/// Returns `None` if any base is not one of A/C/G/T.
pub fn complement_allele(allele: &str) -> Option<String> {
    allele.chars().map(complement_base).collect()
}

/// A SNP is strand-ambiguous when its REF/ALT pair is its own
/// strand-complement: `{A,T}` or `{C,G}`.
pub fn is_strand_ambiguous(ref_allele: &str, alt_allele: &str) -> bool {
    matches!(
        (ref_allele.to_ascii_uppercase().as_str(), alt_allele.to_ascii_uppercase().as_str()),
        ("A", "T") | ("T", "A") | ("C", "G") | ("G", "C")
    )
}

/// Try to match a query `(ref, alt)` against a HapMap3 reference entry's
/// `(ref, alt)` at the same position, trying direct, flipped, and
/// strand-complement (with and without flip) orientations in turn.
///
/// Strand-ambiguous SNPs (`{A,T}`/`{C,G}`) are matched as-is without
/// attempting allele-frequency-based disambiguation: the reference panel
/// entry is trusted to already be on the forward strand, and guessing from
/// allele frequency alone is a heuristic this pipeline does not apply.
pub fn match_hapmap3_variant(
    query_ref: &str,
    query_alt: &str,
    ref_ref: &str,
    ref_alt: &str,
) -> Option<MatchOrientation> {
    if query_ref == ref_ref && query_alt == ref_alt {
        return Some(MatchOrientation::Exact);
    }
    if query_ref == ref_alt && query_alt == ref_ref {
        return Some(MatchOrientation::Flipped);
    }

    let comp_ref = complement_allele(query_ref)?;
    let comp_alt = complement_allele(query_alt)?;

    if comp_ref == ref_ref && comp_alt == ref_alt {
        return Some(MatchOrientation::StrandComplement);
    }
    if comp_ref == ref_alt && comp_alt == ref_ref {
        return Some(MatchOrientation::FlippedStrandComplement);
    }

    None
}

/// Match a query variant against a HapMap3 panel entry, normalizing both
/// sides' chromosome names first.
pub fn match_against_panel(
    query_chrom: &str,
    query_pos: u64,
    query_ref: &str,
    query_alt: &str,
    panel_entry: &Hapmap3Variant,
) -> Option<MatchOrientation> {
    if crate::common::normalize_chrom(query_chrom) != crate::common::normalize_chrom(&panel_entry.chrom) {
        return None;
    }
    if query_pos != panel_entry.pos {
        return None;
    }
    match_hapmap3_variant(query_ref, query_alt, &panel_entry.ref_allele, &panel_entry.alt_allele)
}

/// Parse one panel file line (`chrom  pos  ref  alt`, whitespace-separated)
/// into a [`Hapmap3Variant`], normalizing its chromosome name.
pub fn parse_panel_line(line: &str) -> Option<Hapmap3Variant> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    let pos: u64 = fields[1].parse().ok()?;
    Some(Hapmap3Variant {
        chrom: crate::common::normalize_chrom(fields[0]),
        pos,
        ref_allele: fields[2].to_string(),
        alt_allele: fields[3].to_string(),
    })
}

/// Load a HapMap3 reference panel file into the `hapmap3_panel` table,
/// upserting each entry keyed by `(chrom, pos)`. Returns the number of
/// entries loaded. Blank lines and `#`-prefixed comments are skipped; any
/// other malformed line aborts the load.
pub async fn load_panel(pool: &PgPool, path: &Path) -> LoaderResult<u64> {
    let contents = std::fs::read_to_string(path).map_err(|e| LoaderError::InputMalformed {
        line: 0,
        message: format!("cannot read {}: {e}", path.display()),
    })?;

    let mut n_loaded = 0u64;
    for (line_no, line) in contents.lines().enumerate() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(entry) = parse_panel_line(line) else {
            return Err(LoaderError::InputMalformed {
                line: line_no,
                message: format!("malformed HapMap3 panel line: {line:?}"),
            });
        };
        sqlx::query(crate::db::hapmap3_schema::UPSERT_HAPMAP3_PANEL_SQL)
            .bind(&entry.chrom)
            .bind(entry.pos as i64)
            .bind(&entry.ref_allele)
            .bind(&entry.alt_allele)
            .execute(pool)
            .await
            .map_err(|e| LoaderError::StoreTransient { attempts: 1, source: e })?;
        n_loaded += 1;
    }
    Ok(n_loaded)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_panel_line_normalizes_chrom() {
        let entry = parse_panel_line("chr1\t1000\tA\tG").unwrap();
        assert_eq!(entry.chrom, "1");
        assert_eq!(entry.pos, 1000);
        assert_eq!(entry.ref_allele, "A");
        assert_eq!(entry.alt_allele, "G");
    }

    #[test]
    fn parse_panel_line_rejects_short_lines() {
        assert!(parse_panel_line("chr1\t1000").is_none());
    }

    #[rstest::rstest]
    #[case("A", Some("T".to_string()))]
    #[case("ACGT", Some("TGCA".to_string()))]
    #[case("N", None)]
    fn complement_allele_cases(#[case] allele: &str, #[case] expected: Option<String>) {
        assert_eq!(complement_allele(allele), expected);
    }

    #[rstest::rstest]
    #[case("A", "T", true)]
    #[case("T", "A", true)]
    #[case("C", "G", true)]
    #[case("G", "C", true)]
    #[case("A", "C", false)]
    #[case("A", "G", false)]
    fn strand_ambiguous_cases(#[case] r: &str, #[case] a: &str, #[case] expected: bool) {
        assert_eq!(is_strand_ambiguous(r, a), expected);
    }

    #[test]
    fn exact_match() {
        assert_eq!(match_hapmap3_variant("A", "G", "A", "G"), Some(MatchOrientation::Exact));
    }

    #[test]
    fn flipped_match() {
        assert_eq!(match_hapmap3_variant("G", "A", "A", "G"), Some(MatchOrientation::Flipped));
    }

    #[test]
    fn strand_complement_match() {
        // query C/A vs panel G/T: complement(C)=G, complement(A)=T -> matches directly.
        assert_eq!(
            match_hapmap3_variant("C", "A", "G", "T"),
            Some(MatchOrientation::StrandComplement)
        );
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(match_hapmap3_variant("C", "A", "A", "G"), None);
    }

    #[test]
    fn match_against_panel_normalizes_chrom_and_checks_pos() {
        let panel = Hapmap3Variant {
            chrom: "1".to_string(),
            pos: 1000,
            ref_allele: "A".to_string(),
            alt_allele: "G".to_string(),
        };
        assert_eq!(
            match_against_panel("chr1", 1000, "A", "G", &panel),
            Some(MatchOrientation::Exact)
        );
        assert_eq!(match_against_panel("chr2", 1000, "A", "G", &panel), None);
        assert_eq!(match_against_panel("chr1", 1001, "A", "G", &panel), None);
    }
}
