use anyhow::{anyhow, bail, Context, Result};
use std::io::{BufRead, Write};

use crate::error_model::ErrorModel;
use crate::learning::DenoiseResult;
use crate::sequence::{Base, SampleId, SampleStore, UniqueSequence};

const UNIQUES_HEADER: &str = "#sample\tsequence\tabundance\tqualities\n";
const VARIANTS_HEADER: &str = "#sample\tvariant\tabundance\tsequence\tmembers\n";
const MODEL_HEADER: &str = "#bucket\tmin_quality\treference\tobserved\tprobability\n";

/// Read unique sequences grouped by sample.
///
/// One line per unique: sample id, sequence, abundance and comma-separated
/// per-position qualities. Lines starting with `#` and blank lines are
/// skipped. Samples keep their first-appearance order.
pub fn read_uniques<R: BufRead>(reader: R) -> Result<Vec<SampleStore>> {
    let mut samples: Vec<SampleStore> = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            bail!(
                "line {}: expected 4 tab-separated fields, found {}",
                line_no + 1,
                fields.len()
            );
        }
        let abundance: u64 = fields[2]
            .parse()
            .with_context(|| format!("line {}: invalid abundance '{}'", line_no + 1, fields[2]))?;
        let qualities = fields[3]
            .split(',')
            .map(|q| q.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("line {}: invalid quality list", line_no + 1))?;
        let unique = UniqueSequence::new(fields[1], abundance, qualities);

        match samples.iter_mut().find(|s| s.id.as_ref() == fields[0]) {
            Some(sample) => sample.uniques.push(unique),
            None => samples.push(SampleStore::new(SampleId::from(fields[0]), vec![unique])),
        }
    }
    Ok(samples)
}

/// Write samples in the format accepted by [`read_uniques`].
pub fn write_uniques<W: Write>(writer: &mut W, samples: &[SampleStore]) -> Result<()> {
    writer.write_all(UNIQUES_HEADER.as_bytes())?;
    for sample in samples {
        for unique in &sample.uniques {
            let qualities = unique
                .quality_profile
                .iter()
                .map(|q| q.to_string())
                .collect::<Vec<_>>()
                .join(",");
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                sample.id,
                unique.as_str(),
                unique.abundance,
                qualities
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write inferred variants, one line per variant, samples in id order.
///
/// Variant numbers are 1-based within each sample; members are the input
/// indices of the sequences folded into the variant.
pub fn write_variants<W: Write>(writer: &mut W, result: &DenoiseResult) -> Result<()> {
    writer.write_all(VARIANTS_HEADER.as_bytes())?;
    for (id, sample) in &result.samples {
        for (n, variant) in sample.variants.iter().enumerate() {
            let members = variant
                .member_indices
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(",");
            writeln!(
                writer,
                "{id}\t{n}\t{abundance}\t{seq}\t{members}",
                n = n + 1,
                abundance = variant.abundance,
                seq = variant.as_str(),
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Render variants into a string (useful for tests and snapshots).
pub fn render_variants(result: &DenoiseResult) -> Result<String> {
    let mut buffer = Vec::new();
    write_variants(&mut buffer, result)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered variants are not valid UTF-8"))
}

/// Write every defined row of an error model.
pub fn write_error_model<W: Write>(writer: &mut W, model: &ErrorModel) -> Result<()> {
    writer.write_all(MODEL_HEADER.as_bytes())?;
    let buckets = model.buckets();
    for bucket in 0..buckets.count() {
        for reference in Base::ALL {
            let Some(row) = model.row(bucket, reference) else {
                continue;
            };
            for observed in Base::ALL {
                writeln!(
                    writer,
                    "{bucket}\t{min_q}\t{r}\t{o}\t{p:.6e}",
                    min_q = buckets.lower_bound(bucket),
                    r = reference.to_ascii() as char,
                    o = observed.to_ascii() as char,
                    p = row[observed.index()],
                )?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
