use super::{AlignParams, Alignment};

const NEG: i32 = i32::MIN / 4;

/// End-gap-free banded Needleman-Wunsch.
///
/// Leading and trailing overhangs are free; internal gaps cost `gap` per
/// position. Traceback prefers diagonal, then center-consuming, then
/// raw-consuming moves so identical inputs always yield identical columns.
/// Returns `None` when no column survives (nothing worth aligning).
pub fn banded_global(center: &[u8], raw: &[u8], params: &AlignParams) -> Option<Alignment> {
    let n = center.len();
    let m = raw.len();
    if n.abs_diff(m) > params.band {
        return None;
    }

    let width = m + 1;
    let band = params.band;
    let mut scores = vec![NEG; (n + 1) * width];
    for j in 0..=m.min(band) {
        scores[j] = 0;
    }
    for i in 0..=n.min(band) {
        scores[i * width] = 0;
    }

    let substitution = |i: usize, j: usize| {
        if center[i - 1] == raw[j - 1] {
            params.match_score
        } else {
            params.mismatch
        }
    };

    for i in 1..=n {
        let lo = i.saturating_sub(band).max(1);
        let hi = (i + band).min(m);
        for j in lo..=hi {
            let diag = scores[(i - 1) * width + j - 1] + substitution(i, j);
            let up = scores[(i - 1) * width + j] + params.gap;
            let left = scores[i * width + j - 1] + params.gap;
            scores[i * width + j] = diag.max(up).max(left);
        }
    }

    // Free trailing overhang: best cell on the last row or last column.
    let mut best = (NEG, n, m);
    for j in 0..=m {
        let score = scores[n * width + j];
        if score > best.0 {
            best = (score, n, j);
        }
    }
    for i in 0..=n {
        let score = scores[i * width + m];
        if score > best.0 {
            best = (score, i, m);
        }
    }

    let (_, mut i, mut j) = best;
    let mut columns = Vec::with_capacity(n.min(m));
    let mut indels = 0;
    while i > 0 && j > 0 {
        let here = scores[i * width + j];
        if here == scores[(i - 1) * width + j - 1] + substitution(i, j) {
            columns.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if here == scores[(i - 1) * width + j] + params.gap {
            indels += 1;
            i -= 1;
        } else {
            indels += 1;
            j -= 1;
        }
    }
    if columns.is_empty() {
        return None;
    }
    columns.reverse();

    Some(Alignment::Gapped { columns, indels })
}
