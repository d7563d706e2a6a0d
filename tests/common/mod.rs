use std::fs;
use std::path::{Path, PathBuf};

const UPDATE_VAR: &str = "ASV_DENOISE_UPDATE_SNAPSHOTS";

fn snapshot_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
        .join(name)
}

/// Compare tab-separated output against a stored snapshot, row by row.
///
/// Line endings, trailing whitespace and trailing blank lines are ignored.
pub fn assert_tsv_snapshot(name: &str, actual: &str) {
    let path = snapshot_path(name);
    if std::env::var(UPDATE_VAR).is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {path:?} not found"));
    let expected_rows = rows(&expected);
    let actual_rows = rows(actual);

    for (line, (want, got)) in expected_rows.iter().zip(&actual_rows).enumerate() {
        if want == got {
            continue;
        }
        let field = want
            .iter()
            .zip(got)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| want.len().min(got.len()));
        panic!(
            "{path:?} line {} differs at field {field}: expected {want:?}, got {got:?}. \
             Set {UPDATE_VAR}=1 to regenerate.",
            line + 1
        );
    }
    assert_eq!(
        expected_rows.len(),
        actual_rows.len(),
        "{path:?} row count differs. Set {UPDATE_VAR}=1 to regenerate."
    );
}

fn rows(input: &str) -> Vec<Vec<&str>> {
    let mut rows: Vec<Vec<&str>> = input
        .lines()
        .map(|line| line.trim_end().split('\t').collect())
        .collect();
    while rows.last().is_some_and(|row| row.iter().all(|f| f.is_empty())) {
        rows.pop();
    }
    rows
}
