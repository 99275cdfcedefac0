//! End-to-end batch runs through the public API

use std::fs;
use std::path::Path;

use deseq2_batch::engine::write_reports;
use deseq2_batch::load_base_dataset;
use deseq2_batch::prelude::*;
use tempfile::TempDir;

const SAMPLES: [(&str, &str, &str, &str); 8] = [
    ("s1", "d1", "on", "control"),
    ("s2", "d2", "on", "control"),
    ("s3", "d3", "on", "galnac"),
    ("s4", "d4", "on", "galnac"),
    ("s5", "d1", "off", "control"),
    ("s6", "d2", "off", "control"),
    ("s7", "d3", "off", "galnac"),
    ("s8", "d4", "off", "galnac"),
];

const N_FEATURES: usize = 40;

/// f0-f4 are 4x higher with galnac under tlr on, f5-f9 3x higher with tlr on
/// under control; `low` never reaches the filter threshold
fn count(feature: usize, sample: usize) -> f64 {
    let (_, donor, tlr, dendrimer) = SAMPLES[sample];
    let base = 80.0 + 15.0 * feature as f64;
    let donor_effect = 1.0 + 0.08 * (donor.as_bytes()[1] - b'1') as f64;
    let mut effect = 1.0;
    if feature < 5 && tlr == "on" && dendrimer == "galnac" {
        effect = 4.0;
    }
    if (5..10).contains(&feature) && tlr == "on" && dendrimer == "control" {
        effect = 3.0;
    }
    let noise = 1.0 + 0.06 * (((feature * 7 + sample * 3) % 5) as f64 - 2.0);
    (base * donor_effect * effect * noise).round()
}

fn write_inputs(dir: &Path) {
    let mut counts = String::from("featureId");
    for (id, ..) in SAMPLES {
        counts.push(',');
        counts.push_str(id);
    }
    counts.push('\n');
    for f in 0..N_FEATURES {
        counts.push_str(&format!("f{}", f));
        for s in 0..SAMPLES.len() {
            counts.push_str(&format!(",{}", count(f, s)));
        }
        counts.push('\n');
    }
    counts.push_str("low,0,1,2,0,3,1,0,2\n");
    fs::write(dir.join("counts.csv"), counts).unwrap();

    // metadata rows deliberately out of count-column order
    let mut metadata = String::from("sample\tdonor\ttlr\tdendrimer\n");
    for (id, donor, tlr, dendrimer) in SAMPLES.iter().rev() {
        metadata.push_str(&format!("{}\t{}\t{}\t{}\n", id, donor, tlr, dendrimer));
    }
    fs::write(dir.join("metadata.tsv"), metadata).unwrap();

    let specs = "\
Comparison plan,,,,,
id,holdConstantFactor,holdConstantValue,varyingFactor,levelA,levelB
cmp1,tlr,on,dendrimer,control,galnac
cmp1_copy,tlr,on,dendrimer,control,galnac
,,,,,
cmp1_swapped,tlr,on,dendrimer,galnac,control
bad_factor,tlr,on,peg,peg1,peg2
no_samples,tlr,maybe,dendrimer,control,galnac
tlr_control,dendrimer,control,tlr,on,off
";
    fs::write(dir.join("comparisons.csv"), specs).unwrap();

    let mut names = String::from("featureId\tname\n");
    for f in 0..10 {
        names.push_str(&format!("f{}\tGENE{}\n", f, f));
    }
    fs::write(dir.join("names.tsv"), names).unwrap();
}

fn same(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn same_rows(a: &[FeatureRecord], b: &[FeatureRecord]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.feature_id == y.feature_id
                && x.name == y.name
                && same(x.effect_size, y.effect_size)
                && same(x.mean_abundance, y.mean_abundance)
                && same(x.p_value, y.p_value)
                && same(x.adjusted_p_value, y.adjusted_p_value)
        })
}

struct Fixture {
    dir: TempDir,
    base: BaseDataset,
    specs: Vec<ComparisonSpec>,
    names: NameTable,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let base = load_base_dataset(
        dir.path().join("counts.csv"),
        dir.path().join("metadata.tsv"),
        &LowCountFilter::default(),
    )
    .unwrap();
    let specs =
        load_comparison_specs_file(dir.path().join("comparisons.csv"), 1, &SpecColumns::default()).unwrap();
    let names = NameTable::from_file(dir.path().join("names.tsv"), "featureId", "name").unwrap();
    Fixture {
        dir,
        base,
        specs,
        names,
    }
}

fn result<'a>(outcome: &'a BatchOutcome, id: &str) -> &'a ContrastResult {
    outcome.get(id).unwrap().as_ref().unwrap()
}

fn failure<'a>(outcome: &'a BatchOutcome, id: &str) -> &'a FailureRecord {
    outcome.get(id).unwrap().as_ref().unwrap_err()
}

#[test]
fn test_inputs_load() {
    let fx = fixture();
    assert_eq!(fx.base.n_features(), N_FEATURES);
    assert_eq!(fx.base.sample_ids()[0], "s1");
    assert_eq!(fx.base.metadata().factor("tlr").unwrap()[4], "off");

    let ids: Vec<&str> = fx.specs.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["cmp1", "cmp1_copy", "cmp1_swapped", "bad_factor", "no_samples", "tlr_control"]
    );
    assert_eq!(fx.specs[0].row, 3);
}

#[test]
fn test_end_to_end_batch() {
    let fx = fixture();
    let out = fx.dir.path().join("results");
    let persister = DirectoryPersister::for_batch(&out).unwrap();
    let orchestrator = BatchOrchestrator::new(BatchConfig::default());
    let outcome = orchestrator.run(&fx.specs, &fx.base, &fx.names, &persister);

    assert_eq!(outcome.len(), fx.specs.len());
    assert_eq!(outcome.n_succeeded(), 4);

    // cmp1: 4 tlr=on samples, one per donor, so the donor term cannot be estimated
    let cmp1 = result(&outcome, "cmp1");
    assert_eq!(cmp1.formula, "~ dendrimer");
    assert_eq!(cmp1.contrast, Contrast::new("dendrimer", "control", "galnac"));
    assert_eq!(cmp1.rows.len(), N_FEATURES);
    let pvalues: Vec<f64> = cmp1.rows.iter().map(|r| r.p_value).collect();
    let first_nan = pvalues.iter().position(|p| p.is_nan()).unwrap_or(pvalues.len());
    assert!(pvalues[..first_nan].windows(2).all(|w| w[0] <= w[1]));
    assert!(pvalues[first_nan..].iter().all(|p| p.is_nan()));
    for row in &cmp1.rows {
        let index: usize = row.feature_id[1..].parse().unwrap();
        if index < 10 {
            assert_eq!(row.name.as_deref(), Some(format!("GENE{}", index).as_str()));
        } else {
            assert!(row.name.is_none());
        }
    }
    // control vs galnac: the galnac-induced features come out negative
    let f0 = cmp1.rows.iter().find(|r| r.feature_id == "f0").unwrap();
    assert!(f0.effect_size < -1.0);

    // same comparison under another id
    assert!(same_rows(&cmp1.rows, &result(&outcome, "cmp1_copy").rows));

    // swapped levels
    let swapped = result(&outcome, "cmp1_swapped");
    for (a, b) in cmp1.rows.iter().zip(&swapped.rows) {
        assert_eq!(a.feature_id, b.feature_id);
        assert!((a.effect_size + b.effect_size).abs() < 1e-9);
        assert!(same(a.p_value, b.p_value));
        assert!(same(a.adjusted_p_value, b.adjusted_p_value));
    }

    assert_eq!(failure(&outcome, "bad_factor").kind, ErrorKind::UnsupportedFactor);
    assert_eq!(failure(&outcome, "no_samples").kind, ErrorKind::EmptySubset);

    // control samples pair donors d1 and d2 across tlr levels
    let tlr = result(&outcome, "tlr_control");
    assert_eq!(tlr.formula, "~ donor + tlr");
    let f5 = tlr.rows.iter().find(|r| r.feature_id == "f5").unwrap();
    assert!(f5.effect_size > 1.0);

    let tables = out.join("comparisons");
    assert!(tables.join("cmp1.tsv").exists());
    assert!(tables.join("cmp1_volcano.html").exists());
    assert!(!tables.join("bad_factor.tsv").exists());
    let table = fs::read_to_string(tables.join("cmp1.tsv")).unwrap();
    let mut lines = table.lines();
    assert_eq!(
        lines.next().unwrap(),
        "featureId\teffectSize\tmeanAbundance\tpValue\tadjustedPValue\tname"
    );
    assert_eq!(lines.count(), N_FEATURES);

    let summary = BatchSummary::new(&outcome, 5, 0.05);
    let text = summary.to_string();
    assert!(text.contains("bad_factor | FAILED [UnsupportedFactor]"));
    write_reports(&out, &outcome, &summary, 0.05, 1.0).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("batch_outcome.json")).unwrap()).unwrap();
    let comparisons = json["comparisons"].as_array().unwrap();
    assert_eq!(comparisons.len(), 6);
    assert_eq!(comparisons[0]["status"], "succeeded");
    assert_eq!(comparisons[0]["top"].as_array().unwrap().len(), 5);
    assert_eq!(comparisons[3]["status"], "failed");
    assert_eq!(comparisons[3]["kind"], "UnsupportedFactor");
    assert!(out.join("overlap.tsv").exists());
    assert!(out.join("significant_sets.json").exists());
}

#[test]
fn test_comparison_named_like_a_report_keeps_its_table() {
    let fx = fixture();
    let specs = vec![ComparisonSpec {
        id: "overlap".to_string(),
        ..fx.specs[0].clone()
    }];
    let out = fx.dir.path().join("results");
    let persister = DirectoryPersister::for_batch(&out).unwrap().without_plots();
    let outcome = BatchOrchestrator::new(BatchConfig::default()).run(&specs, &fx.base, &fx.names, &persister);
    assert_eq!(outcome.n_succeeded(), 1);

    let summary = BatchSummary::new(&outcome, 5, 0.05);
    write_reports(&out, &outcome, &summary, 0.05, 1.0).unwrap();

    let table = fs::read_to_string(out.join("comparisons").join("overlap.tsv")).unwrap();
    let mut lines = table.lines();
    assert_eq!(
        lines.next().unwrap(),
        "featureId\teffectSize\tmeanAbundance\tpValue\tadjustedPValue\tname"
    );
    assert_eq!(lines.count(), N_FEATURES);
    let report = fs::read_to_string(out.join("overlap.tsv")).unwrap();
    assert!(report.starts_with("comparison\toverlap\n"));
}

#[test]
fn test_parallel_run_matches_sequential() {
    let fx = fixture();
    let sequential = BatchOrchestrator::new(BatchConfig::default()).run(&fx.specs, &fx.base, &fx.names, &NoopPersister);
    let parallel = BatchOrchestrator::new(BatchConfig {
        parallel: true,
        ..BatchConfig::default()
    })
    .run(&fx.specs, &fx.base, &fx.names, &NoopPersister);

    for ((id_s, s), (id_p, p)) in sequential.entries().iter().zip(parallel.entries()) {
        assert_eq!(id_s, id_p);
        match (s, p) {
            (Ok(a), Ok(b)) => assert!(same_rows(&a.rows, &b.rows)),
            (Err(a), Err(b)) => assert_eq!(a, b),
            _ => panic!("outcomes differ for {}", id_s),
        }
    }
}

#[test]
fn test_cancelled_batch_records_every_item() {
    let fx = fixture();
    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = BatchOrchestrator::new(BatchConfig::default())
        .with_cancel_token(cancel)
        .run(&fx.specs, &fx.base, &NoNames, &NoopPersister);

    assert_eq!(outcome.len(), fx.specs.len());
    assert!(outcome.failures().all(|f| f.kind == ErrorKind::Cancelled));
}

#[test]
fn test_sample_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(dir.path().join("metadata.tsv"), "sample\tdonor\ns1\td1\ns2\td2\n").unwrap();
    let err = load_base_dataset(
        dir.path().join("counts.csv"),
        dir.path().join("metadata.tsv"),
        &LowCountFilter::default(),
    )
    .unwrap_err();
    assert!(matches!(err, BatchError::SampleMismatch { .. }));
}
