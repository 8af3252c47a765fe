use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

const RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWY";
const FEATURES: [&str; 6] = ["length", "hydrophobicity", "charge", "aromatic", "acidic", "basic"];
const N_PEPTIDES: usize = 400;
const N_FRACTIONS: i64 = 5;

/// Kyte-Doolittle hydropathy.
fn hydropathy(residue: char) -> f64 {
    match residue {
        'A' => 1.8,
        'C' => 2.5,
        'D' => -3.5,
        'E' => -3.5,
        'F' => 2.8,
        'G' => -0.4,
        'H' => -3.2,
        'I' => 4.5,
        'K' => -3.9,
        'L' => 3.8,
        'M' => 1.9,
        'N' => -3.5,
        'P' => -1.6,
        'Q' => -3.5,
        'R' => -4.5,
        'S' => -0.8,
        'T' => -0.7,
        'V' => 4.2,
        'W' => -0.9,
        'Y' => -1.3,
        _ => 0.0,
    }
}

/// Tryptic-like peptide: random body, C-terminal K or R.
fn random_peptide(rng: &mut StdRng) -> String {
    let residues: Vec<char> = RESIDUES.chars().collect();
    let len = rng.gen_range(7..=25);
    let mut seq: String = (0..len - 1).map(|_| residues[rng.gen_range(0..residues.len())]).collect();
    seq.push(if rng.gen_bool(0.5) { 'K' } else { 'R' });
    seq
}

fn features(seq: &str) -> [f64; 6] {
    let count = |set: &str| seq.chars().filter(|c| set.contains(*c)).count() as f64;
    let len = seq.len() as f64;
    let hydro = seq.chars().map(hydropathy).sum::<f64>() / len;
    let acidic = count("DE");
    let basic = count("KRH");
    [len, hydro, basic - acidic, count("FWY"), acidic, basic]
}

struct Sample {
    sequences: Vec<String>,
    fractions: Vec<i64>,
    scores: Vec<f64>,
    features: Vec<[f64; 6]>,
}

fn generate(n: usize, seed: u64) -> Result<Sample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.4).context("building noise distribution")?;
    let mut sample = Sample {
        sequences: Vec::with_capacity(n),
        fractions: Vec::with_capacity(n),
        scores: Vec::with_capacity(n),
        features: Vec::with_capacity(n),
    };
    for _ in 0..n {
        let seq = random_peptide(&mut rng);
        let f = features(&seq);
        // Elution position rises with hydrophobicity and falls with charge.
        let latent = 3.0 + 1.2 * f[1] - 0.3 * f[2] + noise.sample(&mut rng);
        let fraction = (latent.round() as i64).clamp(1, N_FRACTIONS);
        sample.scores.push(rng.gen_range(20.0..200.0));
        sample.fractions.push(fraction);
        sample.features.push(f);
        sample.sequences.push(seq);
    }
    Ok(sample)
}

fn write_csv(sample: &Sample, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["Sequence", "Fraction", "Score"];
    header.extend(FEATURES);
    writer.write_record(&header)?;
    for i in 0..sample.sequences.len() {
        let mut record = vec![
            sample.sequences[i].clone(),
            sample.fractions[i].to_string(),
            format!("{:.2}", sample.scores[i]),
        ];
        record.extend(sample.features[i].iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_parquet(sample: &Sample, path: &Path) -> Result<()> {
    let mut fields = vec![
        Field::new("Sequence", DataType::Utf8, false),
        Field::new("Fraction", DataType::Int64, false),
        Field::new("Score", DataType::Float64, false),
    ];
    fields.extend(FEATURES.iter().map(|name| Field::new(*name, DataType::Float64, false)));
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(sample.sequences.clone())),
        Arc::new(Int64Array::from(sample.fractions.clone())),
        Arc::new(Float64Array::from(sample.scores.clone())),
    ];
    for j in 0..FEATURES.len() {
        let values: Vec<f64> = sample.features.iter().map(|f| f[j]).collect();
        columns.push(Arc::new(Float64Array::from(values)));
    }

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let sample = generate(N_PEPTIDES, 42)?;
    let csv_path = Path::new("sample_peptides.csv");
    let parquet_path = Path::new("sample_peptides.parquet");
    write_csv(&sample, csv_path)?;
    write_parquet(&sample, parquet_path)?;

    println!(
        "Wrote {} peptides ({} features, fractions 1-{N_FRACTIONS}) to {} and {}",
        sample.sequences.len(),
        FEATURES.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
