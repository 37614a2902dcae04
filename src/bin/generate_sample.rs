use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Write a synthetic KDD-style ARFF file for trying out `kdd-partition`.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Args {
    /// Number of connection records.
    #[arg(short, long, default_value_t = 1000)]
    rows: usize,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    #[arg(short, long, default_value = "sample_kdd.arff")]
    output: PathBuf,
}

/// (protocol, weight, services that run over it)
const PROTOCOLS: [(&str, f64, &[&str]); 3] = [
    ("tcp", 0.82, &["http", "ftp_data", "smtp", "private"]),
    ("udp", 0.12, &["domain_u", "private", "ntp_u"]),
    ("icmp", 0.06, &["ecr_i", "eco_i"]),
];

const FLAGS: [&str; 4] = ["SF", "S0", "REJ", "RSTO"];

fn pick_protocol(rng: &mut StdRng) -> usize {
    let mut roll: f64 = rng.gen();
    for (i, (_, weight, _)) in PROTOCOLS.iter().enumerate() {
        if roll < *weight {
            return i;
        }
        roll -= weight;
    }
    PROTOCOLS.len() - 1
}

fn write_header(out: &mut impl Write) -> std::io::Result<()> {
    let services: Vec<&str> = {
        let mut all: Vec<&str> = PROTOCOLS.iter().flat_map(|(_, _, s)| s.iter().copied()).collect();
        all.sort_unstable();
        all.dedup();
        all
    };
    let protocols: Vec<&str> = PROTOCOLS.iter().map(|(p, _, _)| *p).collect();

    writeln!(out, "% Synthetic connection records in the NSL-KDD layout")?;
    writeln!(out, "@relation 'KDDSample'")?;
    writeln!(out)?;
    writeln!(out, "@attribute 'duration' real")?;
    writeln!(out, "@attribute 'protocol_type' {{'{}'}}", protocols.join("','"))?;
    writeln!(out, "@attribute 'service' {{'{}'}}", services.join("','"))?;
    writeln!(out, "@attribute 'flag' {{'{}'}}", FLAGS.join("','"))?;
    writeln!(out, "@attribute 'src_bytes' real")?;
    writeln!(out, "@attribute 'dst_bytes' real")?;
    writeln!(out, "@attribute 'class' {{'normal','anomaly'}}")?;
    writeln!(out)?;
    writeln!(out, "@data")
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    write_header(&mut out).context("writing ARFF header")?;

    for _ in 0..args.rows {
        let (protocol, _, services) = PROTOCOLS[pick_protocol(&mut rng)];
        let service = services[rng.gen_range(0..services.len())];
        let flag = FLAGS[rng.gen_range(0..FLAGS.len())];
        let anomaly = flag != "SF" || rng.gen_bool(0.1);

        let duration = if protocol == "tcp" { rng.gen_range(0..300) } else { 0 };
        let src_bytes: u32 = rng.gen_range(0..20_000);
        let dst_bytes: u32 = if anomaly { 0 } else { rng.gen_range(0..50_000) };
        let class = if anomaly { "anomaly" } else { "normal" };

        writeln!(
            out,
            "{duration},{protocol},{service},{flag},{src_bytes},{dst_bytes},{class}"
        )
        .context("writing ARFF row")?;
    }
    out.flush().context("flushing output")?;

    println!("Wrote {} records to {}", args.rows, args.output.display());
    Ok(())
}
