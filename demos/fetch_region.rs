//! Opens a BAM file, prints per-reference index statistics, then streams every record
//! overlapping a caller-supplied region.
//!
//! ```text
//! cargo run --example fetch_region -- aligned.bam chr1:1-1000
//! ```

use std::env;
use std::process::ExitCode;

use bamcore::options::BamReaderOptions;
use bamcore::reader::BamReader;
use bamcore::region::parse_region;

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let (Some(bam_path), Some(region_str)) = (args.next(), args.next()) else {
        eprintln!("usage: fetch_region <path.bam> <region>");
        return ExitCode::FAILURE;
    };

    if let Err(e) = run(&bam_path, &region_str) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(bam_path: &str, region_str: &str) -> bamcore::error::Result<()> {
    let mut reader = BamReader::open(bam_path, BamReaderOptions::default())?;

    println!("reference\tmapped\tunmapped\ttotal");
    if reader.seekable() {
        for (idx, (mapped, unmapped, total)) in reader.get_index_stats()?.into_iter().enumerate() {
            let name = reader.get_reference_name(idx)?;
            println!("{name}\t{mapped}\t{unmapped}\t{total}");
        }
    } else {
        println!("(no index loaded; stats unavailable)");
    }

    let region = parse_region(region_str)?;
    let mut count = 0u64;
    for record in reader.fetch(&region.name, region.start, region.stop)? {
        let record = record?;
        println!(
            "ref={} pos={} flag={:#06x}",
            record.reference_id, record.position, record.flag
        );
        count += 1;
    }
    eprintln!("{count} records overlapping {region_str}");
    Ok(())
}
