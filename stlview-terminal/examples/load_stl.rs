/// Example: Import an STL file in the background and print its statistics
///
/// Usage: cargo run --example load_stl -- path/to/file.stl
use std::env;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::time::Duration;
use stlview_core::{
    geometry::cube_triangles, IngestError, Ingested, IngestionJob, MemorySource, MeshInfo, StlImporter,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let job = if args.len() < 2 {
        eprintln!("Usage: {} <stl-file>", args[0]);
        eprintln!("\nNo STL file provided, using default cube...");
        IngestionJob::open(MemorySource::new("cube", cube_triangles(2.0)))?
    } else {
        println!("Loading STL file: {}", args[1]);
        let importer = StlImporter::from_reader(BufReader::new(File::open(&args[1])?))?;
        IngestionJob::open(importer)?
    };

    // Poll progress on a fixed cadence until the job finishes
    let mut stdout = io::stdout();
    while job.wait_event(Duration::from_millis(50)).is_none() {
        print!(
            "\r{:>5.1}% ({} of {} facets)",
            job.progress() * 100.0,
            job.facets_processed(),
            job.expected_facets()
        );
        stdout.flush()?;
    }
    println!();

    match job.finish() {
        Ok(Ingested::Completed(mesh)) => println!("{}", MeshInfo::of(&mesh)),
        Ok(Ingested::Cancelled(_)) => println!("Import cancelled"),
        Err(IngestError::Stream(err)) => eprintln!("Failed to parse STL: {err}"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
