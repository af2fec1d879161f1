use std::env;
use std::path::Path;
use std::process;

use cdda::core::audio::AudioSize;
use cdda::core::errors::Result;
use cdda::core::reader::{open_audio_reader, open_toc_parser};
use cdda::core::sample::SampleSequence;
use cdda::core::sink::SampleSink;
use cdda::default::{get_audio_registry, get_toc_registry};

use log::{error, info};

/// Sums the packed samples of a file, and tracks the sizes the reader reports.
#[derive(Default)]
struct Summary {
    declared: Option<AudioSize>,
    actual: Option<AudioSize>,
    samples: u64,
    sum: u32,
}

impl SampleSink for Summary {
    fn start_input(&mut self) {}

    fn append_samples(&mut self, samples: SampleSequence<'_>) {
        for sample in samples.iter() {
            self.sum = self.sum.wrapping_add(sample.to_u32());
        }
        self.samples += samples.len() as u64;
    }

    fn update_audiosize(&mut self, size: AudioSize) {
        if self.declared.is_none() {
            self.declared = Some(size);
        }
        else {
            self.actual = Some(size);
        }
    }

    fn end_input(&mut self) {}
}

fn describe(path: &Path) -> Result<()> {
    // Tables of contents are selected by name, so try them first.
    if let Some(desc) = get_toc_registry().descriptor_for(path)? {
        info!("{}: {}", path.display(), desc.name());

        let toc = open_toc_parser(get_toc_registry(), path)?.parse(path)?;

        println!("{}: {} tracks", path.display(), toc.track_count());
        for (i, track) in toc.tracks().iter().enumerate() {
            let isrc = track.isrc.as_deref().unwrap_or("-");
            println!("  {:2}  offset {:6}  isrc {}", i + 1, track.offset, isrc);
        }
        if let Some(leadout) = toc.leadout() {
            println!("  leadout {}", leadout);
        }
        return Ok(());
    }

    let mut reader = open_audio_reader(get_audio_registry(), path)?;
    let mut summary = Summary::default();

    let size = reader.process_file(path, &mut summary)?;

    println!("{}: {} samples, {} frames", path.display(), size.samples(), size.frames());

    if let (Some(declared), Some(actual)) = (summary.declared, summary.actual) {
        if declared != actual {
            println!("  declared {} samples", declared.samples());
        }
    }

    println!("  sum of packed samples {:08x}", summary.sum);

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        eprintln!("usage: cdda-info FILE...");
        process::exit(2);
    }

    let mut failed = false;

    for arg in &args {
        if let Err(err) = describe(Path::new(arg)) {
            error!("{}: {}", arg, err);
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
}
