//! Example: Combine a synthetic batch of bias frames into temperature-grouped masters
//!
//! Builds noisy bias frames at two sensor temperatures and two binnings in an
//! in-memory store, then runs a grouped session with min/max clipping. Progress
//! messages are printed with their indentation; logs go to the console and to
//! a daily log file in the system temp directory.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --example synthetic_session
//! ```

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use master_maker::{
    Buffer2, CancelFlag, CombineMethod, CombineSettings, Descriptor, Disposition, FrameType,
    MemoryStore, ProgressCallback, ProgressEvent, Session, SharedFn,
};

fn main() -> anyhow::Result<()> {
    let log_dir = std::env::temp_dir().join("master_maker_logs");
    common::log_setup::setup_logging("info", &log_dir)?;

    let store = MemoryStore::new();
    let descriptors = synthetic_frames(&store);
    tracing::info!(frames = descriptors.len(), "Generated synthetic bias frames");

    let settings = CombineSettings {
        method: CombineMethod::MinMaxClip { drop: 2 },
        frame_type: FrameType::Bias,
        disposition: Disposition::Subfolder,
        group_by_size: true,
        group_by_temperature: true,
        temperature_tolerance: 0.1,
        minimum_group_size: Some(4),
        ..Default::default()
    };

    let progress: ProgressCallback =
        SharedFn::new(Arc::new(|event: ProgressEvent| match event {
            ProgressEvent::Message { level, text } => println!("{}{text}", "  ".repeat(level)),
            ProgressEvent::FileRelocated { path } => println!("    moved {}", path.display()),
        }));

    let mut session = Session::new(settings, &store, progress, CancelFlag::new())?;
    let report = session.run(&descriptors, None, Some(Path::new("/masters")))?;

    println!();
    println!(
        "{} masters, {} skipped groups, {} failed groups, {} inputs moved",
        report.masters.len(),
        report.skipped_groups,
        report.failed_groups,
        report.relocated.len()
    );
    for master in store.masters() {
        let pixels = master.plane.pixels();
        let mean = pixels.iter().map(|&v| f64::from(v)).sum::<f64>() / pixels.len() as f64;
        println!(
            "  {} ({:.1} C, mean level {mean:.1}): {}",
            master.path.display(),
            master.metadata.temperature,
            master.metadata.comment
        );
    }

    Ok(())
}

/// Six frames per (binning, temperature) pair, plus a pair at an odd temperature
/// that the minimum group size filters out.
fn synthetic_frames(store: &MemoryStore) -> Vec<Descriptor> {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut descriptors = Vec::new();

    let batches: [(u32, f64, usize); 5] = [
        (1, -10.0, 6),
        (1, -20.0, 6),
        (2, -10.0, 6),
        (2, -20.0, 6),
        (1, 5.0, 2),
    ];
    for (binning, temperature, count) in batches {
        let width = 320 / binning as usize;
        let height = 240 / binning as usize;
        let pedestal = if temperature < -15.0 { 990 } else { 1010 };

        for i in 0..count {
            let path = format!("/frames/bias_b{binning}_{temperature}_{i:02}.fit");
            let descriptor = Descriptor::new(path, width, height)
                .with_binning(binning)
                .with_temperature(temperature + rng.random_range(-0.3..0.3))
                .with_exposure(0.001)
                .with_frame_type(FrameType::Bias);
            let plane = Buffer2::from_fn(width, height, |_, _| {
                if rng.random_range(0..5000) == 0 {
                    rng.random_range(30_000..=u16::MAX)
                } else {
                    pedestal + rng.random_range(0..20)
                }
            });
            store.insert(descriptor.clone(), plane);
            descriptors.push(descriptor);
        }
    }

    descriptors
}
