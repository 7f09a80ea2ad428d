use std::sync::Arc;

use chrono::NaiveDate;
use common::{Buffer2, SharedFn};
use parking_lot::Mutex;

use super::*;
use crate::combine::CombineMethod;
use crate::memory::MemoryStore;
use crate::progress::ProgressEvent;

type Events = Arc<Mutex<Vec<ProgressEvent>>>;

fn evening() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(22, 5, 0)
        .unwrap()
}

fn frame(name: &str, width: usize, height: usize, temperature: f64) -> Descriptor {
    Descriptor::new(format!("/frames/{name}"), width, height)
        .with_temperature(temperature)
        .with_frame_type(FrameType::Bias)
}

fn add(store: &MemoryStore, descriptor: &Descriptor, value: u16) {
    store.insert(
        descriptor.clone(),
        Buffer2::new_filled(descriptor.width, descriptor.height, value),
    );
}

/// Three 2x2 bias frames at -10 C filled with 10, 20 and 30.
fn three_frames(store: &MemoryStore) -> Vec<Descriptor> {
    ["a.fit", "b.fit", "c.fit"]
        .iter()
        .zip([10u16, 20, 30])
        .map(|(name, value)| {
            let d = frame(name, 2, 2, -10.0);
            add(store, &d, value);
            d
        })
        .collect()
}

fn recorder() -> (ProgressCallback, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: ProgressCallback =
        SharedFn::new(Arc::new(move |event: ProgressEvent| sink.lock().push(event)));
    (callback, events)
}

fn messages(events: &Events) -> Vec<String> {
    events
        .lock()
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Message { text, .. } => Some(text.clone()),
            ProgressEvent::FileRelocated { .. } => None,
        })
        .collect()
}

fn session<'a>(
    settings: CombineSettings,
    store: &'a MemoryStore,
    progress: ProgressCallback,
    cancel: CancelFlag,
) -> Session<'a> {
    Session::new(settings, store, progress, cancel)
        .unwrap()
        .with_start_time(evening())
}

fn mean_settings() -> CombineSettings {
    CombineSettings {
        method: CombineMethod::Mean,
        ..Default::default()
    }
}

#[test]
fn test_selection_writes_master_next_to_inputs() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    let (progress, events) = recorder();

    let report = session(mean_settings(), &store, progress, CancelFlag::new())
        .combine_selection(&frames, None)
        .unwrap();

    let expected_path =
        PathBuf::from("/frames/BIAS-Mean-20240301-2205-0.000s--10.0C-2x2-1x1.fit");
    assert_eq!(report.masters, vec![expected_path.clone()]);
    assert!(!report.cancelled);

    let masters = store.masters();
    assert_eq!(masters.len(), 1);
    assert_eq!(masters[0].path, expected_path);
    assert_eq!(masters[0].plane.pixels(), &[20, 20, 20, 20]);
    assert_eq!(masters[0].metadata.comment, "Master Bias MEAN combined");
    assert_eq!(masters[0].metadata.frame_type, FrameType::Bias);
    assert_eq!(masters[0].metadata.binning, 1);
    assert!((masters[0].metadata.temperature + 10.0).abs() < 1e-12);

    let messages = messages(&events);
    assert_eq!(messages.first().map(String::as_str), Some("Using single-file processing"));
    assert_eq!(messages.last().map(String::as_str), Some("Combining complete"));
}

#[test]
fn test_selection_substitutes_tokens_in_output_path() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);

    let report = session(mean_settings(), &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, Some(Path::new("/masters/bias-%d-%t.fit")))
        .unwrap();

    assert_eq!(
        report.masters,
        vec![PathBuf::from("/masters/bias-20240301-2205.fit")]
    );
}

#[test]
fn test_selection_validation_errors_touch_no_pixels() {
    let store = MemoryStore::new();
    let mut frames = three_frames(&store);
    let odd = frame("odd.fit", 3, 2, -10.0);
    add(&store, &odd, 0);
    frames.push(odd);

    let result = session(mean_settings(), &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None);

    assert!(matches!(result, Err(Error::IncompatibleSizes)));
    assert!(store.masters().is_empty());

    let result = session(mean_settings(), &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&[], None);
    assert!(matches!(result, Err(Error::EmptyInput)));
}

#[test]
fn test_selection_frame_type_check_and_override() {
    let store = MemoryStore::new();
    let mut frames = three_frames(&store);
    let dark = frame("dark.fit", 2, 2, -10.0).with_frame_type(FrameType::Dark);
    add(&store, &dark, 20);
    frames.push(dark);

    let result = session(mean_settings(), &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None);
    assert!(matches!(
        result,
        Err(Error::WrongFrameType {
            expected: FrameType::Bias
        })
    ));

    let settings = CombineSettings {
        ignore_frame_type: true,
        ..mean_settings()
    };
    let report = session(settings, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None)
        .unwrap();
    assert_eq!(report.masters.len(), 1);
}

#[test]
fn test_flat_filter_mismatch() {
    let store = MemoryStore::new();
    let frames: Vec<_> = [("r.fit", "Red"), ("g.fit", "Green")]
        .iter()
        .map(|(name, filter)| {
            let d = frame(name, 2, 2, 0.0)
                .with_frame_type(FrameType::Flat)
                .with_filter(*filter);
            add(&store, &d, 1000);
            d
        })
        .collect();
    let flat = CombineSettings {
        frame_type: FrameType::Flat,
        ..mean_settings()
    };

    let result = session(flat.clone(), &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None);
    assert!(matches!(result, Err(Error::FilterMismatch)));

    let ignoring = CombineSettings {
        ignore_filter: true,
        ..flat
    };
    let report = session(ignoring, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None)
        .unwrap();
    assert_eq!(report.masters.len(), 1);
    assert_eq!(store.masters()[0].metadata.comment, "Master Flat MEAN combined");
}

#[test]
fn test_fixed_frame_precalibration() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    store.insert_plane("/cal/bias.fit", Buffer2::new_filled(2, 2, 5));
    let settings = CombineSettings {
        precalibration: PrecalibrationSettings::FixedFrame {
            path: PathBuf::from("/cal/bias.fit"),
        },
        ..mean_settings()
    };

    session(settings, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None)
        .unwrap();

    assert_eq!(store.masters()[0].plane.pixels(), &[15, 15, 15, 15]);
}

#[test]
fn test_fixed_frame_mismatch_writes_nothing() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    store.insert_plane("/cal/bias.fit", Buffer2::new_filled(3, 3, 5));
    let settings = CombineSettings {
        precalibration: PrecalibrationSettings::FixedFrame {
            path: PathBuf::from("/cal/bias.fit"),
        },
        ..mean_settings()
    };

    let result = session(settings, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None);

    assert!(matches!(
        result,
        Err(Error::CalibrationDimensionMismatch {
            expected: (2, 2),
            actual: (3, 3)
        })
    ));
    assert!(store.masters().is_empty());
}

#[test]
fn test_missing_calibration_frame() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    let settings = CombineSettings {
        precalibration: PrecalibrationSettings::FixedFrame {
            path: PathBuf::from("/cal/missing.fit"),
        },
        ..mean_settings()
    };

    let result = session(settings, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None);

    match result {
        Err(Error::ReadFrame { path, .. }) => assert_eq!(path, PathBuf::from("/cal/missing.fit")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_pedestal_precalibration_clamps() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    let settings = CombineSettings {
        precalibration: PrecalibrationSettings::Pedestal { value: 25 },
        ..mean_settings()
    };

    session(settings, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None)
        .unwrap();

    // 10 and 20 clamp to 0, 30 becomes 5: mean 1.67.
    assert_eq!(store.masters()[0].plane.pixels(), &[2, 2, 2, 2]);
}

#[test]
fn test_unreadable_frame_identifies_path() {
    let store = MemoryStore::new();
    let mut frames = three_frames(&store);
    frames.push(frame("gone.fit", 2, 2, -10.0));

    let result = session(mean_settings(), &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, None);

    match result {
        Err(Error::ReadFrame { path, .. }) => assert_eq!(path, PathBuf::from("/frames/gone.fit")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(store.masters().is_empty());
}

#[test]
fn test_unwritable_output() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    store.deny_directory("/masters");

    let result = session(mean_settings(), &store, ProgressCallback::none(), CancelFlag::new())
        .combine_selection(&frames, Some(Path::new("/masters/out.fit")));

    assert!(matches!(result, Err(Error::WriteMaster { .. })));
}

#[test]
fn test_disposition_moves_inputs() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    let (progress, events) = recorder();
    let settings = CombineSettings {
        disposition: Disposition::Subfolder,
        ..mean_settings()
    };

    let report = session(settings, &store, progress, CancelFlag::new())
        .combine_selection(&frames, None)
        .unwrap();

    let originals: Vec<_> = frames.iter().map(|d| d.path.clone()).collect();
    assert_eq!(report.relocated, originals);
    let targets: Vec<_> = store.relocations().into_iter().map(|(_, to)| to).collect();
    assert_eq!(
        targets[0],
        PathBuf::from("/frames/originals-20240301-2205/a.fit")
    );

    let relocated_events = events
        .lock()
        .iter()
        .filter(|e| matches!(e, ProgressEvent::FileRelocated { .. }))
        .count();
    assert_eq!(relocated_events, 3);
    assert!(messages(&events).contains(&"Moving processed files to originals-20240301-2205".to_string()));
}

#[test]
fn test_failed_relocation_is_reported_and_skipped() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    store.deny_directory("/frames/keep");
    let (progress, events) = recorder();
    let settings = CombineSettings {
        disposition: Disposition::Subfolder,
        disposition_subfolder: "keep".to_string(),
        ..mean_settings()
    };

    let report = session(settings, &store, progress, CancelFlag::new())
        .combine_selection(&frames, None)
        .unwrap();

    assert_eq!(report.masters.len(), 1);
    assert!(report.relocated.is_empty());
    let failures = messages(&events)
        .iter()
        .filter(|m| m.starts_with("Failed to move"))
        .count();
    assert_eq!(failures, 3);
}

fn mixed_sizes(store: &MemoryStore) -> Vec<Descriptor> {
    let mut frames = Vec::new();
    for (i, temperature) in [-10.0, -10.1, -9.9].iter().enumerate() {
        let d = frame(&format!("wide{i}.fit"), 4, 2, *temperature);
        add(store, &d, 100);
        frames.push(d);
    }
    for (i, temperature) in [-10.0, -10.2].iter().enumerate() {
        let d = frame(&format!("small{i}.fit"), 2, 2, *temperature);
        add(store, &d, 200);
        frames.push(d);
    }
    frames
}

#[test]
fn test_groups_by_size() {
    let store = MemoryStore::new();
    let frames = mixed_sizes(&store);
    let (progress, events) = recorder();
    let settings = CombineSettings {
        group_by_size: true,
        ..mean_settings()
    };

    let report = session(settings, &store, progress, CancelFlag::new())
        .combine_groups(&frames, Path::new("/masters"))
        .unwrap();

    assert_eq!(report.masters.len(), 2);
    assert!(report.masters.iter().all(|p| p.starts_with("/masters")));
    assert_eq!(store.directories(), vec![PathBuf::from("/masters")]);

    let mut values: Vec<_> = store.masters().iter().map(|m| m.plane.pixels()[0]).collect();
    values.sort();
    assert_eq!(values, vec![100, 200]);

    let messages = messages(&events);
    assert!(messages.contains(
        &"Processing one size group: 3 files sized binned 1 x 1, dimensions 4 x 2".to_string()
    ));
    assert!(messages.contains(
        &"Processing one size group: 2 files sized binned 1 x 1, dimensions 2 x 2".to_string()
    ));
    assert_eq!(messages.last().map(String::as_str), Some("Group combining complete"));
}

#[test]
fn test_small_size_group_is_skipped() {
    let store = MemoryStore::new();
    let frames = mixed_sizes(&store);
    let (progress, events) = recorder();
    let settings = CombineSettings {
        group_by_size: true,
        minimum_group_size: Some(3),
        ..mean_settings()
    };

    let report = session(settings, &store, progress, CancelFlag::new())
        .combine_groups(&frames, Path::new("/masters"))
        .unwrap();

    assert_eq!(report.masters.len(), 1);
    assert_eq!(report.skipped_groups, 1);
    assert_eq!(store.masters()[0].plane.pixels()[0], 100);
    assert!(messages(&events).contains(
        &"Ignoring one size group: 2 files sized binned 1 x 1, dimensions 2 x 2".to_string()
    ));
}

#[test]
fn test_temperature_groups_with_minimum() {
    let store = MemoryStore::new();
    let mut frames = Vec::new();
    for (i, temperature) in [-20.0, -20.1, -19.9, -10.0, -10.2].iter().enumerate() {
        let d = frame(&format!("t{i}.fit"), 2, 2, *temperature);
        add(&store, &d, 50);
        frames.push(d);
    }
    let (progress, events) = recorder();
    let settings = CombineSettings {
        group_by_temperature: true,
        minimum_group_size: Some(3),
        ..mean_settings()
    };

    let report = session(settings, &store, progress, CancelFlag::new())
        .combine_groups(&frames, Path::new("/masters"))
        .unwrap();

    assert_eq!(report.masters.len(), 1);
    assert_eq!(report.skipped_groups, 1);

    let messages = messages(&events);
    assert!(messages.contains(&"Ignoring one temperature group: 2 files at temp near -10.1".to_string()));
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("Processing one temperature group: 3 files at temp near -20.0"))
    );
    // Size grouping is off, so no size-group messages.
    assert!(!messages.iter().any(|m| m.contains("size group")));
}

#[test]
fn test_group_errors_abort_run() {
    let store = MemoryStore::new();
    let mut frames = mixed_sizes(&store);
    frames[4] = frames[4].clone().with_frame_type(FrameType::Dark);
    let settings = CombineSettings {
        group_by_size: true,
        ..mean_settings()
    };

    let result = session(settings, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_groups(&frames, Path::new("/masters"));

    assert!(matches!(result, Err(Error::WrongFrameType { .. })));
}

#[test]
fn test_calibration_size_mismatch_fails_only_that_group() {
    let store = MemoryStore::new();
    let frames = mixed_sizes(&store);
    store.insert_plane("/cal/bias.fit", Buffer2::new_filled(4, 2, 5));
    let (progress, events) = recorder();
    let settings = CombineSettings {
        group_by_size: true,
        precalibration: PrecalibrationSettings::FixedFrame {
            path: PathBuf::from("/cal/bias.fit"),
        },
        ..mean_settings()
    };

    let report = session(settings, &store, progress, CancelFlag::new())
        .combine_groups(&frames, Path::new("/masters"))
        .unwrap();

    assert_eq!(report.masters.len(), 1);
    assert_eq!(report.failed_groups, 1);
    assert_eq!(report.skipped_groups, 0);
    let masters = store.masters();
    assert_eq!(masters.len(), 1);
    assert_eq!(masters[0].plane.pixels(), &[95; 8]);

    let messages = messages(&events);
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("Skipping group of 2 files: Calibration frame is (4, 2)"))
    );
    assert_eq!(messages.last().map(String::as_str), Some("Group combining complete"));
}

#[test]
fn test_small_batch_skip_is_reported_without_size_grouping() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    let (progress, events) = recorder();
    let settings = CombineSettings {
        group_by_temperature: true,
        minimum_group_size: Some(5),
        ..mean_settings()
    };

    let report = session(settings, &store, progress, CancelFlag::new())
        .combine_groups(&frames, Path::new("/masters"))
        .unwrap();

    assert!(report.masters.is_empty());
    assert_eq!(report.skipped_groups, 1);
    assert!(store.masters().is_empty());

    let messages = messages(&events);
    assert!(messages.contains(&"Ignoring 3 files: fewer than minimum group size 5".to_string()));
    assert!(!messages.iter().any(|m| m.contains("size group")));
}

#[test]
fn test_output_directory_unavailable() {
    let store = MemoryStore::new();
    let frames = mixed_sizes(&store);
    store.deny_directory("/readonly");
    let settings = CombineSettings {
        group_by_size: true,
        ..mean_settings()
    };

    let result = session(settings, &store, ProgressCallback::none(), CancelFlag::new())
        .combine_groups(&frames, Path::new("/readonly/masters"));

    match result {
        Err(Error::OutputDirectoryUnavailable { path, .. }) => {
            assert_eq!(path, PathBuf::from("/readonly/masters"))
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(store.masters().is_empty());
}

#[test]
fn test_cancelled_before_start() {
    let store = MemoryStore::new();
    let frames = mixed_sizes(&store);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let settings = CombineSettings {
        group_by_size: true,
        ..mean_settings()
    };

    let report = session(settings.clone(), &store, ProgressCallback::none(), cancel.clone())
        .combine_groups(&frames, Path::new("/masters"))
        .unwrap();
    assert!(report.cancelled);
    assert!(report.masters.is_empty());

    let report = session(mean_settings(), &store, ProgressCallback::none(), cancel)
        .combine_selection(&frames[..3], None)
        .unwrap();
    assert!(report.cancelled);
    assert!(store.masters().is_empty());
}

#[test]
fn test_cancel_between_groups_keeps_finished_master() {
    let store = MemoryStore::new();
    let frames = mixed_sizes(&store);
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    let progress: ProgressCallback = SharedFn::new(Arc::new(move |event: ProgressEvent| {
        if matches!(&event, ProgressEvent::Message { text, .. } if text.starts_with("Wrote")) {
            trigger.cancel();
        }
    }));
    let settings = CombineSettings {
        group_by_size: true,
        disposition: Disposition::Subfolder,
        ..mean_settings()
    };

    let report = session(settings, &store, progress, cancel)
        .combine_groups(&frames, Path::new("/masters"))
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.masters.len(), 1, "second group never starts");
    assert!(report.relocated.is_empty(), "cancelled group keeps its inputs");
    assert!(store.relocations().is_empty());
}

#[test]
fn test_run_dispatch() {
    let store = MemoryStore::new();
    let frames = three_frames(&store);
    let grouped = CombineSettings {
        group_by_temperature: true,
        ..mean_settings()
    };

    let result = session(grouped.clone(), &store, ProgressCallback::none(), CancelFlag::new())
        .run(&frames, None, None);
    assert!(matches!(result, Err(Error::InvalidSettings(_))));

    let report = session(grouped, &store, ProgressCallback::none(), CancelFlag::new())
        .run(&frames, None, Some(Path::new("/masters")))
        .unwrap();
    assert_eq!(report.masters.len(), 1);

    let report = session(mean_settings(), &store, ProgressCallback::none(), CancelFlag::new())
        .run(&frames, Some(Path::new("/out/master.fit")), None)
        .unwrap();
    assert_eq!(report.masters, vec![PathBuf::from("/out/master.fit")]);
}

#[test]
fn test_invalid_settings_rejected_up_front() {
    let store = MemoryStore::new();
    let settings = CombineSettings {
        temperature_tolerance: 2.0,
        ..Default::default()
    };
    let result = Session::new(settings, &store, ProgressCallback::none(), CancelFlag::new());
    assert!(matches!(result, Err(Error::InvalidSettings(_))));
}
