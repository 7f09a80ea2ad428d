//! Drives validation, grouping, combination, output, and disposition for a batch of frames.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use common::CancelFlag;

use crate::combine::combine;
use crate::config::{CombineSettings, Disposition, PrecalibrationSettings};
use crate::descriptor::{Descriptor, FrameType};
use crate::error::{Error, Result};
use crate::grouping::{meets_minimum, size_groups, temperature_groups};
use crate::naming::{TokenValues, master_file_name, substitute_tokens};
use crate::precalibration::{Precalibration, precalibrate};
use crate::progress::{Console, ProgressCallback};
use crate::stack::PixelStack;
use crate::store::{FrameStore, MasterMetadata};
use crate::validation::{
    all_of_type, all_same_filter, compatible_sizes, mean_exposure_and_temperature,
    most_common_filter,
};

/// Outcome of a session run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    /// Master frames written, in processing order.
    pub masters: Vec<PathBuf>,
    /// Groups skipped for being below the minimum group size.
    pub skipped_groups: usize,
    /// Groups whose fixed calibration frame did not match their dimensions.
    pub failed_groups: usize,
    /// Original paths of inputs moved into the disposition subfolder.
    pub relocated: Vec<PathBuf>,
    /// Cancellation was observed and remaining groups were not processed.
    pub cancelled: bool,
}

/// One combine run over a set of frames.
///
/// Cancellation is checked between groups only. Masters already written stay written.
pub struct Session<'a> {
    settings: CombineSettings,
    store: &'a dyn FrameStore,
    console: Console,
    cancel: CancelFlag,
    started: NaiveDateTime,
}

impl<'a> Session<'a> {
    pub fn new(
        settings: CombineSettings,
        store: &'a dyn FrameStore,
        progress: ProgressCallback,
        cancel: CancelFlag,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            store,
            console: Console::new(progress),
            cancel,
            started: Local::now().naive_local(),
        })
    }

    /// Pin the timestamp used for generated names and `%d`/`%t` tokens.
    pub fn with_start_time(mut self, started: NaiveDateTime) -> Self {
        self.started = started;
        self
    }

    pub fn settings(&self) -> &CombineSettings {
        &self.settings
    }

    /// Grouped run when any grouping is enabled, otherwise one combined selection.
    pub fn run(
        &mut self,
        descriptors: &[Descriptor],
        output_path: Option<&Path>,
        output_dir: Option<&Path>,
    ) -> Result<SessionReport> {
        if self.settings.is_grouped() {
            let dir = output_dir.ok_or_else(|| {
                Error::InvalidSettings("grouped processing needs an output directory".to_string())
            })?;
            self.combine_groups(descriptors, dir)
        } else {
            self.combine_selection(descriptors, output_path)
        }
    }

    /// Combine every descriptor into one master.
    ///
    /// Without an explicit `output_path` the master is named from the first
    /// input and placed next to it. Tokens in `output_path` are substituted.
    pub fn combine_selection(
        &mut self,
        descriptors: &[Descriptor],
        output_path: Option<&Path>,
    ) -> Result<SessionReport> {
        let level = self.console.level();
        self.console.push_level();
        let result = self.selection_inner(descriptors, output_path);
        self.console.reset_level(level);
        result
    }

    fn selection_inner(
        &mut self,
        descriptors: &[Descriptor],
        output_path: Option<&Path>,
    ) -> Result<SessionReport> {
        self.console.message("Using single-file processing", 1);
        self.check_group(descriptors)?;

        let mut report = SessionReport::default();
        if self.cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        let calibration = self.resolve_precalibration()?;
        let tokens = TokenValues::at(self.started, most_common_filter(descriptors));
        let output = match output_path {
            Some(path) => PathBuf::from(substitute_tokens(&path.to_string_lossy(), &tokens)),
            None => crate::naming::default_output_path(
                self.settings.frame_type,
                self.settings.method,
                &descriptors[0],
                self.started,
            ),
        };

        self.combine_and_write(descriptors, &output, &calibration)?;
        report.masters.push(output);

        if self.cancel.is_cancelled() {
            report.cancelled = true;
        } else {
            self.dispose(descriptors, &tokens, &mut report);
        }

        self.console.message("Combining complete", 0);
        Ok(report)
    }

    /// Group the descriptors and write one master per group into `output_dir`.
    ///
    /// The directory is created if missing; if that fails nothing is processed.
    pub fn combine_groups(
        &mut self,
        descriptors: &[Descriptor],
        output_dir: &Path,
    ) -> Result<SessionReport> {
        let level = self.console.level();
        self.console.push_level();
        let result = self.groups_inner(descriptors, output_dir);
        self.console.reset_level(level);
        result
    }

    fn groups_inner(&mut self, descriptors: &[Descriptor], output_dir: &Path) -> Result<SessionReport> {
        self.console.message(
            format!("Process groups into output directory: {}", output_dir.display()),
            1,
        );
        self.store
            .ensure_directory(output_dir)
            .map_err(|source| Error::OutputDirectoryUnavailable {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let calibration = self.resolve_precalibration()?;
        let by_size = self.settings.group_by_size;
        let by_temperature = self.settings.group_by_temperature;
        let tolerance = self.settings.temperature_tolerance;
        let minimum = self.settings.minimum_group_size;

        let mut report = SessionReport::default();

        'sizes: for size_group in size_groups(descriptors, by_size) {
            let Some(sample) = size_group.first() else {
                continue;
            };
            self.console.push_level();
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break 'sizes;
            }

            if !meets_minimum(size_group.len(), minimum) {
                let text = if by_size {
                    format!(
                        "Ignoring one size group: {} files sized {}",
                        size_group.len(),
                        sample.size_key()
                    )
                } else {
                    below_minimum(size_group.len(), minimum)
                };
                self.console.message(text, 1);
                report.skipped_groups += 1;
                self.console.pop_level();
                continue;
            }

            if by_size {
                self.console.message(
                    format!(
                        "Processing one size group: {} files sized {}",
                        size_group.len(),
                        sample.size_key()
                    ),
                    1,
                );
            }

            for group in temperature_groups(&size_group, by_temperature, tolerance) {
                self.console.push_level();
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'sizes;
                }

                let (_, mean_temperature) = mean_exposure_and_temperature(&group);
                if !meets_minimum(group.len(), minimum) {
                    let text = if by_temperature {
                        format!(
                            "Ignoring one temperature group: {} files at temp near {mean_temperature:.1}",
                            group.len()
                        )
                    } else {
                        below_minimum(group.len(), minimum)
                    };
                    self.console.message(text, 1);
                    report.skipped_groups += 1;
                } else {
                    if by_temperature {
                        self.console.message(
                            format!(
                                "Processing one temperature group: {} files at temp near {mean_temperature:.1} ({}% threshold)",
                                group.len(),
                                tolerance * 100.0
                            ),
                            1,
                        );
                    }
                    let level = self.console.level();
                    match self.process_group(&group, output_dir, &calibration, &mut report) {
                        Ok(()) => {}
                        Err(err @ Error::CalibrationDimensionMismatch { .. }) => {
                            self.console.reset_level(level);
                            tracing::warn!("{err}");
                            self.console
                                .message(format!("Skipping group of {} files: {err}", group.len()), 1);
                            report.failed_groups += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
                self.console.pop_level();
            }
            self.console.pop_level();
        }

        if report.cancelled {
            tracing::info!(
                masters = report.masters.len(),
                "Group combining cancelled"
            );
        } else {
            self.console.message("Group combining complete", 0);
        }
        Ok(report)
    }

    /// Combine one group. A calibration frame of the wrong size fails only this group.
    fn process_group(
        &mut self,
        group: &[Descriptor],
        output_dir: &Path,
        calibration: &Precalibration,
        report: &mut SessionReport,
    ) -> Result<()> {
        self.console.push_level();
        self.describe_group(group);
        self.check_group(group)?;

        let tokens = TokenValues::at(self.started, most_common_filter(group));
        let name = master_file_name(
            self.settings.frame_type,
            self.settings.method,
            &group[0],
            self.started,
        );
        let output = output_dir.join(name);

        self.combine_and_write(group, &output, calibration)?;
        report.masters.push(output);

        if self.cancel.is_cancelled() {
            report.cancelled = true;
        } else {
            self.dispose(group, &tokens, report);
        }
        self.console.pop_level();
        Ok(())
    }

    fn describe_group(&self, group: &[Descriptor]) {
        let sample = &group[0];
        let mut text = format!("Processing {} files", group.len());
        if self.settings.group_by_size {
            text.push_str(&format!(" binned {0} x {0}", sample.binning));
        }
        if self.settings.group_by_temperature {
            if self.settings.group_by_size {
                text.push(',');
            }
            text.push_str(&format!(" at {} degrees.", sample.temperature));
        }
        self.console.message(text, 1);
    }

    /// Fail fast, before any pixel data is read.
    fn check_group(&self, group: &[Descriptor]) -> Result<()> {
        if group.is_empty() {
            return Err(Error::EmptyInput);
        }
        if !compatible_sizes(group) {
            return Err(Error::IncompatibleSizes);
        }
        let frame_type = self.settings.frame_type;
        if !self.settings.ignore_frame_type && !all_of_type(group, frame_type) {
            return Err(Error::WrongFrameType {
                expected: frame_type,
            });
        }
        if frame_type == FrameType::Flat && !self.settings.ignore_filter && !all_same_filter(group)
        {
            return Err(Error::FilterMismatch);
        }
        Ok(())
    }

    fn resolve_precalibration(&self) -> Result<Precalibration> {
        Ok(match &self.settings.precalibration {
            PrecalibrationSettings::None => Precalibration::None,
            PrecalibrationSettings::Pedestal { value } => Precalibration::Pedestal(*value),
            PrecalibrationSettings::FixedFrame { path } => {
                let plane = self
                    .store
                    .read_plane(path)
                    .map_err(|source| Error::ReadFrame {
                        path: path.clone(),
                        source,
                    })?;
                Precalibration::FixedFrame(plane)
            }
        })
    }

    fn combine_and_write(
        &mut self,
        group: &[Descriptor],
        output: &Path,
        calibration: &Precalibration,
    ) -> Result<()> {
        let sample = &group[0];
        if let Precalibration::FixedFrame(frame) = calibration {
            let expected = (sample.width, sample.height);
            if frame.dimensions() != expected {
                return Err(Error::CalibrationDimensionMismatch {
                    expected,
                    actual: frame.dimensions(),
                });
            }
        }

        let method = self.settings.method;
        self.console.push_level();
        self.console.message(
            format!("Combining {} frames using {}", group.len(), method.label()),
            1,
        );

        let planes = group
            .iter()
            .map(|d| {
                self.store
                    .read_plane(&d.path)
                    .map_err(|source| Error::ReadFrame {
                        path: d.path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let stack = precalibrate(PixelStack::from_planes(planes)?, calibration)?;
        let plane = combine(&stack, method)?;
        drop(stack);

        let frame_type = self.settings.frame_type;
        let (exposure, temperature) = mean_exposure_and_temperature(group);
        let metadata = MasterMetadata {
            frame_type,
            exposure,
            temperature,
            filter: most_common_filter(group),
            binning: sample.binning,
            comment: method.provenance(frame_type),
        };
        self.store
            .write_master(output, &plane, &metadata)
            .map_err(|source| Error::WriteMaster {
                path: output.to_path_buf(),
                source,
            })?;

        tracing::info!(
            path = %output.display(),
            frames = group.len(),
            method = %method,
            "Wrote master frame"
        );
        self.console.message(format!("Wrote {}", output.display()), 1);
        self.console.pop_level();
        Ok(())
    }

    /// Move consumed inputs into the configured subfolder.
    ///
    /// A file that cannot be moved is reported and left in place.
    fn dispose(&self, group: &[Descriptor], tokens: &TokenValues, report: &mut SessionReport) {
        if self.settings.disposition == Disposition::Nothing {
            return;
        }
        let subfolder = substitute_tokens(&self.settings.disposition_subfolder, tokens);
        self.console
            .message(format!("Moving processed files to {subfolder}"), 0);

        for d in group {
            match self.store.relocate(&d.path, &subfolder) {
                Ok(_) => {
                    self.console.file_relocated(&d.path);
                    report.relocated.push(d.path.clone());
                }
                Err(source) => {
                    let err = Error::RelocateFrame {
                        path: d.path.clone(),
                        subfolder: subfolder.clone(),
                        source,
                    };
                    tracing::warn!("{err}");
                    self.console.message(err.to_string(), 1);
                }
            }
        }
    }
}

fn below_minimum(len: usize, minimum: Option<usize>) -> String {
    match minimum {
        Some(minimum) => format!("Ignoring {len} files: fewer than minimum group size {minimum}"),
        None => format!("Ignoring {len} files"),
    }
}
