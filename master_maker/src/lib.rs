//! Master Maker - combines astronomical calibration frames into master frames.
//!
//! The engine groups frames by size and sensor temperature, validates each
//! group, optionally subtracts a pedestal or a fixed reference frame, and
//! reduces the pixel stack with one of four methods:
//! - Mean
//! - Median
//! - Min/max clipped mean
//! - Sigma clipped mean
//!
//! File formats are left to the caller through [`FrameStore`] and [`MetadataSource`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use master_maker::{CancelFlag, CombineSettings, MemoryStore, ProgressCallback, Session};
//!
//! let store = MemoryStore::new();
//! // ... insert frames ...
//! let mut session = Session::new(
//!     CombineSettings::default(),
//!     &store,
//!     ProgressCallback::none(),
//!     CancelFlag::new(),
//! )?;
//! let report = session.combine_selection(&descriptors, None)?;
//! println!("Wrote {} master frames", report.masters.len());
//! ```

pub mod combine;
mod config;
mod descriptor;
mod error;
pub mod grouping;
mod memory;
mod naming;
mod precalibration;
mod progress;
mod session;
mod stack;
mod store;
pub mod validation;

// ============================================================================
// Frame metadata
// ============================================================================

pub use descriptor::{Descriptor, FrameType, SizeKey};
pub use error::{Error, Result};

// ============================================================================
// Pixel data and reduction
// ============================================================================

pub use combine::{CombineMethod, combine};
pub use precalibration::{Precalibration, precalibrate};
pub use stack::PixelStack;

// ============================================================================
// Session
// ============================================================================

pub use config::{
    CombineSettings, DEFAULT_DISPOSITION_SUBFOLDER, Disposition, PrecalibrationSettings,
};
pub use progress::{Console, ProgressCallback, ProgressEvent};
pub use session::{Session, SessionReport};

// ============================================================================
// Collaborators and naming
// ============================================================================

pub use memory::{MemoryStore, WrittenMaster};
pub use naming::{TokenValues, default_output_path, master_file_name, substitute_tokens};
pub use store::{FrameStore, MasterMetadata, MetadataSource, describe_all, move_to_subfolder};

pub use common::{Buffer2, CancelFlag, SharedFn};
