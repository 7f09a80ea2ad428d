pub mod buffer2;
pub mod cancel_flag;
pub mod log_setup;
pub mod serde_format;
pub mod shared_fn;

pub use buffer2::Buffer2;
pub use cancel_flag::CancelFlag;
pub use shared_fn::SharedFn;
