//! Image transformation for production builds, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Resize** | `image::DynamicImage::resize_exact` with Lanczos3 |
//! | **Encode JPEG** | `jpeg-encoder` (quality + progressive scan) |
//! | **Encode PNG / WebP / TIFF** | `image` encoders (lossless) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing the transformation
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Planning which files get transformed and running them

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::calculate_bounded_dimensions;
pub use operations::{TransformConfig, plan_transform, transform_image};
pub use params::{OutputFormat, Quality, TransformParams};
pub use rust_backend::RustBackend;
