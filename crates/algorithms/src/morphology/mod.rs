//! Binary mask morphology
//!
//! - **Mode filter**: focal majority over a circular or square window
//! - **Connected components**: 4- or 8-connected labelling and size filter
//! - **MaskCleaner**: mode filter, small-group removal and self-masking

mod cleaner;
mod components;
mod element;
mod mode;

pub use cleaner::{clean_mask, count_true, self_mask, CleanerParams, MaskCleaner};
pub use components::{label_components, remove_small_components, Components, Connectivity};
pub use element::{Kernel, KernelShape};
pub use mode::mode_filter;
