//! Image filters.

pub mod resample;
pub mod intensity;
pub mod threshold;
pub mod morphology;
pub mod connected;

pub use resample::ResampleImageFilter;
pub use intensity::{cast_image, minimum_maximum, shift_intensity, shift_to_zero_minimum};
pub use threshold::{binary_threshold, otsu_threshold};
pub use morphology::fill_holes;
pub use connected::{keep_largest_component, label_components, ComponentLabels};
