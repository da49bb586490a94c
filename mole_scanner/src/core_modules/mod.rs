pub mod annotation;
pub mod blob_selector;
pub mod color_sampler;
pub mod frame;
pub mod pixel;
pub mod region;
pub mod segmentation;
pub mod symmetry;
pub mod utils;
