//! 表情形状：Morph 聚合与形状映射表

mod face_interface;
mod shape_map;

pub use face_interface::{FaceInterface, WeightCurve, MAX_MORPH_ASSIGN};
pub use shape_map::{ShapeMap, MORPH_TUNE_MAX_LEN, MORPH_TUNE_MAX_SETS};
