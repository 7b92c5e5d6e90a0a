//! 动作数据
//!
//! 提供 VMD 动作解析与按文件缓存的 MotionStocker。

mod keyframe;
mod motion;
mod stocker;
mod vmd_loader;

pub use keyframe::{BoneKeyframe, MorphKeyframe, LINEAR_INTERPOLATION};
pub use motion::Motion;
pub use stocker::{MotionHandle, MotionSource, MotionStocker, SharedMotionStocker};
pub use vmd_loader::VmdFile;
