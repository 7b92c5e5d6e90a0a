//! 骨骼系统

mod bone;
mod manager;

pub use bone::Bone;
pub use manager::BoneManager;
