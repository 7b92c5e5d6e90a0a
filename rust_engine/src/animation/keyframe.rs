//! 动画关键帧

use glam::{Quat, Vec3};

/// 骨骼关键帧
#[derive(Clone, Debug)]
pub struct BoneKeyframe {
    pub frame_index: u32,
    pub translation: Vec3,
    pub orientation: Quat,
    /// 贝塞尔插值参数 (x1, y1, x2, y2)
    pub interpolation_x: [u8; 4],
    pub interpolation_y: [u8; 4],
    pub interpolation_z: [u8; 4],
    pub interpolation_r: [u8; 4],
}

impl BoneKeyframe {
    pub fn new(frame_index: u32) -> Self {
        Self {
            frame_index,
            translation: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            interpolation_x: LINEAR_INTERPOLATION,
            interpolation_y: LINEAR_INTERPOLATION,
            interpolation_z: LINEAR_INTERPOLATION,
            interpolation_r: LINEAR_INTERPOLATION,
        }
    }
}

/// 线性插值对应的贝塞尔控制点
pub const LINEAR_INTERPOLATION: [u8; 4] = [20, 20, 107, 107];

/// Morph 关键帧
#[derive(Clone, Debug)]
pub struct MorphKeyframe {
    pub frame_index: u32,
    pub weight: f32,
}

impl MorphKeyframe {
    pub fn new(frame_index: u32, weight: f32) -> Self {
        Self { frame_index, weight }
    }
}
