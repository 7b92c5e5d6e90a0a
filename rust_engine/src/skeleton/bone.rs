//! 骨骼节点

use glam::{Mat4, Quat, Vec3};

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub parent_index: i32,

    // 初始位置（世界空间）
    pub initial_position: Vec3,
    // 相对于父骨骼的偏移（在build_hierarchy中计算）
    pub bone_offset: Vec3,

    // 附加变换（付与親）：跟随另一根骨骼的旋转/移动
    pub append_parent: i32,
    pub append_rate: f32,
    pub is_append_rotate: bool,
    pub is_append_translate: bool,

    // 动画状态（控制器与动作写入）
    pub animation_translate: Vec3,
    pub animation_rotate: Quat,

    // 骨骼 Morph 叠加量
    pub morph_translate: Vec3,
    pub morph_rotate: Quat,

    // 变换结果
    pub local_transform: Mat4,
    pub global_transform: Mat4,
}

impl Bone {
    pub fn new(name: String) -> Self {
        Self {
            name,
            parent_index: -1,
            initial_position: Vec3::ZERO,
            bone_offset: Vec3::ZERO,
            append_parent: -1,
            append_rate: 0.0,
            is_append_rotate: false,
            is_append_translate: false,
            animation_translate: Vec3::ZERO,
            animation_rotate: Quat::IDENTITY,
            morph_translate: Vec3::ZERO,
            morph_rotate: Quat::IDENTITY,
            local_transform: Mat4::IDENTITY,
            global_transform: Mat4::IDENTITY,
        }
    }

    /// 指定父骨骼与初始位置创建
    pub fn with_parent(name: &str, parent_index: i32, initial_position: Vec3) -> Self {
        let mut bone = Self::new(name.to_string());
        bone.parent_index = parent_index;
        bone.initial_position = initial_position;
        bone
    }

    /// 设置当前位移
    pub fn set_current_position(&mut self, position: Vec3) {
        self.animation_translate = position;
    }

    /// 设置当前旋转
    pub fn set_current_rotation(&mut self, rotation: Quat) {
        self.animation_rotate = rotation;
    }

    /// 重置动画状态
    pub fn reset_animation(&mut self) {
        self.animation_translate = Vec3::ZERO;
        self.animation_rotate = Quat::IDENTITY;
    }

    /// 重置骨骼 Morph 叠加量
    pub fn reset_morph(&mut self) {
        self.morph_translate = Vec3::ZERO;
        self.morph_rotate = Quat::IDENTITY;
    }

    /// 叠加骨骼 Morph：位移相加，旋转左乘
    pub fn add_morph(&mut self, translate: Vec3, rotate: Quat) {
        self.morph_translate += translate;
        self.morph_rotate = rotate * self.morph_rotate;
    }

    /// 更新本地变换
    /// 1. 平移 = bone_offset + animation_translate + morph_translate (+ 附加移动)
    /// 2. 旋转 = morph_rotate * animation_rotate (* 附加旋转)
    ///
    /// `append` 为附加父骨骼的 (animation_translate, animation_rotate)。
    pub fn update_local_transform(&mut self, append: Option<(Vec3, Quat)>) {
        let mut translate = self.animation_translate + self.morph_translate;
        let mut rotation = self.morph_rotate * self.animation_rotate;

        if let Some((append_translate, append_rotate)) = append {
            if self.is_append_translate && self.append_rate != 0.0 {
                translate += append_translate * self.append_rate;
            }
            if self.is_append_rotate {
                // 负的比率表示反向跟随
                let follow = if self.append_rate >= 0.0 {
                    Quat::IDENTITY.slerp(append_rotate, self.append_rate)
                } else {
                    Quat::IDENTITY.slerp(append_rotate.inverse(), -self.append_rate)
                };
                rotation = rotation * follow;
            }
        }

        self.local_transform = Mat4::from_rotation_translation(rotation, translate + self.bone_offset);
    }

    /// 当前世界空间位置
    pub fn world_position(&self) -> Vec3 {
        self.global_transform.w_axis.truncate()
    }
}

impl Default for Bone {
    fn default() -> Self {
        Self::new(String::new())
    }
}
