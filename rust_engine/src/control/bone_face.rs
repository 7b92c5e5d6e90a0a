//! 骨骼/表情控制
//!
//! 把 KeyValue 中的一个信号映射到骨骼姿态或 Morph 权重：
//! 有键名时按信号值在 `[min, max]` 间插值；
//! 没有键名时强制写入端点值，表情控制还会在给定时长内从模型当前权重过渡过去。

use glam::{Quat, Vec3};

use crate::config::get_config;
use crate::model::MmdModel;
use crate::morph::MorphType;
use crate::{MmdError, Result};

use super::KeyValue;

/// 控制目标
#[derive(Clone, Debug)]
pub enum ControlTarget {
    Bone {
        pos0: Vec3,
        pos1: Vec3,
        rot0: Quat,
        rot1: Quat,
        /// 绑定后的骨骼索引
        bone: Option<usize>,
        /// 需要随之更新的子孙骨骼（父在前）
        children: Vec<usize>,
    },
    Morph {
        val0: f32,
        val1: f32,
        morph: Option<(usize, MorphType)>,
    },
}

/// 骨骼/表情控制
#[derive(Clone, Debug)]
pub struct BoneFaceControl {
    key_name: Option<String>,
    target_name: String,
    min: f32,
    max: f32,
    target: ControlTarget,
    duration_frame: f64,
    rest_frame: f64,
}

impl BoneFaceControl {
    /// 骨骼控制：`from`/`to` 为两端的 (位移, 旋转)
    pub fn bone(
        key_name: Option<&str>,
        min: f32,
        max: f32,
        bone_name: &str,
        from: (Vec3, Quat),
        to: (Vec3, Quat),
    ) -> Self {
        Self {
            key_name: key_name.map(str::to_string),
            target_name: bone_name.to_string(),
            min,
            max,
            target: ControlTarget::Bone {
                pos0: from.0,
                pos1: to.0,
                rot0: from.1,
                rot1: to.1,
                bone: None,
                children: Vec::new(),
            },
            duration_frame: 0.0,
            rest_frame: 0.0,
        }
    }

    /// 表情控制
    ///
    /// 没有键名时 `value1` 是过渡时长（秒），起点在绑定模型时取 Morph 当前权重。
    pub fn morph(key_name: Option<&str>, min: f32, max: f32, morph_name: &str, value0: f32, value1: f32) -> Self {
        let (val1, duration_frame) = match key_name {
            Some(_) => (value1, 0.0),
            None => (0.0, value1 as f64 * get_config().frame_rate),
        };
        Self {
            key_name: key_name.map(str::to_string),
            target_name: morph_name.to_string(),
            min,
            max,
            target: ControlTarget::Morph {
                val0: value0,
                val1,
                morph: None,
            },
            duration_frame,
            rest_frame: duration_frame,
        }
    }

    /// 仅用于匹配查找的空控制
    pub fn skeleton(name: &str, is_bone: bool) -> Self {
        if is_bone {
            Self::bone(None, 0.0, 0.0, name, (Vec3::ZERO, Quat::IDENTITY), (Vec3::ZERO, Quat::IDENTITY))
        } else {
            Self::morph(Some(""), 0.0, 0.0, name, 0.0, 0.0)
        }
    }

    pub fn is_bone(&self) -> bool {
        matches!(self.target, ControlTarget::Bone { .. })
    }

    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn target(&self) -> &ControlTarget {
        &self.target
    }

    /// 是否已绑定到模型上的骨骼或 Morph
    pub fn is_bound(&self) -> bool {
        match &self.target {
            ControlTarget::Bone { bone, .. } => bone.is_some(),
            ControlTarget::Morph { morph, .. } => morph.is_some(),
        }
    }

    /// 绑定（或重新绑定）到模型
    ///
    /// 失败时控制变为无效，`update` 不再写入。
    pub fn set_model(&mut self, model: &MmdModel) -> Result<()> {
        let keyed = self.key_name.is_some();
        match &mut self.target {
            ControlTarget::Bone { bone, children, .. } => {
                *bone = model.find_bone(&self.target_name);
                let Some(index) = *bone else {
                    children.clear();
                    return Err(MmdError::BoneNotFound(self.target_name.clone()));
                };
                *children = model.child_bone_list(index);
            }
            ControlTarget::Morph { val1, morph, .. } => {
                *morph = model.resolve_morph(&self.target_name);
                let Some((index, _)) = *morph else {
                    return Err(MmdError::MorphNotFound(self.target_name.clone()));
                };
                if !keyed {
                    *val1 = model.morph_manager.morph_weight(index);
                }
            }
        }
        Ok(())
    }

    /// 同类目标且目标名相同
    pub fn matches(&self, other: &BoneFaceControl) -> bool {
        self.is_bone() == other.is_bone() && self.target_name == other.target_name
    }

    /// 写入本帧的骨骼姿态或 Morph 权重
    ///
    /// 返回控制是否仍在起作用：未绑定时为 false；有键名时总为 true；
    /// 没有键名时在过渡进行中为 true，过渡结束后为 false（仍会写入终值）。
    pub fn update(&mut self, key_value: &KeyValue, model: &mut MmdModel, elapsed_frame: f64) -> bool {
        if !self.is_bound() {
            return false;
        }

        let t = self
            .key_name
            .as_deref()
            .map(|key| self.progress(key_value.get_f32(key, 0.0)));
        let smearing = t.is_none() && self.rest_frame > 0.0 && self.duration_frame > 0.0;

        match &self.target {
            ControlTarget::Bone {
                pos0,
                pos1,
                rot0,
                rot1,
                bone: Some(index),
                children,
            } => {
                let (pos, rot) = match t {
                    Some(t) => (pos0.lerp(*pos1, t), rot0.slerp(*rot1, t)),
                    None => (*pos0, *rot0),
                };
                let bones = &mut model.bone_manager;
                if let Some(bone) = bones.get_bone_mut(*index) {
                    bone.set_current_position(pos);
                    bone.set_current_rotation(rot);
                }
                bones.update_bone(*index);
                for &child in children {
                    bones.update_bone(child);
                }
            }
            ControlTarget::Morph {
                val0,
                val1,
                morph: Some((index, _)),
            } => {
                let v = match t {
                    Some(t) => (1.0 - t) * val0 + t * val1,
                    None if smearing => {
                        let r = (self.rest_frame / self.duration_frame) as f32;
                        val1 * r + val0 * (1.0 - r)
                    }
                    None => *val0,
                };
                model.morph_manager.set_morph_weight(*index, v);
            }
            _ => return false,
        }

        if smearing {
            self.rest_frame = (self.rest_frame - elapsed_frame).max(0.0);
        }

        t.is_some() || smearing
    }

    /// 信号值在 `[min, max]` 中的位置
    fn progress(&self, value: f32) -> f32 {
        if value > self.max {
            1.0
        } else if value < self.min {
            0.0
        } else if self.max > self.min {
            (value - self.min) / (self.max - self.min)
        } else {
            1.0
        }
    }
}
