//! 表情 Morph 聚合
//!
//! 把一个抽象的表情（如口型「あ」、AU12）映射到模型上的若干 Morph。
//! 每帧先 `reset_weight`，各输入源 `add_weight` 累加驱动值，最后 `apply` 一次写入模型。

use once_cell::sync::Lazy;

use crate::model::MmdModel;
use crate::morph::{MorphManager, MorphType};
use crate::{MmdError, Result};

/// 每种 Morph 类型最多绑定的数量
pub const MAX_MORPH_ASSIGN: usize = 10;

const SIGMOID_BINS: usize = 200;
const SIGMOID_COEF: f32 = 30.0;
const SIGMOID_EPSILON: f32 = 1e-5;

/// `1 / (1 + e^(-30x))`，x ∈ [-0.5, 0.5)
static SIGMOID_TABLE: Lazy<[f32; SIGMOID_BINS]> = Lazy::new(|| {
    let mut table = [0.0f32; SIGMOID_BINS];
    for (i, value) in table.iter_mut().enumerate() {
        let x = i as f32 / SIGMOID_BINS as f32 - 0.5;
        let f = 1.0 / (1.0 + (-x * SIGMOID_COEF).exp());
        *value = if f <= SIGMOID_EPSILON {
            0.0
        } else if f >= 1.0 - SIGMOID_EPSILON {
            1.0
        } else {
            f
        };
    }
    table
});

/// 驱动值到 Morph 权重的响应曲线
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WeightCurve {
    /// `clamp(v * rate, 0, 1)`
    Linear(f32),
    /// 以阈值为中心的 S 形曲线
    Sigmoid(f32),
}

impl WeightCurve {
    /// `threshold` 为 true 时 `rate` 作为 S 形曲线的阈值
    pub fn new(rate: f32, threshold: bool) -> Self {
        if threshold {
            WeightCurve::Sigmoid(rate)
        } else {
            WeightCurve::Linear(rate)
        }
    }

    pub fn compute(self, value: f32) -> f32 {
        match self {
            WeightCurve::Linear(rate) => (value * rate).clamp(0.0, 1.0),
            WeightCurve::Sigmoid(threshold) => {
                let x = value - threshold + 0.5;
                if x < 0.0 {
                    0.0
                } else if x > 1.0 {
                    1.0
                } else {
                    let index = ((x * SIGMOID_BINS as f32) as usize).min(SIGMOID_BINS - 1);
                    SIGMOID_TABLE[index]
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct MorphBinding {
    index: usize,
    curve: WeightCurve,
}

/// 表情 Morph 聚合
#[derive(Clone, Debug, Default)]
pub struct FaceInterface {
    /// 按 [`MorphType::SEARCH_ORDER`] 排列的各类型绑定
    bindings: [Vec<MorphBinding>; 6],
    weight: f32,
    valid: bool,
}

impl FaceInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空后绑定一个 Morph
    pub fn set(&mut self, model: &MmdModel, name: &str, rate: f32, threshold: bool) -> Result<()> {
        *self = Self::default();
        let result = self.add(model, name, rate, threshold);
        self.valid = result.is_ok();
        result
    }

    /// 追加绑定一个 Morph
    ///
    /// 按类型顺序查找，绑定到第一个存在该名称且未满的类型；失败时不改变已有绑定。
    pub fn add(&mut self, model: &MmdModel, name: &str, rate: f32, threshold: bool) -> Result<()> {
        if rate < 0.0 {
            return Err(MmdError::InvalidRate(rate));
        }
        let curve = WeightCurve::new(rate, threshold);

        let mut full = false;
        for (slot, &kind) in MorphType::SEARCH_ORDER.iter().enumerate() {
            let Some(index) = model.find_morph(name, kind) else {
                continue;
            };
            if self.bindings[slot].len() < MAX_MORPH_ASSIGN {
                self.bindings[slot].push(MorphBinding { index, curve });
                self.valid = true;
                return Ok(());
            }
            full = true;
        }

        if full {
            Err(MmdError::MorphCapacity {
                name: name.to_string(),
                max: MAX_MORPH_ASSIGN,
            })
        } else {
            Err(MmdError::MorphNotFound(name.to_string()))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// 指定类型的绑定数量
    pub fn binding_count(&self, kind: MorphType) -> usize {
        self.bindings[slot_of(kind)].len()
    }

    /// 帧开始：清零累加值，并清除绑定骨骼 Morph 在骨骼上的叠加量
    pub fn reset_weight(&mut self, model: &mut MmdModel) {
        if !self.valid {
            return;
        }
        self.weight = 0.0;

        let MmdModel {
            bone_manager,
            morph_manager,
            ..
        } = model;
        for binding in &self.bindings[slot_of(MorphType::Bone)] {
            morph_manager.reset_bone_morph(binding.index, bone_manager);
        }
        for binding in &self.bindings[slot_of(MorphType::Group)] {
            if !morph_manager.group_has_bone_morph(binding.index) {
                continue;
            }
            for (element, _) in bone_elements(morph_manager, binding.index) {
                morph_manager.reset_bone_morph(element, bone_manager);
            }
        }
    }

    pub fn add_weight(&mut self, value: f32) {
        self.weight += value;
    }

    /// 当前累加值
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// 把累加值经曲线换算后写入所有绑定的 Morph
    pub fn apply(&self, model: &mut MmdModel) {
        let MmdModel {
            bone_manager,
            morph_manager,
            ..
        } = model;

        for (slot, &kind) in MorphType::SEARCH_ORDER.iter().enumerate() {
            for binding in &self.bindings[slot] {
                let w = binding.curve.compute(self.weight);
                morph_manager.set_morph_weight(binding.index, w);
                match kind {
                    MorphType::Bone => morph_manager.apply_bone_morph(binding.index, w, bone_manager),
                    // 组内骨骼 Morph 按 组权重 * 成员比率 作用，成员自身权重不变
                    MorphType::Group => {
                        for (element, rate) in bone_elements(morph_manager, binding.index) {
                            morph_manager.apply_bone_morph(element, w * rate, bone_manager);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// 第一个非空类型中第一个绑定的当前权重
    pub fn assigned_weight(&self, model: &MmdModel) -> f32 {
        self.bindings
            .iter()
            .find_map(|list| list.first())
            .map(|binding| model.morph_manager.morph_weight(binding.index))
            .unwrap_or(0.0)
    }

    /// 覆盖每种类型第一个绑定的权重
    pub fn force_assigned_weight(&self, model: &mut MmdModel, value: f32) {
        for binding in self.bindings.iter().filter_map(|list| list.first()) {
            model.morph_manager.set_morph_weight(binding.index, value);
        }
    }
}

fn slot_of(kind: MorphType) -> usize {
    MorphType::SEARCH_ORDER
        .iter()
        .position(|&k| k == kind)
        .unwrap_or(0)
}

/// 组 Morph 中属于骨骼 Morph 的成员 (索引, 比率)
fn bone_elements(morphs: &MorphManager, group: usize) -> Vec<(usize, f32)> {
    let Some(morph) = morphs.get_morph(group) else {
        return Vec::new();
    };
    morph
        .group_indices
        .iter()
        .map(|&(index, rate)| (index as usize, rate))
        .filter(|&(index, _)| {
            morphs
                .get_morph(index)
                .is_some_and(|m| m.morph_type == MorphType::Bone)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::morph::Morph;
    use crate::skeleton::Bone;
    use glam::{Quat, Vec3};

    /// 骨骼「眉」，顶点 Morph「あ」「い」，骨骼 Morph「眉上」，组 Morph「笑顔」，旧式表情「まばたき」
    pub(crate) fn face_model() -> MmdModel {
        let mut model = MmdModel::new("face");
        model
            .bone_manager
            .add_bone(Bone::with_parent("頭", -1, Vec3::new(0.0, 16.0, 0.0)));
        model
            .bone_manager
            .add_bone(Bone::with_parent("眉", 0, Vec3::new(0.0, 17.0, 0.0)));
        model.bone_manager.build_hierarchy();

        let morphs = &mut model.morph_manager;
        morphs.add_morph(Morph::new("あ".to_string(), MorphType::Vertex));
        morphs.add_morph(Morph::new("い".to_string(), MorphType::Vertex));
        let brow = morphs.add_morph(
            Morph::new("眉上".to_string(), MorphType::Bone).with_bone_offset(
                1,
                Vec3::new(0.0, 1.0, 0.0),
                Quat::IDENTITY,
            ),
        );
        morphs.add_morph(
            Morph::new("笑顔".to_string(), MorphType::Group)
                .with_group_element(brow as u32, 0.5)
                .with_group_element(0, 1.0),
        );
        morphs.add_morph(Morph::new("まばたき".to_string(), MorphType::Face));
        model
    }

    fn weight_of(model: &MmdModel, name: &str) -> f32 {
        let (index, _) = model.resolve_morph(name).unwrap();
        model.morph_manager.morph_weight(index)
    }

    #[test]
    fn test_linear_curve_clamps() {
        let curve = WeightCurve::Linear(2.0);
        assert_eq!(curve.compute(-1.0), 0.0);
        assert!((curve.compute(0.25) - 0.5).abs() < 1e-6);
        assert_eq!(curve.compute(3.0), 1.0);
    }

    #[test]
    fn test_sigmoid_curve_is_centered_on_threshold() {
        let curve = WeightCurve::Sigmoid(0.3);
        assert!((curve.compute(0.3) - 0.5).abs() < 1e-6);
        assert_eq!(curve.compute(-0.5), 0.0);
        assert_eq!(curve.compute(2.0), 1.0);
        // 区间上端落在最后一格
        assert_eq!(curve.compute(0.8), 1.0);
        assert!(curve.compute(0.25) < 0.5 && curve.compute(0.35) > 0.5);
    }

    #[test]
    fn test_set_and_apply_accumulated_weight() {
        let mut model = face_model();
        let mut face = FaceInterface::new();
        face.set(&model, "あ", 1.0, false).unwrap();
        assert!(face.is_valid());
        assert_eq!(face.binding_count(MorphType::Vertex), 1);

        face.reset_weight(&mut model);
        face.add_weight(0.3);
        face.add_weight(0.3);
        face.apply(&mut model);
        assert!((weight_of(&model, "あ") - 0.6).abs() < 1e-6);

        face.add_weight(1.0);
        face.apply(&mut model);
        assert_eq!(weight_of(&model, "あ"), 1.0);
    }

    #[test]
    fn test_set_failure_invalidates() {
        let model = face_model();
        let mut face = FaceInterface::new();
        face.set(&model, "あ", 1.0, false).unwrap();

        assert!(matches!(face.set(&model, "存在しない", 1.0, false), Err(MmdError::MorphNotFound(_))));
        assert!(!face.is_valid());
        assert_eq!(face.binding_count(MorphType::Vertex), 0);

        assert!(matches!(face.set(&model, "あ", -0.5, false), Err(MmdError::InvalidRate(_))));
        assert!(!face.is_valid());
    }

    #[test]
    fn test_capacity_per_kind() {
        let model = face_model();
        let mut face = FaceInterface::new();
        face.set(&model, "あ", 1.0, false).unwrap();
        for _ in 1..MAX_MORPH_ASSIGN {
            face.add(&model, "あ", 1.0, false).unwrap();
        }

        let result = face.add(&model, "あ", 1.0, false);
        assert!(matches!(result, Err(MmdError::MorphCapacity { max: MAX_MORPH_ASSIGN, .. })));
        assert_eq!(face.binding_count(MorphType::Vertex), MAX_MORPH_ASSIGN);

        // 其他类型不受影响
        face.add(&model, "まばたき", 1.0, false).unwrap();
        assert_eq!(face.binding_count(MorphType::Face), 1);
        assert!(face.is_valid());
    }

    #[test]
    fn test_bone_morph_applies_to_bone_and_resets() {
        let mut model = face_model();
        let mut face = FaceInterface::new();
        face.set(&model, "眉上", 1.0, false).unwrap();

        face.reset_weight(&mut model);
        face.add_weight(0.5);
        face.apply(&mut model);
        let brow = model.bone_manager.get_bone(1).unwrap();
        assert!((brow.morph_translate - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-6);

        face.reset_weight(&mut model);
        assert_eq!(face.weight(), 0.0);
        assert_eq!(model.bone_manager.get_bone(1).unwrap().morph_translate, Vec3::ZERO);
    }

    #[test]
    fn test_group_morph_drives_bone_elements() {
        let mut model = face_model();
        let mut face = FaceInterface::new();
        face.set(&model, "笑顔", 1.0, false).unwrap();
        assert_eq!(face.binding_count(MorphType::Group), 1);

        face.reset_weight(&mut model);
        face.add_weight(1.0);
        face.apply(&mut model);

        assert_eq!(weight_of(&model, "笑顔"), 1.0);
        let brow = model.bone_manager.get_bone(1).unwrap();
        assert!((brow.morph_translate - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-6);
        // 成员骨骼 Morph 自身的权重保持不变
        assert_eq!(weight_of(&model, "眉上"), 0.0);

        face.reset_weight(&mut model);
        assert_eq!(model.bone_manager.get_bone(1).unwrap().morph_translate, Vec3::ZERO);
    }

    #[test]
    fn test_assigned_weight() {
        let mut model = face_model();
        let mut face = FaceInterface::new();
        assert_eq!(face.assigned_weight(&model), 0.0);

        face.set(&model, "い", 1.0, false).unwrap();
        face.add(&model, "まばたき", 1.0, false).unwrap();
        model.morph_manager.set_morph_weight(1, 0.7);
        assert!((face.assigned_weight(&model) - 0.7).abs() < 1e-6);

        face.force_assigned_weight(&mut model, 0.2);
        assert!((weight_of(&model, "い") - 0.2).abs() < 1e-6);
        assert!((weight_of(&model, "まばたき") - 0.2).abs() < 1e-6);
    }
}
