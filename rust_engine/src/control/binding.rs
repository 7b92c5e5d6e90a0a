//! 模型上的骨骼/表情控制绑定表

use crate::model::MmdModel;
use crate::{MmdError, Result};

use super::{BoneFaceControl, KeyValue};

/// 每个模型可同时绑定的控制数量
pub const MAX_BIND: usize = 100;

/// 骨骼/表情控制绑定表
///
/// 按绑定顺序每帧更新；同一目标只保留一个控制。
#[derive(Debug, Default)]
pub struct BoneFaceControlSet {
    controls: Vec<BoneFaceControl>,
}

impl BoneFaceControlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定控制并立即写入一次；同一目标的旧控制被替换
    pub fn set(&mut self, mut control: BoneFaceControl, key_value: &KeyValue, model: &mut MmdModel) -> Result<()> {
        let existing = self.controls.iter().position(|c| c.matches(&control));
        if existing.is_none() && self.controls.len() >= MAX_BIND {
            return Err(MmdError::BindingFull(MAX_BIND));
        }

        control.set_model(model)?;
        control.update(key_value, model, 0.0);

        match existing {
            Some(index) => self.controls[index] = control,
            None => self.controls.push(control),
        }
        Ok(())
    }

    /// 解除与 `template` 同目标的控制
    pub fn unset(&mut self, template: &BoneFaceControl) -> bool {
        match self.controls.iter().position(|c| c.matches(template)) {
            Some(index) => {
                self.controls.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn find(&self, template: &BoneFaceControl) -> bool {
        self.controls.iter().any(|c| c.matches(template))
    }

    /// 模型替换后重新绑定全部控制，返回绑定失败的数量
    ///
    /// 失败的控制保留在表中但不再生效。
    pub fn rebind(&mut self, key_value: &KeyValue, model: &mut MmdModel) -> usize {
        let mut failed = 0;
        for control in &mut self.controls {
            match control.set_model(model) {
                Ok(()) => {
                    control.update(key_value, model, 0.0);
                }
                Err(e) => {
                    log::warn!("BoneFaceControl: 重新绑定失败: {}", e);
                    failed += 1;
                }
            }
        }
        failed
    }

    /// 每帧更新
    pub fn update(&mut self, key_value: &KeyValue, model: &mut MmdModel, elapsed_frame: f64) {
        for control in &mut self.controls {
            control.update(key_value, model, elapsed_frame);
        }
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn clear(&mut self) {
        self.controls.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoneFaceControl> {
        self.controls.iter()
    }
}
