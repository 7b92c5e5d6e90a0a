//! 形状映射表
//!
//! 从映射文件读取口型、头部追踪骨骼、AU/ARKit 表情、动作文件等到模型部件的对应关系。
//!
//! 文件格式：每行以空白分隔，第一个词为条目名，按前缀区分类别：
//! ```text
//! # 注释
//! EYE_ROTATION_COEF 0.5
//! LIP_A あ
//! NOLIP まばたき,ウィンク
//! TRACK_HEAD 頭,首
//! AU12 笑い >0.3
//! ACT_GREET greet.vmd
//! EXBONE_TAIL 尻尾1,尻尾
//! EXMORPH_BLUSH 照れ 0.8
//! MORPH_TUNE あ い う
//! eyeBlinkLeft まばたき 1.0
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::get_config;
use crate::content::{read_content_text, ContentKey};
use crate::control::parse_leading_f32;
use crate::model::MmdModel;
use crate::Result;

use super::FaceInterface;

/// MORPH_TUNE 组的最大数量
pub const MORPH_TUNE_MAX_SETS: usize = 30;
/// 每个 MORPH_TUNE 组内的最大 Morph 数量
pub const MORPH_TUNE_MAX_LEN: usize = 10;

/// 形状映射表
#[derive(Debug, Clone)]
pub struct ShapeMap {
    eye_rotation_coef: f32,
    lip_morph: HashMap<String, FaceInterface>,
    ignore_lip_morph: HashMap<String, FaceInterface>,
    lip_ignore_list: Option<String>,
    track_bone: HashMap<String, usize>,
    au_morph: HashMap<String, FaceInterface>,
    arkit_morph: HashMap<String, FaceInterface>,
    action_motion: HashMap<String, PathBuf>,
    ex_bone: HashMap<String, usize>,
    ex_morph: HashMap<String, FaceInterface>,
    morph_tune: Vec<Vec<FaceInterface>>,
}

impl ShapeMap {
    pub fn new() -> Self {
        Self {
            eye_rotation_coef: 1.0,
            lip_morph: HashMap::new(),
            ignore_lip_morph: HashMap::new(),
            lip_ignore_list: None,
            track_bone: HashMap::new(),
            au_morph: HashMap::new(),
            arkit_morph: HashMap::new(),
            action_motion: HashMap::new(),
            ex_bone: HashMap::new(),
            ex_morph: HashMap::new(),
            morph_tune: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// 读取映射文件并替换全部内容
    ///
    /// `dir` 为 ACT 条目中动作文件的基准目录。无法绑定到模型的条目被跳过。
    pub fn load<P: AsRef<Path>>(
        &mut self,
        path: P,
        model: &MmdModel,
        dir: &Path,
        key: Option<&ContentKey>,
    ) -> Result<()> {
        let text = read_content_text(path.as_ref(), key)?;
        self.load_str(&text, model, dir);
        log::info!(
            "ShapeMap: {} (lip {}, au {}, arkit {}, action {}, tune {})",
            path.as_ref().display(),
            self.lip_morph.len(),
            self.au_morph.len(),
            self.arkit_morph.len(),
            self.action_motion.len(),
            self.morph_tune.len()
        );
        Ok(())
    }

    /// 从文本读取并替换全部内容
    pub fn load_str(&mut self, text: &str, model: &MmdModel, dir: &Path) {
        self.clear();
        let debug = get_config().debug_log;

        for (line_no, line) in text.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            let Some(entry) = tokens.next() else {
                continue;
            };
            if entry.starts_with('#') {
                continue;
            }
            let Some(value) = tokens.next() else {
                log::warn!("ShapeMap: 第 {} 行缺少参数: {}", line_no + 1, entry);
                continue;
            };
            if debug {
                log::debug!("ShapeMap: {} -> {}", entry, value);
            }

            if entry.starts_with("EYE_ROTATION_COEF") {
                self.eye_rotation_coef = parse_leading_f32(value);
            } else if entry.starts_with("LIP_") {
                if !self.lip_morph.contains_key(entry) {
                    bind_new(&mut self.lip_morph, entry, model, value, 1.0, false);
                }
            } else if entry.starts_with("NOLIP") {
                self.lip_ignore_list = Some(value.to_string());
                for name in value.split(',').filter(|n| !n.is_empty()) {
                    if !self.ignore_lip_morph.contains_key(name) {
                        bind_new(&mut self.ignore_lip_morph, name, model, name, 1.0, false);
                    }
                }
            } else if entry.starts_with("TRACK_") {
                bind_bone(&mut self.track_bone, entry, model, value);
            } else if entry.starts_with("AU") {
                let (rate, threshold) = parse_curve(tokens.next());
                bind_shared(&mut self.au_morph, entry, model, value, rate, threshold);
            } else if entry.starts_with("ACT") {
                self.action_motion
                    .entry(entry.to_string())
                    .or_insert_with(|| dir.join(value));
            } else if entry.starts_with("EXBONE_") {
                bind_bone(&mut self.ex_bone, entry, model, value);
            } else if entry.starts_with("EXMORPH_") {
                let (rate, threshold) = parse_curve(tokens.next());
                bind_shared(&mut self.ex_morph, entry, model, value, rate, threshold);
            } else if entry.starts_with("MORPH_TUNE") {
                if self.morph_tune.len() >= MORPH_TUNE_MAX_SETS {
                    log::warn!("ShapeMap: MORPH_TUNE 超过 {} 组", MORPH_TUNE_MAX_SETS);
                    continue;
                }
                let mut set = Vec::new();
                for name in std::iter::once(value).chain(tokens) {
                    if set.len() >= MORPH_TUNE_MAX_LEN {
                        break;
                    }
                    let mut face = FaceInterface::new();
                    match face.set(model, name, 1.0, false) {
                        Ok(()) => set.push(face),
                        Err(e) => log::warn!("ShapeMap: MORPH_TUNE: {}", e),
                    }
                }
                self.morph_tune.push(set);
            } else {
                let (rate, threshold) = parse_curve(tokens.next());
                bind_shared(&mut self.arkit_morph, entry, model, value, rate, threshold);
            }
        }
    }

    pub fn eye_rotation_coef(&self) -> f32 {
        self.eye_rotation_coef
    }

    pub fn lip_morph(&self, name: &str) -> Option<&FaceInterface> {
        self.lip_morph.get(name)
    }

    pub fn lip_morph_mut(&mut self, name: &str) -> Option<&mut FaceInterface> {
        self.lip_morph.get_mut(name)
    }

    /// 口型同步时不受影响的 Morph
    pub fn ignore_lip_morph(&self, name: &str) -> Option<&FaceInterface> {
        self.ignore_lip_morph.get(name)
    }

    pub fn ignore_lip_morph_mut(&mut self, name: &str) -> Option<&mut FaceInterface> {
        self.ignore_lip_morph.get_mut(name)
    }

    /// 所有口型忽略 Morph
    pub fn ignore_lip_morphs(&self) -> impl Iterator<Item = (&str, &FaceInterface)> {
        self.ignore_lip_morph.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// NOLIP 行的原始内容
    pub fn lip_ignore_list(&self) -> Option<&str> {
        self.lip_ignore_list.as_deref()
    }

    pub fn track_bone(&self, name: &str) -> Option<usize> {
        self.track_bone.get(name).copied()
    }

    pub fn au_morph(&self, name: &str) -> Option<&FaceInterface> {
        self.au_morph.get(name)
    }

    pub fn au_morph_mut(&mut self, name: &str) -> Option<&mut FaceInterface> {
        self.au_morph.get_mut(name)
    }

    pub fn arkit_morph(&self, name: &str) -> Option<&FaceInterface> {
        self.arkit_morph.get(name)
    }

    pub fn arkit_morph_mut(&mut self, name: &str) -> Option<&mut FaceInterface> {
        self.arkit_morph.get_mut(name)
    }

    pub fn action_motion_file_name(&self, name: &str) -> Option<&Path> {
        self.action_motion.get(name).map(PathBuf::as_path)
    }

    pub fn ex_bone(&self, name: &str) -> Option<usize> {
        self.ex_bone.get(name).copied()
    }

    pub fn ex_morph(&self, name: &str) -> Option<&FaceInterface> {
        self.ex_morph.get(name)
    }

    pub fn ex_morph_mut(&mut self, name: &str) -> Option<&mut FaceInterface> {
        self.ex_morph.get_mut(name)
    }

    pub fn morph_tune_count(&self) -> usize {
        self.morph_tune.len()
    }

    /// 按组内顺序分配权重：前面的 Morph 占用的比例从后面的 Morph 中扣除
    pub fn do_morph_tune(&self, model: &mut MmdModel) {
        for set in &self.morph_tune {
            let mut rate_left = 1.0f32;
            for face in set {
                let r = face.assigned_weight(model);
                face.force_assigned_weight(model, r * rate_left);
                rate_left = (rate_left * (1.0 - r)).max(0.0);
            }
        }
    }
}

impl Default for ShapeMap {
    fn default() -> Self {
        Self::new()
    }
}

/// 第三个参数：`rate` 或 `>threshold`，省略时为线性 1.0
fn parse_curve(token: Option<&str>) -> (f32, bool) {
    match token {
        None => (1.0, false),
        Some(t) => match t.strip_prefix('>') {
            Some(threshold) => (parse_leading_f32(threshold), true),
            None => (parse_leading_f32(t), false),
        },
    }
}

/// 新建条目，已存在时由调用方决定是否跳过
fn bind_new(
    table: &mut HashMap<String, FaceInterface>,
    entry: &str,
    model: &MmdModel,
    morph: &str,
    rate: f32,
    threshold: bool,
) {
    let mut face = FaceInterface::new();
    match face.set(model, morph, rate, threshold) {
        Ok(()) => {
            table.insert(entry.to_string(), face);
        }
        Err(e) => log::warn!("ShapeMap: {}: {}", entry, e),
    }
}

/// 同名条目重复出现时追加到同一个表情上
fn bind_shared(
    table: &mut HashMap<String, FaceInterface>,
    entry: &str,
    model: &MmdModel,
    morph: &str,
    rate: f32,
    threshold: bool,
) {
    match table.get_mut(entry) {
        Some(face) => {
            if let Err(e) = face.add(model, morph, rate, threshold) {
                log::warn!("ShapeMap: {}: {}", entry, e);
            }
        }
        None => bind_new(table, entry, model, morph, rate, threshold),
    }
}

/// 逗号分隔的候选骨骼中第一个存在的；先定义的条目优先
fn bind_bone(table: &mut HashMap<String, usize>, entry: &str, model: &MmdModel, candidates: &str) {
    if table.contains_key(entry) {
        return;
    }
    match candidates.split(',').find_map(|name| model.find_bone(name)) {
        Some(index) => {
            table.insert(entry.to_string(), index);
        }
        None => log::warn!("ShapeMap: {}: 骨骼不存在: {}", entry, candidates),
    }
}
