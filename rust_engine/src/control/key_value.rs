//! KeyValue 信号存储
//!
//! 字符串键到字符串值的有序映射。语音事件、传感器等生产者写入，
//! 骨骼/表情控制每帧读取并在读取时解析为数值。

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::Path;

use crate::config::get_config;
use crate::content::{read_content_text, ContentKey};
use crate::{MmdError, Result};

/// 值中嵌入环境变量的写法：`%ENV{NAME}`
const ENV_PREFIX: &str = "%ENV{";

/// KeyValue 信号存储
#[derive(Debug, Clone)]
pub struct KeyValue {
    entries: BTreeMap<String, String>,
    max_entries: usize,
}

impl KeyValue {
    /// 使用全局配置中的键数量上限创建
    pub fn new() -> Self {
        Self::with_max_entries(get_config().keyvalue_max_entries)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_entries,
        }
    }

    /// 设置值，已存在的键直接覆盖
    ///
    /// 新键超出上限时返回 [`MmdError::KeyValueFull`]。
    pub fn set_string(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if let Some(slot) = self.entries.get_mut(key) {
            *slot = value.into();
            return Ok(());
        }
        if self.entries.len() >= self.max_entries {
            return Err(MmdError::KeyValueFull(self.max_entries));
        }
        self.entries.insert(key.to_string(), value.into());
        Ok(())
    }

    /// 获取值，不存在时返回默认值
    ///
    /// 值中的 `%ENV{NAME}` 被替换为对应环境变量（未设置时为空）；
    /// 写法不完整时原样返回。
    pub fn get_string<'a>(&'a self, key: &str, default: &'a str) -> Cow<'a, str> {
        let value = self.entries.get(key).map(String::as_str).unwrap_or(default);
        match expand_env(value) {
            Some(expanded) => Cow::Owned(expanded),
            None => Cow::Borrowed(value),
        }
    }

    /// 以浮点数读取，无法解析的部分按 0 处理
    pub fn get_f32(&self, key: &str, default: f32) -> f32 {
        if !self.exists(key) {
            return default;
        }
        parse_leading_f32(&self.get_string(key, ""))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 解析 `key=value` 文本，逐行写入
    ///
    /// 以 `#` 开头的行、空行、没有 `=` 的行被忽略。返回是否至少写入了一项。
    pub fn load_buf(&mut self, buf: &str) -> bool {
        let mut loaded = false;
        for line in buf.lines() {
            loaded |= self.load_line(line);
        }
        loaded
    }

    fn load_line(&mut self, line: &str) -> bool {
        let line = line.trim_end_matches(['\n', '\r', '\t', ' ']);
        if line.starts_with('#') {
            return false;
        }
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        match self.set_string(key, value) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("KeyValue: {}", e);
                false
            }
        }
    }

    /// 从 `key=value` 文件加载，给出密钥时先解密
    pub fn load<P: AsRef<Path>>(&mut self, path: P, key: Option<&ContentKey>) -> Result<()> {
        let text = read_content_text(path.as_ref(), key)?;
        let count = text.lines().filter(|line| self.load_line(line)).count();
        log::debug!("KeyValue: {} 项 <- {}", count, path.as_ref().display());
        Ok(())
    }

    /// 以 `key=value` 格式保存（保存原始值，不展开环境变量）
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// 从两行一组（`key\nvalue\n`）格式的文件加载
    ///
    /// 键后的空行是该键的空值，等待键时的空行被跳过。
    /// `append` 为 true 时不覆盖已存在的键。条目已满时记录警告并继续。
    pub fn load_text<P: AsRef<Path>>(&mut self, path: P, key: Option<&ContentKey>, append: bool) -> Result<()> {
        let text = read_content_text(path.as_ref(), key)?;
        let mut pending: Option<&str> = None;
        for line in text.lines() {
            let line = line.trim_end_matches(['\n', '\r']);
            match pending.take() {
                None => {
                    if !line.is_empty() {
                        pending = Some(line);
                    }
                }
                Some(name) => {
                    if append && self.exists(name) {
                        continue;
                    }
                    if let Err(e) = self.set_string(name, line) {
                        log::warn!("KeyValue: {}", e);
                    }
                }
            }
        }
        Ok(())
    }

    /// 以两行一组格式保存
    pub fn save_text<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('\n');
            out.push_str(value);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// 字典序的第一个键
    pub fn first_key(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }

    /// `cursor` 之后的下一个键
    pub fn next_key(&self, cursor: &str) -> Option<&str> {
        self.entries
            .range::<str, _>((Bound::Excluded(cursor), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.as_str())
    }

    /// 按字典序遍历所有键
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for KeyValue {
    fn default() -> Self {
        Self::new()
    }
}

/// 展开 `%ENV{NAME}`；没有嵌入或写法不完整时返回 None
fn expand_env(value: &str) -> Option<String> {
    if !value.contains(ENV_PREFIX) {
        return None;
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find(ENV_PREFIX) {
        out.push_str(&rest[..start]);
        let after = &rest[start + ENV_PREFIX.len()..];
        let end = after.find('}')?;
        out.push_str(&std::env::var(&after[..end]).unwrap_or_default());
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// 取最长的可解析前缀（"1.5abc" -> 1.5），完全无法解析时为 0
pub(crate) fn parse_leading_f32(s: &str) -> f32 {
    let s = s.trim();
    (1..=s.len())
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .find_map(|end| s[..end].parse::<f32>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_buf_and_get_string() {
        let mut kv = KeyValue::new();
        assert!(kv.load_buf("a=1\nb=2\n"));
        assert_eq!(kv.get_string("a", "x"), "1");
        assert_eq!(kv.get_string("b", "x"), "2");
        assert_eq!(kv.get_string("c", "x"), "x");
    }

    #[test]
    fn test_load_buf_rejects_comments_and_bare_lines() {
        let mut kv = KeyValue::new();
        assert!(!kv.load_buf("# a=1"));
        assert!(!kv.load_buf("novalue"));
        assert!(!kv.load_buf(""));
        assert!(kv.is_empty());

        // 只在第一个 = 处切分，行尾空白被去除
        assert!(kv.load_buf("url=http://host/?q=1 \t\r\n"));
        assert_eq!(kv.get_string("url", ""), "http://host/?q=1");
    }

    #[test]
    fn test_set_string_overwrites() {
        let mut kv = KeyValue::new();
        kv.set_string("LipSync", "0").unwrap();
        kv.set_string("LipSync", "1").unwrap();
        assert_eq!(kv.len(), 1);
        assert_eq!(kv.get_string("LipSync", ""), "1");
        assert!(kv.exists("LipSync"));
        assert!(!kv.exists("lipsync"));
    }

    #[test]
    fn test_capacity_only_limits_new_keys() {
        let mut kv = KeyValue::with_max_entries(2);
        kv.set_string("a", "1").unwrap();
        kv.set_string("b", "2").unwrap();
        assert!(matches!(kv.set_string("c", "3"), Err(MmdError::KeyValueFull(2))));
        kv.set_string("a", "9").unwrap();
        assert_eq!(kv.get_string("a", ""), "9");
    }

    #[test]
    fn test_get_f32_parses_leading_number() {
        let mut kv = KeyValue::new();
        kv.load_buf("v=0.25\nw=1.5abc\nz=abc\n");
        assert!((kv.get_f32("v", -1.0) - 0.25).abs() < 1e-6);
        assert!((kv.get_f32("w", -1.0) - 1.5).abs() < 1e-6);
        assert_eq!(kv.get_f32("z", -1.0), 0.0);
        assert_eq!(kv.get_f32("missing", -1.0), -1.0);
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("MMDAGENT_KV_TEST_DIR", "/opt/agent");
        let mut kv = KeyValue::new();
        kv.set_string("path", "%ENV{MMDAGENT_KV_TEST_DIR}/voice").unwrap();
        kv.set_string("unset", "[%ENV{MMDAGENT_KV_TEST_UNSET_VAR}]").unwrap();
        kv.set_string("broken", "%ENV{NO_CLOSE").unwrap();

        assert_eq!(kv.get_string("path", ""), "/opt/agent/voice");
        assert_eq!(kv.get_string("unset", ""), "[]");
        assert_eq!(kv.get_string("broken", ""), "%ENV{NO_CLOSE");
    }

    #[test]
    fn test_traversal_is_ordered_by_key() {
        let mut kv = KeyValue::new();
        for key in ["gamma", "alpha", "beta"] {
            kv.set_string(key, key).unwrap();
        }

        let mut visited = Vec::new();
        let mut cursor = kv.first_key();
        while let Some(key) = cursor {
            visited.push(key.to_string());
            cursor = kv.next_key(key);
        }
        assert_eq!(visited, ["alpha", "beta", "gamma"]);
        assert_eq!(kv.keys().collect::<Vec<_>>(), ["alpha", "beta", "gamma"]);
        assert_eq!(KeyValue::new().first_key(), None);
    }

    #[test]
    fn test_save_and_load_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut kv = KeyValue::new();
        kv.load_buf("b=2\na=1\n");

        let path = dir.path().join("kv.txt");
        kv.save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a=1\nb=2\n");

        let mut loaded = KeyValue::new();
        loaded.load(&path, None).unwrap();
        assert_eq!(loaded.get_string("b", ""), "2");

        let text_path = dir.path().join("kv_text.txt");
        kv.save_text(&text_path).unwrap();
        assert_eq!(fs::read_to_string(&text_path).unwrap(), "a\n1\nb\n2\n");

        assert!(matches!(loaded.load(dir.path().join("missing.txt"), None), Err(MmdError::Io(_))));
    }

    #[test]
    fn test_load_text_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");
        fs::write(&path, "\na\nnew\r\nb\n2\n").unwrap();

        let mut kv = KeyValue::new();
        kv.set_string("a", "old").unwrap();
        kv.load_text(&path, None, true).unwrap();
        assert_eq!(kv.get_string("a", ""), "old");
        assert_eq!(kv.get_string("b", ""), "2");

        kv.load_text(&path, None, false).unwrap();
        assert_eq!(kv.get_string("a", ""), "new");
    }

    #[test]
    fn test_save_text_keeps_empty_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");
        let mut kv = KeyValue::new();
        kv.set_string("empty", "").unwrap();
        kv.set_string("x", "1").unwrap();
        kv.save_text(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "empty\n\nx\n1\n");

        let mut back = KeyValue::new();
        back.load_text(&path, None, false).unwrap();
        assert!(back.exists("empty"));
        assert_eq!(back.get_string("empty", "?"), "");
        assert_eq!(back.get_string("x", ""), "1");
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn test_load_text_continues_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");
        fs::write(&path, "a\n1\nb\n2\na\n3\n").unwrap();

        let mut kv = KeyValue::with_max_entries(1);
        kv.load_text(&path, None, false).unwrap();
        assert_eq!(kv.len(), 1);
        assert!(!kv.exists("b"));
        // 已存在的键仍可更新
        assert_eq!(kv.get_string("a", ""), "3");
    }

    #[test]
    fn test_load_encrypted_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = ContentKey::new([3u8; 16], [5u8; 16]);
        let path = dir.path().join("secret.txt");
        fs::write(&path, key.encrypt(b"greeting=hello\n")).unwrap();

        let mut kv = KeyValue::new();
        kv.load(&path, Some(&key)).unwrap();
        assert_eq!(kv.get_string("greeting", ""), "hello");
    }
}
