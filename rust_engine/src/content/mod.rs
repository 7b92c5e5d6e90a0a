//! 内容文件读取（明文或 AES-128-CBC 加密）

mod key;

pub use key::ContentKey;

use std::fs;
use std::path::Path;

use crate::Result;

/// 读取整个文件，给出密钥时先解密
pub fn read_content<P: AsRef<Path>>(path: P, key: Option<&ContentKey>) -> Result<Vec<u8>> {
    let data = fs::read(path.as_ref())?;
    match key {
        Some(key) if !data.is_empty() => key.decrypt(&data),
        _ => Ok(data),
    }
}

/// 读取文本文件（UTF-8，去除 BOM）
pub fn read_content_text<P: AsRef<Path>>(path: P, key: Option<&ContentKey>) -> Result<String> {
    let bytes = read_content(path, key)?;
    let (text, _, _) = encoding_rs::UTF_8.decode(&bytes);
    Ok(text.into_owned())
}
