//! 内容解密密钥

use std::fs;
use std::path::Path;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::{MmdError, Result};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

/// 目录形式的密钥文件名
pub const KEY_FILE_NAME: &str = "key.bin";

/// AES-128-CBC 密钥与初始向量
#[derive(Clone)]
pub struct ContentKey {
    key: [u8; 16],
    iv: [u8; 16],
}

impl ContentKey {
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// 从密钥文本解析：第一行为 32 位十六进制密钥，第二行为 32 位十六进制 IV
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let key = decode_hex16(lines.next(), "key")?;
        let iv = decode_hex16(lines.next(), "iv")?;
        Ok(Self { key, iv })
    }

    /// 从密钥文件加载
    pub fn load_key_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let (text, _, _) = encoding_rs::UTF_8.decode(&bytes);
        Self::parse(&text)
    }

    /// 从目录加载（读取目录下的 key.bin）
    pub fn load_key_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::load_key_file(dir.as_ref().join(KEY_FILE_NAME))
    }

    /// 解密（PKCS#7 填充）
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|e| MmdError::Decrypt(e.to_string()))
    }

    /// 加密（PKCS#7 填充）
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        Aes128CbcEnc::new(&self.key.into(), &self.iv.into()).encrypt_padded_vec_mut::<Pkcs7>(data)
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey { .. }")
    }
}

fn decode_hex16(line: Option<&str>, what: &str) -> Result<[u8; 16]> {
    let line = line.ok_or_else(|| MmdError::InvalidKey(format!("missing {}", what)))?;
    let bytes = hex::decode(line).map_err(|e| MmdError::InvalidKey(format!("{}: {}", what, e)))?;
    bytes
        .try_into()
        .map_err(|_| MmdError::InvalidKey(format!("{} must be 16 bytes", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_TEXT: &str = "000102030405060708090a0b0c0d0e0f\r\nf0e0d0c0b0a090807060504030201000\r\n";

    #[test]
    fn test_parse_key_text() {
        let key = ContentKey::parse(KEY_TEXT).unwrap();
        assert_eq!(key.key[1], 0x01);
        assert_eq!(key.iv[0], 0xf0);
    }

    #[test]
    fn test_parse_rejects_short_key() {
        assert!(matches!(ContentKey::parse("0011\n0011\n"), Err(MmdError::InvalidKey(_))));
        assert!(matches!(ContentKey::parse(""), Err(MmdError::InvalidKey(_))));
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let key = ContentKey::parse(KEY_TEXT).unwrap();
        let plain = "a=1\nb=2\n".as_bytes();
        let cipher = key.encrypt(plain);
        assert_eq!(cipher.len() % 16, 0);
        assert_ne!(&cipher[..plain.len()], plain);
        assert_eq!(key.decrypt(&cipher).unwrap(), plain);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let key = ContentKey::parse(KEY_TEXT).unwrap();
        let other = ContentKey::new([7u8; 16], [9u8; 16]);
        let cipher = key.encrypt(b"hello world");
        // 错误密钥几乎必然得到非法填充；即便偶然合法，明文也不同
        match other.decrypt(&cipher) {
            Err(MmdError::Decrypt(_)) => {}
            Ok(plain) => assert_ne!(plain, b"hello world"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_load_key_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(KEY_FILE_NAME), KEY_TEXT).unwrap();
        let key = ContentKey::load_key_dir(dir.path()).unwrap();
        assert_eq!(key.iv[15], 0x00);
        assert_eq!(key.key[15], 0x0f);
    }
}
