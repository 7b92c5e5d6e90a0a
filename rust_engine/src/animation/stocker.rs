//! 动作缓存
//!
//! 按文件路径缓存已解析的动作，带引用计数。未被引用的动作不会立即释放，
//! 而是留在 LRU 链表中，超过上限时从最久未使用的一端释放。
//!
//! 链表以槽位索引实现（槽位数组 + 空闲列表），提升到 MRU 与引用计数增减都是 O(1)。
//! 缓存本身不加锁，跨线程共享时使用 [`SharedMotionStocker`]。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::get_config;
use crate::Result;

use super::VmdFile;

/// 可被 MotionStocker 缓存的动作数据
pub trait MotionSource: Sized {
    /// 从文件解析
    fn load_file(path: &Path) -> Result<Self>;
    /// 从内存解析
    fn load_bytes(data: &[u8]) -> Result<Self>;
}

impl MotionSource for VmdFile {
    fn load_file(path: &Path) -> Result<Self> {
        VmdFile::load(path)
    }

    fn load_bytes(data: &[u8]) -> Result<Self> {
        VmdFile::load_from_bytes(data)
    }
}

/// 缓存条目句柄（槽位 + 代数，槽位复用后旧句柄自动失效）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MotionHandle {
    slot: u32,
    generation: u32,
}

struct Entry<M> {
    /// 从数据加载的条目没有名称，不参与按名查找
    name: Option<PathBuf>,
    motion: M,
    use_count: i32,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Slot<M> {
    generation: u32,
    entry: Option<Entry<M>>,
}

/// 被后台加载线程共享时的形态：所有调用都经过同一把锁
pub type SharedMotionStocker<M = VmdFile> = Arc<Mutex<MotionStocker<M>>>;

/// 动作缓存
pub struct MotionStocker<M = VmdFile> {
    slots: Vec<Slot<M>>,
    free: Vec<usize>,
    /// 最久未使用端
    head: Option<usize>,
    /// 最近使用端
    tail: Option<usize>,
    by_name: HashMap<PathBuf, usize>,
    len: usize,
    unused: usize,
    cache_size: usize,
}

impl<M: MotionSource> MotionStocker<M> {
    /// 使用全局配置中的缓存上限创建
    pub fn new() -> Self {
        Self::with_capacity(get_config().motion_cache_size)
    }

    /// 指定未使用条目的保留上限
    pub fn with_capacity(cache_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            by_name: HashMap::new(),
            len: 0,
            unused: 0,
            cache_size,
        }
    }

    /// 转换为可跨线程共享的形态
    pub fn into_shared(self) -> SharedMotionStocker<M> {
        Arc::new(Mutex::new(self))
    }

    /// 从文件加载；已缓存时直接返回并提升为最近使用
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<MotionHandle> {
        let path = path.as_ref();

        if let Some(&slot) = self.by_name.get(path) {
            self.unlink(slot);
            self.push_back(slot);
            if let Some(entry) = self.entry_mut(slot) {
                entry.use_count += 1;
                if entry.use_count == 1 {
                    self.unused = self.unused.saturating_sub(1);
                }
            }
            return Ok(self.handle(slot));
        }

        let motion = M::load_file(path)?;
        let slot = self.insert(Some(path.to_path_buf()), motion);
        self.push_back(slot);
        self.by_name.insert(path.to_path_buf(), slot);
        Ok(self.handle(slot))
    }

    /// 从内存加载；总是重新解析，匿名条目放在最久未使用端
    pub fn load_from_data(&mut self, data: &[u8]) -> Result<MotionHandle> {
        let motion = M::load_bytes(data)?;
        let slot = self.insert(None, motion);
        self.push_front(slot);
        Ok(self.handle(slot))
    }

    /// 释放一次引用，并清理超出上限的未使用条目
    ///
    /// 未知或已失效的句柄被忽略。
    pub fn unload(&mut self, handle: MotionHandle) {
        let Some(slot) = self.resolve(handle) else {
            return;
        };

        if let Some(entry) = self.entry_mut(slot) {
            entry.use_count -= 1;
            if entry.use_count == 0 {
                self.unused += 1;
            }
        }

        self.evict();
    }

    /// 获取动作数据
    pub fn get(&self, handle: MotionHandle) -> Option<&M> {
        let slot = self.resolve(handle)?;
        self.slots[slot].entry.as_ref().map(|e| &e.motion)
    }

    /// 获取引用计数
    pub fn use_count(&self, handle: MotionHandle) -> Option<i32> {
        let slot = self.resolve(handle)?;
        self.slots[slot].entry.as_ref().map(|e| e.use_count)
    }

    /// 指定文件是否在缓存中
    pub fn contains_file<P: AsRef<Path>>(&self, path: P) -> bool {
        self.by_name.contains_key(path.as_ref())
    }

    /// 缓存条目数
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 未被引用的条目数
    pub fn unused_count(&self) -> usize {
        self.unused
    }

    /// 未使用条目保留上限
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// 释放全部条目（现有句柄全部失效）
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.head = None;
        self.tail = None;
        self.by_name.clear();
        self.len = 0;
        self.unused = 0;
    }

    /// 从最久未使用端开始释放未使用条目，直到数量不超过上限
    fn evict(&mut self) {
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            if self.unused <= self.cache_size {
                break;
            }
            let Some(entry) = self.entry_mut(slot) else {
                break;
            };
            cursor = entry.next;
            if entry.use_count <= 0 {
                self.remove(slot);
                self.unused -= 1;
            }
        }
    }

    fn handle(&self, slot: usize) -> MotionHandle {
        MotionHandle {
            slot: slot as u32,
            generation: self.slots[slot].generation,
        }
    }

    fn resolve(&self, handle: MotionHandle) -> Option<usize> {
        let slot = handle.slot as usize;
        let s = self.slots.get(slot)?;
        (s.generation == handle.generation && s.entry.is_some()).then_some(slot)
    }

    fn entry_mut(&mut self, slot: usize) -> Option<&mut Entry<M>> {
        self.slots.get_mut(slot)?.entry.as_mut()
    }

    fn insert(&mut self, name: Option<PathBuf>, motion: M) -> usize {
        let entry = Entry {
            name,
            motion,
            use_count: 1,
            prev: None,
            next: None,
        };
        self.len += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot].entry = Some(entry);
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        }
    }

    fn remove(&mut self, slot: usize) {
        self.unlink(slot);
        let s = &mut self.slots[slot];
        if let Some(entry) = s.entry.take() {
            s.generation = s.generation.wrapping_add(1);
            if let Some(name) = &entry.name {
                log::debug!("MotionStocker: 释放缓存 {}", name.display());
                self.by_name.remove(name);
            }
            self.free.push(slot);
            self.len -= 1;
        }
    }

    fn unlink(&mut self, slot: usize) {
        let Some(entry) = self.entry_mut(slot) else {
            return;
        };
        let prev = entry.prev.take();
        let next = entry.next.take();
        match prev.and_then(|p| self.entry_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.entry_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_back(&mut self, slot: usize) {
        let old_tail = self.tail;
        let Some(entry) = self.entry_mut(slot) else {
            return;
        };
        entry.prev = old_tail;
        entry.next = None;
        match old_tail.and_then(|t| self.entry_mut(t)) {
            Some(t) => t.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        let Some(entry) = self.entry_mut(slot) else {
            return;
        };
        entry.prev = None;
        entry.next = old_head;
        match old_head.and_then(|h| self.entry_mut(h)) {
            Some(h) => h.prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }
}

impl<M: MotionSource> Default for MotionStocker<M> {
    fn default() -> Self {
        Self::new()
    }
}
