//! 实体注册表
//!
//! 记录引擎已成功创建的网络、服务和镜像。只在外部命令确认成功后写入，
//! 读取总是返回克隆，调用方无法修改内部状态。

use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::{Image, Network, Service};
use crate::error::{HornetError, HornetResult};

/// 以名称为键的实体
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Network {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Service {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Image {
    fn name(&self) -> &str {
        &self.name
    }
}

/// 单类实体集合，按名称排序
pub struct Collection<T> {
    /// 错误信息中使用的类型名
    label: &'static str,
    items: RwLock<BTreeMap<String, T>>,
}

impl<T: Named + Clone> Collection<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            items: RwLock::new(BTreeMap::new()),
        }
    }

    /// 获取所有实体
    pub async fn list(&self) -> Vec<T> {
        let items = self.items.read().await;
        items.values().cloned().collect()
    }

    /// 获取单个实体
    pub async fn get(&self, name: &str) -> Option<T> {
        let items = self.items.read().await;
        items.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        let items = self.items.read().await;
        items.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        let items = self.items.read().await;
        items.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        let items = self.items.read().await;
        items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 名称已被占用时返回 Conflict
    pub async fn ensure_absent(&self, name: &str) -> HornetResult<()> {
        if self.contains(name).await {
            return Err(HornetError::conflict(format!("{} \"{}\"", self.label, name)));
        }
        Ok(())
    }

    /// 任一名称未被跟踪时返回 NotFound
    pub async fn ensure_present(&self, names: &[String]) -> HornetResult<()> {
        let items = self.items.read().await;
        match names.iter().find(|n| !items.contains_key(n.as_str())) {
            Some(missing) => Err(HornetError::not_found(format!(
                "{} \"{}\"",
                self.label, missing
            ))),
            None => Ok(()),
        }
    }

    /// 提交实体
    pub async fn insert(&self, item: T) {
        let mut items = self.items.write().await;
        items.insert(item.name().to_string(), item);
    }

    /// 名称未被占用时提交，返回是否写入
    pub async fn insert_if_absent(&self, item: T) -> bool {
        let mut items = self.items.write().await;
        if items.contains_key(item.name()) {
            return false;
        }
        items.insert(item.name().to_string(), item);
        true
    }

    /// 一次性移除一批名称
    pub async fn remove_all(&self, names: &[String]) {
        let mut items = self.items.write().await;
        for name in names {
            items.remove(name);
        }
    }
}

/// 注册表
pub struct Registry {
    pub networks: Collection<Network>,
    pub services: Collection<Service>,
    pub images: Collection<Image>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            networks: Collection::new("Network"),
            services: Collection::new("Service"),
            images: Collection::new("Image"),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
