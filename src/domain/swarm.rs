//! Swarm 实体模型
//!
//! 网络、镜像、服务以及声明式配置文档

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::validation::{trimmed, trimmed_opt, ValidationErrors};

/// 网络驱动
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkDriver {
    Bridge,
    #[default]
    Overlay,
}

impl NetworkDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkDriver::Bridge => "bridge",
            NetworkDriver::Overlay => "overlay",
        }
    }

    /// 解析运行时输出的驱动名，不支持的驱动返回 None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "bridge" => Some(NetworkDriver::Bridge),
            "overlay" => Some(NetworkDriver::Overlay),
            _ => None,
        }
    }
}

/// 网络
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    #[serde(default)]
    pub driver: NetworkDriver,
}

impl Network {
    pub fn new(name: impl Into<String>, driver: NetworkDriver) -> Self {
        Self {
            name: name.into(),
            driver,
        }
    }

    /// 返回规范化后的副本，或所有违反的约束
    pub fn validated(&self) -> Result<Network, ValidationErrors> {
        let network = Network {
            name: trimmed(&self.name),
            driver: self.driver,
        };
        let mut errors = ValidationErrors::new();
        errors.require_non_empty("name", &network.name);
        errors.into_result(network)
    }
}

/// 服务调度模式
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    #[default]
    Replicated,
    Global,
}

impl ServiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMode::Replicated => "replicated",
            ServiceMode::Global => "global",
        }
    }
}

/// 端口发布 (publish:target)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Expose {
    pub publish: u32,
    pub target: u32,
}

/// 服务
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    /// 镜像引用（相对于 registry 地址）
    pub image: String,
    #[serde(default)]
    pub mode: ServiceMode,
    /// 仅在 replicated 模式下生效
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<Expose>,
    /// 未设置时使用默认网络
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// 仅在设置了 command 时生效
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_args: Option<Vec<String>>,
}

impl Service {
    /// 使用默认值创建 replicated 服务
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            mode: ServiceMode::Replicated,
            replicas: None,
            expose: None,
            network: None,
            command: None,
            command_args: None,
        }
    }

    /// 返回规范化后的副本，或所有违反的约束
    ///
    /// global 模式下丢弃 replicas；没有 command 时丢弃 command_args
    pub fn validated(&self) -> Result<Service, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = trimmed(&self.name);
        let image = trimmed(&self.image);
        errors.require_non_empty("name", &name);
        errors.require_non_empty("image", &image);

        let replicas = match self.mode {
            ServiceMode::Global => None,
            ServiceMode::Replicated => {
                if self.replicas == Some(0) {
                    errors.push("replicas", "must be a positive integer");
                }
                self.replicas
            }
        };

        if let Some(expose) = &self.expose {
            errors.require_port("expose.publish", expose.publish);
            errors.require_port("expose.target", expose.target);
        }

        let command = trimmed_opt(self.command.as_deref());
        let command_args = if command.is_some() {
            self.command_args.clone()
        } else {
            None
        };

        errors.into_result(Service {
            name,
            image,
            mode: self.mode,
            replicas,
            expose: self.expose,
            network: trimmed_opt(self.network.as_deref()),
            command,
            command_args,
        })
    }
}

/// 从 Dockerfile 构建的镜像来源
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildSource {
    pub dockerfile: String,
    /// 上传的构建压缩包引用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

/// 镜像来源视图
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSource<'a> {
    Build(&'a BuildSource),
    PublicTag(&'a str),
}

/// 镜像
///
/// `build` 与 `public_tag` 必须且只能设置一个
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_tag: Option<String>,
}

impl Image {
    /// 从公共仓库拉取的镜像
    pub fn public(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build: None,
            public_tag: Some(tag.into()),
        }
    }

    /// 从 Dockerfile 构建的镜像
    pub fn build(name: impl Into<String>, dockerfile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build: Some(BuildSource {
                dockerfile: dockerfile.into(),
                archive: None,
            }),
            public_tag: None,
        }
    }

    pub fn source(&self) -> Option<ImageSource<'_>> {
        match (&self.build, &self.public_tag) {
            (Some(build), None) => Some(ImageSource::Build(build)),
            (None, Some(tag)) => Some(ImageSource::PublicTag(tag)),
            _ => None,
        }
    }

    /// 返回规范化后的副本，或所有违反的约束
    pub fn validated(&self) -> Result<Image, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = trimmed(&self.name);
        errors.require_non_empty("name", &name);

        let build = self.build.as_ref().map(|b| BuildSource {
            dockerfile: b.dockerfile.trim().to_string(),
            archive: trimmed_opt(b.archive.as_deref()),
        });
        if let Some(b) = &build {
            errors.require_non_empty("build.dockerfile", &b.dockerfile);
        }
        let public_tag = trimmed_opt(self.public_tag.as_deref());

        match (&build, &public_tag) {
            (None, None) => errors.push("source", "either `build` or `publicTag` must be provided"),
            (Some(_), Some(_)) => {
                errors.push("source", "only one of `build` or `publicTag` may be provided")
            }
            _ => {}
        }

        errors.into_result(Image {
            name,
            build,
            public_tag,
        })
    }
}

/// 声明式 swarm 配置文档
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwarmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<Network>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Image>>,
    pub services: Vec<Service>,
}

impl SwarmConfig {
    /// 校验整个文档，违规项以 `services[1].name` 形式定位
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let mut seen = HashSet::new();
        for (i, network) in self.networks.iter().flatten().enumerate() {
            let field = format!("networks[{}]", i);
            match network.validated() {
                Ok(n) => require_unique(&mut errors, &mut seen, &field, &n.name),
                Err(e) => errors.merge_prefixed(&field, e),
            }
        }

        let mut seen = HashSet::new();
        for (i, image) in self.images.iter().flatten().enumerate() {
            let field = format!("images[{}]", i);
            match image.validated() {
                Ok(img) => require_unique(&mut errors, &mut seen, &field, &img.name),
                Err(e) => errors.merge_prefixed(&field, e),
            }
        }

        let mut seen = HashSet::new();
        for (i, service) in self.services.iter().enumerate() {
            let field = format!("services[{}]", i);
            match service.validated() {
                Ok(s) => require_unique(&mut errors, &mut seen, &field, &s.name),
                Err(e) => errors.merge_prefixed(&field, e),
            }
        }

        errors.into_result(())
    }
}

fn require_unique(
    errors: &mut ValidationErrors,
    seen: &mut HashSet<String>,
    field: &str,
    name: &str,
) {
    if !seen.insert(name.to_string()) {
        errors.push(format!("{}.name", field), format!("duplicate name \"{}\"", name));
    }
}
