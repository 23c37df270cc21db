//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::domain::ValidationErrors;

use self::constants::{
    DEFAULT_ADD_SERVICE_TIMEOUT_SECS, DEFAULT_BUILD_ROOT, DEFAULT_DOCKER_BIN,
    DEFAULT_REGISTRY_PORT,
};

/// 引擎配置
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// 由引擎接管 swarm 模式（启动和清理时重新 init）
    pub init_swarm: bool,
    /// 服务未指定网络时使用的默认网络
    pub default_network: Option<String>,
    /// 外部 registry 地址，未设置时启动本地 registry 服务
    pub registry: Option<String>,
    /// 本地 registry 发布端口
    pub local_registry_port: u32,
    /// 启动时导入运行时中已存在的镜像和网络
    pub discover_runtime: bool,
    /// 以 info 级别记录执行的命令
    pub log_commands: bool,
    /// addService 的超时时间
    pub add_service_timeout: Duration,
    /// 构建上下文根目录
    pub build_root: PathBuf,
    /// 运行时 CLI
    pub docker_bin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            init_swarm: false,
            default_network: None,
            registry: None,
            local_registry_port: DEFAULT_REGISTRY_PORT,
            discover_runtime: true,
            log_commands: false,
            add_service_timeout: Duration::from_secs(DEFAULT_ADD_SERVICE_TIMEOUT_SECS),
            build_root: PathBuf::from(DEFAULT_BUILD_ROOT),
            docker_bin: DEFAULT_DOCKER_BIN.to_string(),
        }
    }
}

impl EngineConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let local_registry_port = match env::var("HORNET_LOCAL_REGISTRY_PORT") {
            Ok(v) => v.parse().unwrap_or_else(|_| {
                warn!(value = %v, "Invalid HORNET_LOCAL_REGISTRY_PORT, using default");
                DEFAULT_REGISTRY_PORT
            }),
            Err(_) => DEFAULT_REGISTRY_PORT,
        };

        let add_service_timeout = env::var("HORNET_ADD_SERVICE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.add_service_timeout);

        Self {
            init_swarm: load_flag("HORNET_INIT_SWARM").unwrap_or(defaults.init_swarm),
            default_network: load_non_empty("HORNET_DEFAULT_NETWORK"),
            registry: load_non_empty("HORNET_REGISTRY"),
            local_registry_port,
            discover_runtime: load_flag("HORNET_DISCOVER_RUNTIME")
                .unwrap_or(defaults.discover_runtime),
            log_commands: load_flag("HORNET_LOG_COMMANDS").unwrap_or(defaults.log_commands),
            add_service_timeout,
            build_root: load_non_empty("HORNET_BUILD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.build_root),
            docker_bin: load_non_empty("HORNET_DOCKER_BIN").unwrap_or(defaults.docker_bin),
        }
    }

    /// 校验配置，返回所有违反的约束
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_port("local_registry_port", self.local_registry_port);
        errors.require_non_empty("docker_bin", self.docker_bin.trim());
        if let Some(registry) = &self.registry {
            errors.require_non_empty("registry", registry.trim());
        }
        if let Some(network) = &self.default_network {
            errors.require_non_empty("default_network", network.trim());
        }
        if self.build_root.as_os_str().is_empty() {
            errors.push("build_root", "must not be empty");
        }
        errors.into_result(())
    }

    /// 是否使用外部 registry
    pub fn external_registry(&self) -> bool {
        self.registry.is_some()
    }

    /// 镜像重新打 tag 和推送的地址
    pub fn registry_address(&self) -> String {
        match &self.registry {
            Some(registry) => registry.trim().to_string(),
            None => format!("0.0.0.0:{}", self.local_registry_port),
        }
    }
}

/// 解析布尔开关 ("1" / "true")
fn load_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// 加载非空环境变量
fn load_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// 常量
pub mod constants {
    /// 本地 registry 默认端口
    pub const DEFAULT_REGISTRY_PORT: u32 = 5000;

    /// addService 默认超时（秒）
    pub const DEFAULT_ADD_SERVICE_TIMEOUT_SECS: u64 = 60;

    /// 构建上下文根目录
    pub const DEFAULT_BUILD_ROOT: &str = "/tmp/builds";

    /// 运行时 CLI
    pub const DEFAULT_DOCKER_BIN: &str = "docker";

    /// 构建描述文件名
    pub const DOCKERFILE_NAME: &str = "Dockerfile";

    /// 上传的构建压缩包文件名
    pub const ARCHIVE_FILENAME: &str = "build.zip";

    /// 本地 registry 服务名与镜像
    pub const REGISTRY_SERVICE_NAME: &str = "registry";
    pub const REGISTRY_IMAGE: &str = "registry:2";

    /// 运行时自带的网络，发现时跳过
    pub const DEFAULT_NETWORKS: &[&str] = &["bridge", "docker_gwbridge", "host", "ingress"];

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_address() {
        let mut config = EngineConfig::default();
        assert_eq!(config.registry_address(), "0.0.0.0:5000");
        assert!(!config.external_registry());

        config.registry = Some("registry.example.com:443".to_string());
        assert_eq!(config.registry_address(), "registry.example.com:443");
        assert!(config.external_registry());
    }

    #[test]
    fn test_validate_reports_all_violations() {
        let config = EngineConfig {
            local_registry_port: 70000,
            docker_bin: " ".to_string(),
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.violations().len(), 2);
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_flag() {
        env::set_var("HORNET_TEST_FLAG_ON", "TRUE");
        env::set_var("HORNET_TEST_FLAG_OFF", "no");

        assert_eq!(load_flag("HORNET_TEST_FLAG_ON"), Some(true));
        assert_eq!(load_flag("HORNET_TEST_FLAG_OFF"), Some(false));
        assert_eq!(load_flag("HORNET_TEST_FLAG_MISSING"), None);

        env::remove_var("HORNET_TEST_FLAG_ON");
        env::remove_var("HORNET_TEST_FLAG_OFF");
    }
}
