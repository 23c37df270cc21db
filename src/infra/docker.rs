//! Docker CLI 参数构造
//!
//! 由校验后的实体生成有序参数列表，不涉及进程启动；
//! 同时负责解析 `list --format` 输出。

use crate::config::constants::{DEFAULT_NETWORKS, REGISTRY_IMAGE, REGISTRY_SERVICE_NAME};
use crate::domain::{Network, NetworkDriver, Service, ServiceMode};

/// 列表输出的字段分隔符
pub const FIELD_SEPARATOR: char = '\t';

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// 镜像在 registry 中的引用
pub fn registry_tag(registry: &str, image: &str) -> String {
    format!("{}/{}", registry, image)
}

pub fn version() -> Vec<String> {
    owned(&["-v"])
}

pub fn swarm_leave() -> Vec<String> {
    owned(&["swarm", "leave", "--force"])
}

pub fn swarm_init() -> Vec<String> {
    owned(&["swarm", "init"])
}

pub fn network_create(network: &Network) -> Vec<String> {
    owned(&[
        "network",
        "create",
        "--attachable",
        "--driver",
        network.driver.as_str(),
        &network.name,
    ])
}

pub fn network_rm(names: &[String]) -> Vec<String> {
    let mut args = owned(&["network", "rm"]);
    args.extend(names.iter().cloned());
    args
}

pub fn network_list() -> Vec<String> {
    owned(&["network", "list", "--format", "{{.Name}}\t{{.Driver}}"])
}

/// `service create` 参数
///
/// replicas 只在 replicated 模式下传递；network 为空时使用默认网络
pub fn service_create(
    service: &Service,
    registry: &str,
    default_network: Option<&str>,
) -> Vec<String> {
    let mut args = owned(&[
        "service",
        "create",
        "--name",
        &service.name,
        "--mode",
        service.mode.as_str(),
    ]);

    if service.mode == ServiceMode::Replicated {
        if let Some(replicas) = service.replicas {
            args.push("--replicas".to_string());
            args.push(replicas.to_string());
        }
    }

    if let Some(expose) = &service.expose {
        args.push("--publish".to_string());
        args.push(format!("{}:{}", expose.publish, expose.target));
    }

    if let Some(network) = service.network.as_deref().or(default_network) {
        args.push("--network".to_string());
        args.push(network.to_string());
    }

    args.push(registry_tag(registry, &service.image));

    if let Some(command) = &service.command {
        args.push(command.clone());
        args.extend(service.command_args.iter().flatten().cloned());
    }

    args
}

pub fn service_update_force(name: &str) -> Vec<String> {
    owned(&["service", "update", "--force", name])
}

pub fn service_rm(names: &[String]) -> Vec<String> {
    let mut args = owned(&["service", "rm"]);
    args.extend(names.iter().cloned());
    args
}

pub fn service_inspect(name: &str) -> Vec<String> {
    owned(&["service", "inspect", "--format", "{{.ID}}", name])
}

pub fn service_logs_follow(name: &str) -> Vec<String> {
    owned(&["service", "logs", name, "-f"])
}

/// 本地 registry 服务
pub fn registry_service_create(publish: u32) -> Vec<String> {
    owned(&[
        "service",
        "create",
        "--name",
        REGISTRY_SERVICE_NAME,
        "--mode",
        "replicated",
        "--replicas",
        "1",
        "--publish",
        &format!("{}:5000", publish),
        REGISTRY_IMAGE,
    ])
}

pub fn build(tag: &str) -> Vec<String> {
    owned(&["build", "-t", tag, "."])
}

pub fn pull(reference: &str) -> Vec<String> {
    owned(&["pull", reference])
}

pub fn tag(source: &str, target: &str) -> Vec<String> {
    owned(&["tag", source, target])
}

pub fn push(reference: &str) -> Vec<String> {
    owned(&["push", reference])
}

/// 删除 registry 中的镜像引用
pub fn image_rm(names: &[String], registry: &str) -> Vec<String> {
    let mut args = owned(&["rmi"]);
    args.extend(names.iter().map(|n| registry_tag(registry, n)));
    args
}

pub fn image_list() -> Vec<String> {
    owned(&["image", "list", "--format", "{{.Repository}}"])
}

/// 拆分输出为非空行，去掉 format 字符串可能带入的引号
fn output_lines(stdout: &[String]) -> impl Iterator<Item = String> + '_ {
    stdout
        .iter()
        .flat_map(|chunk| chunk.split('\n'))
        .map(|line| line.trim().replace('"', ""))
        .filter(|line| !line.is_empty())
}

/// 解析 `image list` 输出，返回 (名称, 仓库)
///
/// 名称去掉 registry 前缀；跳过悬空镜像
pub fn parse_image_list(stdout: &[String], registry: &str) -> Vec<(String, String)> {
    let prefix = format!("{}/", registry);
    output_lines(stdout)
        .filter(|repository| repository != "<none>")
        .map(|repository| {
            let name = repository
                .strip_prefix(&prefix)
                .unwrap_or(&repository)
                .to_string();
            (name, repository)
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// 解析 `network list` 输出
///
/// 跳过运行时自带网络和不支持的驱动
pub fn parse_network_list(stdout: &[String]) -> Vec<Network> {
    output_lines(stdout)
        .filter_map(|line| {
            let mut fields = line.split(FIELD_SEPARATOR);
            let name = fields.next()?.trim().to_string();
            let driver = NetworkDriver::parse(fields.next()?)?;
            if name.is_empty() || DEFAULT_NETWORKS.contains(&name.as_str()) {
                return None;
            }
            Some(Network { name, driver })
        })
        .collect()
}

/// 从 `swarm init` 输出中提取加入命令
pub fn parse_join_token(stdout: &[String]) -> Option<String> {
    output_lines(stdout).find(|line| line.starts_with("docker swarm join --token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Expose;

    #[test]
    fn test_network_create_args() {
        let args = network_create(&Network::new("main", NetworkDriver::Overlay));
        assert_eq!(
            args,
            vec!["network", "create", "--attachable", "--driver", "overlay", "main"]
        );
    }

    #[test]
    fn test_service_create_full() {
        let service = Service {
            name: "flask".to_string(),
            image: "flask-dummy".to_string(),
            mode: ServiceMode::Replicated,
            replicas: Some(3),
            expose: Some(Expose {
                publish: 8000,
                target: 80,
            }),
            network: Some("main".to_string()),
            command: Some("python".to_string()),
            command_args: Some(vec!["app.py".to_string(), "--debug".to_string()]),
        };

        let args = service_create(&service, "0.0.0.0:5000", Some("fallback"));
        assert_eq!(
            args,
            vec![
                "service",
                "create",
                "--name",
                "flask",
                "--mode",
                "replicated",
                "--replicas",
                "3",
                "--publish",
                "8000:80",
                "--network",
                "main",
                "0.0.0.0:5000/flask-dummy",
                "python",
                "app.py",
                "--debug",
            ]
        );
    }

    #[test]
    fn test_service_create_global_ignores_replicas_and_uses_default_network() {
        let mut service = Service::new("agent", "redis:alpine");
        service.mode = ServiceMode::Global;
        service.replicas = Some(5);

        let args = service_create(&service, "reg:5000", Some("backplane"));
        assert!(!args.contains(&"--replicas".to_string()));
        assert_eq!(
            &args[args.len() - 3..],
            &["--network", "backplane", "reg:5000/redis:alpine"]
        );
    }

    #[test]
    fn test_image_rm_prefixes_registry() {
        let args = image_rm(&["a".to_string(), "b".to_string()], "reg:5000");
        assert_eq!(args, vec!["rmi", "reg:5000/a", "reg:5000/b"]);
    }

    #[test]
    fn test_registry_service_create() {
        let args = registry_service_create(5001);
        assert!(args.contains(&"5001:5000".to_string()));
        assert_eq!(args.last().unwrap(), "registry:2");
    }

    #[test]
    fn test_parse_image_list() {
        let stdout = vec![
            "\"0.0.0.0:5000/web\"\nredis\n<none>\n".to_string(),
            "\"0.0.0.0:5000/\"".to_string(),
        ];
        let images = parse_image_list(&stdout, "0.0.0.0:5000");
        assert_eq!(
            images,
            vec![
                ("web".to_string(), "0.0.0.0:5000/web".to_string()),
                ("redis".to_string(), "redis".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_network_list() {
        let stdout = vec![
            "bridge\tbridge".to_string(),
            "ingress\toverlay".to_string(),
            "none\tnull".to_string(),
            "main\toverlay".to_string(),
            "local\tbridge".to_string(),
            "weird\tmacvlan".to_string(),
        ];
        let networks = parse_network_list(&stdout);
        assert_eq!(
            networks,
            vec![
                Network::new("main", NetworkDriver::Overlay),
                Network::new("local", NetworkDriver::Bridge),
            ]
        );
    }

    #[test]
    fn test_parse_join_token() {
        let stdout = vec![
            "Swarm initialized: current node (abc) is now a manager.".to_string(),
            "".to_string(),
            "    docker swarm join --token SWMTKN-1-xyz 192.168.1.2:2377".to_string(),
        ];
        assert_eq!(
            parse_join_token(&stdout).as_deref(),
            Some("docker swarm join --token SWMTKN-1-xyz 192.168.1.2:2377")
        );
        assert_eq!(parse_join_token(&["nothing".to_string()]), None);
    }
}
