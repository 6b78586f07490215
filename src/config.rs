//! Static cluster configuration.
//!
//! Everything here is read once at process start (flags or environment) and
//! threaded through [`crate::options::Options`]; nothing is looked up globally.

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser};

/// Maps hosts ending in `domain_suffix` onto an ingress class (or Istio gateway).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayMapping {
    pub domain_suffix: String,
    pub ingress_class: String,
}

impl FromStr for GatewayMapping {
    type Err = String;

    /// Parses `.nav.no=nais-ingress-external`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((suffix, class)) if !suffix.trim().is_empty() && !class.trim().is_empty() => {
                Ok(GatewayMapping {
                    domain_suffix: suffix.trim().to_owned(),
                    ingress_class: class.trim().to_owned(),
                })
            }
            _ => Err(format!(
                "gateway mapping {s:?} must be on the form <domain suffix>=<ingress class>"
            )),
        }
    }
}

/// An IPv4 network in CIDR notation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Cidr {
    pub address: Ipv4Addr,
    pub prefix: u8,
}

impl Ipv4Cidr {
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        if self.prefix == 0 {
            return true;
        }
        let mask = u32::MAX << (32 - u32::from(self.prefix));
        (u32::from(self.address) & mask) == (u32::from(ip) & mask)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s.split_once('/').unwrap_or((s, "32"));
        let address = address
            .parse::<Ipv4Addr>()
            .map_err(|e| format!("invalid address in {s:?}: {e}"))?;
        let prefix = prefix
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| format!("invalid prefix length in {s:?}"))?;
        Ok(Ipv4Cidr { address, prefix })
    }
}

impl std::fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "naiserator", about = "Synthesizes Kubernetes resources from workload specs")]
pub struct Config {
    /// Name of the cluster the workloads run in
    #[arg(id = "cluster-name", long = "cluster-name", env = "NAIS_CLUSTER_NAME", default_value = "local")]
    pub cluster_name: String,

    /// Ingress class per domain suffix, e.g. `.nav.no=nais-ingress-external`
    #[arg(
        id = "gateway-mapping",
        long = "gateway-mapping",
        env = "GATEWAY_MAPPINGS",
        value_delimiter = ','
    )]
    pub gateway_mappings: Vec<GatewayMapping>,

    /// Image pull secrets added to every pod
    #[arg(id = "image-pull-secret", long = "image-pull-secret", env = "IMAGE_PULL_SECRETS", value_delimiter = ',')]
    pub image_pull_secrets: Vec<String>,

    /// How long a single read against the cluster may take
    #[arg(
        id = "cluster-read-timeout",
        long = "cluster-read-timeout",
        env = "CLUSTER_READ_TIMEOUT_SECONDS",
        default_value = "10",
        value_parser = parse_seconds
    )]
    pub cluster_read_timeout: Duration,

    #[command(flatten)]
    pub features: Features,

    #[command(flatten)]
    pub images: Images,

    #[command(flatten)]
    pub proxy: Proxy,

    #[command(flatten)]
    pub vault: Vault,

    #[command(flatten)]
    pub google: Google,

    #[command(flatten)]
    pub network_policy: NetworkPolicy,

    #[command(flatten)]
    pub observability: Observability,

    #[command(flatten)]
    pub aiven: Aiven,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    s.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| format!("invalid number of seconds {s:?}: {e}"))
}

/// Cluster-wide feature toggles; a workload can only use what the cluster offers.
#[derive(Clone, Debug, Default, Args)]
pub struct Features {
    #[arg(id = "features.vault", long = "features.vault", env = "FEATURES_VAULT")]
    pub vault: bool,
    #[arg(id = "features.azurerator", long = "features.azurerator", env = "FEATURES_AZURERATOR")]
    pub azurerator: bool,
    #[arg(id = "features.idporten", long = "features.idporten", env = "FEATURES_IDPORTEN")]
    pub idporten: bool,
    #[arg(id = "features.maskinporten", long = "features.maskinporten", env = "FEATURES_MASKINPORTEN")]
    pub maskinporten: bool,
    #[arg(id = "features.jwker", long = "features.jwker", env = "FEATURES_JWKER")]
    pub jwker: bool,
    #[arg(id = "features.aiven", long = "features.aiven", env = "FEATURES_AIVEN")]
    pub aiven: bool,
    #[arg(id = "features.wonderwall", long = "features.wonderwall", env = "FEATURES_WONDERWALL")]
    pub wonderwall: bool,
    #[arg(id = "features.network-policy", long = "features.network-policy", env = "FEATURES_NETWORK_POLICY")]
    pub network_policy: bool,
    #[arg(id = "features.cilium", long = "features.cilium", env = "FEATURES_CILIUM")]
    pub cilium: bool,
    #[arg(id = "features.fqdn-policy", long = "features.fqdn-policy", env = "FEATURES_FQDN_POLICY")]
    pub fqdn_policy: bool,
    #[arg(id = "features.prometheus-operator", long = "features.prometheus-operator", env = "FEATURES_PROMETHEUS_OPERATOR")]
    pub prometheus_operator: bool,
    #[arg(id = "features.cnrm", long = "features.cnrm", env = "FEATURES_CNRM")]
    pub cnrm: bool,
    #[arg(id = "features.secure-logs", long = "features.secure-logs", env = "FEATURES_SECURE_LOGS")]
    pub secure_logs: bool,
    #[arg(id = "features.webproxy", long = "features.webproxy", env = "FEATURES_WEBPROXY")]
    pub webproxy: bool,
}

/// Sidecar and init container images
#[derive(Clone, Debug, Args)]
pub struct Images {
    #[arg(
        id = "images.elector",
        long = "images.elector",
        env = "IMAGES_ELECTOR",
        default_value = "europe-north1-docker.pkg.dev/nais-io/nais/images/elector:latest"
    )]
    pub elector: String,
    #[arg(
        id = "images.wonderwall",
        long = "images.wonderwall",
        env = "IMAGES_WONDERWALL",
        default_value = "europe-north1-docker.pkg.dev/nais-io/nais/images/wonderwall:latest"
    )]
    pub wonderwall: String,
    #[arg(
        id = "images.cloudsql-proxy",
        long = "images.cloudsql-proxy",
        env = "IMAGES_CLOUDSQL_PROXY",
        default_value = "gcr.io/cloud-sql-connectors/cloud-sql-proxy:2.11.0"
    )]
    pub cloudsql_proxy: String,
    #[arg(
        id = "images.vault-sidekick",
        long = "images.vault-sidekick",
        env = "IMAGES_VAULT_SIDEKICK",
        default_value = "navikt/vks:latest"
    )]
    pub vault_sidekick: String,
    #[arg(
        id = "images.secure-logs-fluentbit",
        long = "images.secure-logs-fluentbit",
        env = "IMAGES_SECURE_LOGS_FLUENTBIT",
        default_value = "fluent/fluent-bit:latest"
    )]
    pub secure_logs_fluentbit: String,
    #[arg(
        id = "images.secure-logs-configmap-reload",
        long = "images.secure-logs-configmap-reload",
        env = "IMAGES_SECURE_LOGS_CONFIGMAP_RELOAD",
        default_value = "jimmidyson/configmap-reload:latest"
    )]
    pub secure_logs_configmap_reload: String,
}

/// Outbound web proxy injected into workloads that ask for it
#[derive(Clone, Debug, Default, Args)]
pub struct Proxy {
    /// Proxy URL, e.g. `http://webproxy.nais:8088`
    #[arg(id = "proxy.address", long = "proxy.address", env = "PROXY_ADDRESS")]
    pub address: Option<String>,
    /// Hosts or domains that bypass the proxy
    #[arg(id = "proxy.exclude", long = "proxy.exclude", env = "PROXY_EXCLUDE", value_delimiter = ',')]
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug, Args)]
pub struct Vault {
    #[arg(id = "vault.address", long = "vault.address", env = "VAULT_ADDRESS", default_value = "")]
    pub address: String,
    #[arg(id = "vault.kv-path", long = "vault.kv-path", env = "VAULT_KV_PATH", default_value = "/kv/preprod/fss")]
    pub kv_path: String,
    #[arg(id = "vault.auth-path", long = "vault.auth-path", env = "VAULT_AUTH_PATH", default_value = "auth/kubernetes/preprod/fss/login")]
    pub auth_path: String,
}

#[derive(Clone, Debug, Args)]
pub struct Google {
    /// Project holding the workload identity service accounts
    #[arg(id = "google.project-id", long = "google.project-id", env = "GOOGLE_PROJECT_ID", default_value = "")]
    pub project_id: String,
    #[arg(id = "google.region", long = "google.region", env = "GOOGLE_REGION", default_value = "europe-north1")]
    pub region: String,
    /// Namespace the IAMServiceAccount objects are created in
    #[arg(
        id = "google.service-account-namespace",
        long = "google.service-account-namespace",
        env = "GOOGLE_SERVICE_ACCOUNT_NAMESPACE",
        default_value = "serviceaccounts"
    )]
    pub service_account_namespace: String,
}

#[derive(Clone, Debug, Args)]
pub struct NetworkPolicy {
    /// Addresses of the cluster DNS, allowed as egress for every workload
    #[arg(
        id = "network-policy.allowed-kubedns-cidrs",
        long = "network-policy.allowed-kubedns-cidrs",
        env = "NETWORK_POLICY_ALLOWED_KUBEDNS_CIDRS",
        value_delimiter = ','
    )]
    pub allowed_kubedns_cidrs: Vec<Ipv4Cidr>,
    /// Networks workloads are never allowed to reach through external IP rules
    #[arg(
        id = "network-policy.disallowed-egress-cidrs",
        long = "network-policy.disallowed-egress-cidrs",
        env = "NETWORK_POLICY_DISALLOWED_EGRESS_CIDRS",
        value_delimiter = ','
    )]
    pub disallowed_egress_cidrs: Vec<Ipv4Cidr>,
    /// Address of the Kubernetes API server, needed by the leader election sidecar
    #[arg(id = "network-policy.api-server-cidr", long = "network-policy.api-server-cidr", env = "NETWORK_POLICY_API_SERVER_CIDR")]
    pub api_server_cidr: Option<Ipv4Cidr>,
    #[arg(
        id = "network-policy.ingress-controller-namespace",
        long = "network-policy.ingress-controller-namespace",
        env = "NETWORK_POLICY_INGRESS_CONTROLLER_NAMESPACE",
        default_value = "nginx"
    )]
    pub ingress_controller_namespace: String,
    #[arg(
        id = "network-policy.prometheus-namespace",
        long = "network-policy.prometheus-namespace",
        env = "NETWORK_POLICY_PROMETHEUS_NAMESPACE",
        default_value = "nais-system"
    )]
    pub prometheus_namespace: String,
}

#[derive(Clone, Debug, Args)]
pub struct Observability {
    #[arg(
        id = "observability.otel-collector-endpoint",
        long = "observability.otel-collector-endpoint",
        env = "OBSERVABILITY_OTEL_COLLECTOR_ENDPOINT",
        default_value = "http://opentelemetry-collector.nais-system:4317"
    )]
    pub otel_collector_endpoint: String,
    #[arg(
        id = "observability.otel-collector-namespace",
        long = "observability.otel-collector-namespace",
        env = "OBSERVABILITY_OTEL_COLLECTOR_NAMESPACE",
        default_value = "nais-system"
    )]
    pub otel_collector_namespace: String,
    #[arg(
        id = "observability.otel-collector-app",
        long = "observability.otel-collector-app",
        env = "OBSERVABILITY_OTEL_COLLECTOR_APP",
        default_value = "opentelemetry-collector"
    )]
    pub otel_collector_app: String,
    /// Instrumentation object referenced by auto-instrumented pods
    #[arg(
        id = "observability.auto-instrumentation",
        long = "observability.auto-instrumentation",
        env = "OBSERVABILITY_AUTO_INSTRUMENTATION",
        default_value = "nais-system/nais"
    )]
    pub auto_instrumentation: String,
}

#[derive(Clone, Debug, Args)]
pub struct Aiven {
    #[arg(id = "aiven.project", long = "aiven.project", env = "AIVEN_PROJECT", default_value = "")]
    pub project: String,
}

impl Config {
    /// The ingress class serving `host`, picking the longest matching suffix.
    pub fn ingress_class_for_host(&self, host: &str) -> Option<&str> {
        self.gateway_mappings
            .iter()
            .filter(|m| host.ends_with(m.domain_suffix.as_str()))
            .max_by_key(|m| m.domain_suffix.len())
            .map(|m| m.ingress_class.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let config = Config::parse_from(["naiserator"]);
        assert_eq!(config.cluster_name, "local");
        assert!(config.gateway_mappings.is_empty());
        assert_eq!(config.cluster_read_timeout, Duration::from_secs(10));
        assert!(!config.features.vault);
        assert_eq!(config.google.service_account_namespace, "serviceaccounts");
    }

    #[test]
    fn parses_flags() {
        let config = Config::parse_from([
            "naiserator",
            "--cluster-name",
            "dev-gcp",
            "--gateway-mapping",
            ".nav.no=nais-ingress-external,.intern.nav.no=nais-ingress",
            "--features.vault",
            "--network-policy.disallowed-egress-cidrs",
            "10.0.0.0/8,169.254.169.254",
        ]);
        assert_eq!(config.cluster_name, "dev-gcp");
        assert_eq!(config.gateway_mappings.len(), 2);
        assert!(config.features.vault);
        assert_eq!(
            config.network_policy.disallowed_egress_cidrs[1].to_string(),
            "169.254.169.254/32"
        );
    }

    #[test]
    fn same_field_names_in_different_groups_stay_apart() {
        let config = Config::parse_from([
            "naiserator",
            "--features.wonderwall",
            "--images.wonderwall=ghcr.io/nais/wonderwall:1",
            "--proxy.address=http://webproxy.nais:8088",
            "--vault.address=https://vault.adeo.no",
            "--google.project-id=nais-project-1234",
            "--observability.auto-instrumentation=nais-system/custom",
            "--aiven.project=nav-dev",
        ]);
        assert!(config.features.wonderwall);
        assert_eq!(config.images.wonderwall, "ghcr.io/nais/wonderwall:1");
        assert_eq!(
            config.proxy.address.as_deref(),
            Some("http://webproxy.nais:8088")
        );
        assert_eq!(config.vault.address, "https://vault.adeo.no");
        assert_eq!(config.google.project_id, "nais-project-1234");
        assert_eq!(config.observability.auto_instrumentation, "nais-system/custom");
        assert_eq!(config.aiven.project, "nav-dev");
    }

    #[test]
    fn longest_gateway_suffix_wins() {
        let config = Config::parse_from([
            "naiserator",
            "--gateway-mapping",
            ".nav.no=nais-ingress-external,.intern.nav.no=nais-ingress",
        ]);
        assert_eq!(
            config.ingress_class_for_host("myapp.intern.nav.no"),
            Some("nais-ingress")
        );
        assert_eq!(
            config.ingress_class_for_host("www.nav.no"),
            Some("nais-ingress-external")
        );
        assert_eq!(config.ingress_class_for_host("example.com"), None);
    }

    #[test]
    fn rejects_malformed_gateway_mappings() {
        assert!("nav.no".parse::<GatewayMapping>().is_err());
        assert!("=class".parse::<GatewayMapping>().is_err());
    }

    #[test]
    fn cidr_containment() {
        let cidr: Ipv4Cidr = "10.0.0.0/8".parse().unwrap();
        assert!(cidr.contains("10.1.2.3".parse().unwrap()));
        assert!(!cidr.contains("11.0.0.1".parse().unwrap()));
        let all: Ipv4Cidr = "0.0.0.0/0".parse().unwrap();
        assert!(all.contains("8.8.8.8".parse().unwrap()));
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
    }
}
