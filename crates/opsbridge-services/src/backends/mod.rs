//! Builtin backend integrations
//!
//! Kubernetes is the critical service; everything else is optional. The
//! HTTP backends are read-only endpoint tables over [`EndpointService`].

pub mod endpoint;
pub mod http;
pub mod utilities;

pub use endpoint::{EndpointService, EndpointSpec};
pub use http::HttpBackend;
pub use utilities::UtilitiesService;

use crate::catalog::ServiceCatalog;

/// The service whose failure aborts startup
pub const CRITICAL_SERVICE: &str = "kubernetes";

/// Every builtin service, in initialization and shutdown order
pub const BUILTIN_SERVICES: &[&str] = &[
    CRITICAL_SERVICE,
    "prometheus",
    "alertmanager",
    "elasticsearch",
    "kibana",
    "grafana",
    "jaeger",
    "opentelemetry",
    "helm",
    "utilities",
];

pub static KUBERNETES: &[EndpointSpec] = &[
    EndpointSpec::get("kubernetes_list_namespaces", "List namespaces", "/api/v1/namespaces")
        .query(&["labelSelector"])
        .list("/items"),
    EndpointSpec::get("kubernetes_list_nodes", "List cluster nodes", "/api/v1/nodes")
        .query(&["labelSelector"])
        .list("/items"),
    EndpointSpec::get(
        "kubernetes_list_pods",
        "List pods in a namespace",
        "/api/v1/namespaces/{namespace}/pods",
    )
    .query(&["labelSelector", "fieldSelector"])
    .list("/items"),
    EndpointSpec::get(
        "kubernetes_get_pod",
        "Get one pod",
        "/api/v1/namespaces/{namespace}/pods/{name}",
    ),
    EndpointSpec::get(
        "kubernetes_list_deployments",
        "List deployments in a namespace",
        "/apis/apps/v1/namespaces/{namespace}/deployments",
    )
    .query(&["labelSelector"])
    .list("/items"),
    EndpointSpec::get(
        "kubernetes_list_services",
        "List services in a namespace",
        "/api/v1/namespaces/{namespace}/services",
    )
    .list("/items"),
    EndpointSpec::get(
        "kubernetes_list_events",
        "List events in a namespace",
        "/api/v1/namespaces/{namespace}/events",
    )
    .query(&["fieldSelector"])
    .list("/items"),
];

pub static PROMETHEUS: &[EndpointSpec] = &[
    EndpointSpec::get("prometheus_query", "Evaluate an instant PromQL query", "/api/v1/query")
        .query(&["query", "time"]),
    EndpointSpec::get(
        "prometheus_query_range",
        "Evaluate a PromQL query over a time range",
        "/api/v1/query_range",
    )
    .query(&["query", "start", "end", "step"]),
    EndpointSpec::get("prometheus_list_targets", "List scrape targets", "/api/v1/targets")
        .fixed(&[("state", "active")])
        .list("/data/activeTargets"),
    EndpointSpec::get("prometheus_list_alerts", "List firing and pending alerts", "/api/v1/alerts")
        .list("/data/alerts"),
    EndpointSpec::get("prometheus_list_rules", "List recording and alerting rule groups", "/api/v1/rules")
        .query(&["type"])
        .list("/data/groups"),
    EndpointSpec::get("prometheus_list_label_values", "List values of a label", "/api/v1/label/{label}/values")
        .list("/data"),
];

pub static ALERTMANAGER: &[EndpointSpec] = &[
    EndpointSpec::get("alertmanager_list_alerts", "List alerts", "/api/v2/alerts")
        .query(&["active", "silenced", "inhibited", "receiver"])
        .list(""),
    EndpointSpec::get("alertmanager_list_silences", "List silences", "/api/v2/silences").list(""),
    EndpointSpec::get("alertmanager_list_receivers", "List receivers", "/api/v2/receivers").list(""),
    EndpointSpec::get("alertmanager_get_status", "Cluster and config status", "/api/v2/status"),
];

pub static ELASTICSEARCH: &[EndpointSpec] = &[
    EndpointSpec::get("elasticsearch_cluster_health", "Cluster health", "/_cluster/health"),
    EndpointSpec::get("elasticsearch_list_indices", "List indices", "/_cat/indices")
        .fixed(&[("format", "json")])
        .list(""),
    EndpointSpec::get("elasticsearch_get_mapping", "Get the mapping of an index", "/{index}/_mapping"),
    EndpointSpec::get("elasticsearch_search", "Query-string search in an index", "/{index}/_search")
        .query(&["q", "size", "sort"])
        .list("/hits/hits"),
];

pub static KIBANA: &[EndpointSpec] = &[
    EndpointSpec::get("kibana_get_status", "Kibana status", "/api/status"),
    EndpointSpec::get("kibana_list_spaces", "List spaces", "/api/spaces/space").list(""),
    EndpointSpec::get("kibana_find_saved_objects", "Find saved objects", "/api/saved_objects/_find")
        .query(&["type", "search"])
        .fixed(&[("per_page", "1000")])
        .list("/saved_objects"),
    EndpointSpec::get("kibana_list_data_views", "List data views", "/api/data_views")
        .list("/data_view"),
];

pub static GRAFANA: &[EndpointSpec] = &[
    EndpointSpec::get("grafana_health", "Grafana health", "/api/health"),
    EndpointSpec::get("grafana_list_dashboards", "Search dashboards", "/api/search")
        .query(&["query", "tag"])
        .fixed(&[("type", "dash-db")])
        .list(""),
    EndpointSpec::get("grafana_get_dashboard", "Get a dashboard by uid", "/api/dashboards/uid/{uid}"),
    EndpointSpec::get("grafana_list_datasources", "List datasources", "/api/datasources").list(""),
    EndpointSpec::get("grafana_list_folders", "List folders", "/api/folders").list(""),
];

pub static JAEGER: &[EndpointSpec] = &[
    EndpointSpec::get("jaeger_list_services", "List traced services", "/api/services").list("/data"),
    EndpointSpec::get(
        "jaeger_list_operations",
        "List operations of a service",
        "/api/services/{service}/operations",
    )
    .list("/data"),
    EndpointSpec::get("jaeger_find_traces", "Find traces", "/api/traces")
        .query(&["service", "operation", "start", "end", "minDuration", "maxDuration", "tags"])
        .list("/data"),
    EndpointSpec::get("jaeger_get_trace", "Get a trace by id", "/api/traces/{trace_id}"),
];

pub static OPENTELEMETRY: &[EndpointSpec] = &[EndpointSpec::get(
    "opentelemetry_collector_health",
    "Collector health check extension status",
    "/",
)];

pub static HELM: &[EndpointSpec] = &[
    EndpointSpec::get("helm_list_releases", "List Helm release records in all namespaces", "/api/v1/secrets")
        .fixed(&[("labelSelector", "owner=helm")])
        .list("/items"),
    EndpointSpec::get(
        "helm_list_namespace_releases",
        "List Helm release records in a namespace",
        "/api/v1/namespaces/{namespace}/secrets",
    )
    .fixed(&[("labelSelector", "owner=helm")])
    .list("/items"),
];

/// Catalog of every builtin service
pub fn builtin_catalog() -> ServiceCatalog {
    ServiceCatalog::new(CRITICAL_SERVICE, || EndpointService::new(CRITICAL_SERVICE, KUBERNETES))
        .optional("prometheus", || EndpointService::new("prometheus", PROMETHEUS))
        .optional("alertmanager", || EndpointService::new("alertmanager", ALERTMANAGER))
        .optional("elasticsearch", || EndpointService::new("elasticsearch", ELASTICSEARCH))
        .optional("kibana", || EndpointService::new("kibana", KIBANA))
        .optional("grafana", || EndpointService::new("grafana", GRAFANA))
        .optional("jaeger", || EndpointService::new("jaeger", JAEGER))
        .optional("opentelemetry", || EndpointService::new("opentelemetry", OPENTELEMETRY))
        .optional("helm", || {
            EndpointService::new("helm", HELM).with_fallback_backend(CRITICAL_SERVICE)
        })
        .optional("utilities", UtilitiesService::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_matches_builtin_list() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.names(), BUILTIN_SERVICES.to_vec());
        assert_eq!(catalog.critical(), CRITICAL_SERVICE);
    }

    #[test]
    fn test_tool_names_are_unique_and_prefixed() {
        let tables: &[(&str, &[EndpointSpec])] = &[
            ("kubernetes", KUBERNETES),
            ("prometheus", PROMETHEUS),
            ("alertmanager", ALERTMANAGER),
            ("elasticsearch", ELASTICSEARCH),
            ("kibana", KIBANA),
            ("grafana", GRAFANA),
            ("jaeger", JAEGER),
            ("opentelemetry", OPENTELEMETRY),
            ("helm", HELM),
        ];

        let mut seen = HashSet::new();
        for (service, table) in tables {
            for spec in table.iter() {
                assert!(spec.tool.starts_with(service), "{} not prefixed", spec.tool);
                assert!(seen.insert(spec.tool), "{} listed twice", spec.tool);
            }
        }
    }
}
