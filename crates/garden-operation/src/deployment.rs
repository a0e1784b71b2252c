//! kube-apiserver and kube-controller-manager deployments.

use garden_config::KubeApiServer;
use garden_flow::{TaskContext, TaskError};
use garden_reconcile::{delete_all, reconcile};
use garden_store::ResourceKind;
use serde_json::json;

use crate::names::{
  DEPLOYMENT_NAME_KUBE_APISERVER, DEPLOYMENT_NAME_KUBE_CONTROLLER_MANAGER,
  KUBE_APISERVER_WATCHED_CHECKSUMS, LABEL_KEY_APP, LABEL_KEY_COMPONENT, LABEL_VALUE_ALLOWED,
  PREFIX, SERVICE_NAME_KUBE_APISERVER, etcd_client_service,
};
use crate::operation::{RunContext, labels};

const DEFAULT_EVENT_TTL: &str = "24h";

/// Egress the kube-apiserver pods are allowed by network policy.
const NETWORK_POLICY_TARGETS: &[&str] = &[
  "dns",
  "etcd",
  "gardener-apiserver",
  "gardener-admission-controller",
  "identity",
  "ingress",
  "world",
];

pub(crate) async fn deploy(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  let op = &ctx.state;
  let api = op.imports.kube_api_server();

  ctx.check_cancelled()?;
  let annotations = op.stamp_checksums(KUBE_APISERVER_WATCHED_CHECKSUMS);
  let command = kube_apiserver_command(&op.namespace, &api);

  let mut pod_labels = labels("kube-apiserver");
  for target in NETWORK_POLICY_TARGETS {
    pod_labels.insert(
      format!("networking.gardener.cloud/to-{target}"),
      LABEL_VALUE_ALLOWED.to_string(),
    );
  }

  let id = op.identity(ResourceKind::Deployment, DEPLOYMENT_NAME_KUBE_APISERVER);
  reconcile(op.store.as_ref(), &id, |deployment| {
    deployment.labels.extend(labels("kube-apiserver"));
    deployment.spec = json!({
      "replicas": api.replicas,
      "revisionHistoryLimit": 0,
      "selector": { "matchLabels": labels("kube-apiserver") },
      "template": {
        "metadata": { "annotations": annotations, "labels": pod_labels },
        "spec": {
          "serviceAccountName": SERVICE_NAME_KUBE_APISERVER,
          "priorityClassName": op.imports.virtual_garden.priority_class_name,
          "affinity": {
            "podAntiAffinity": {
              "preferredDuringSchedulingIgnoredDuringExecution": [{
                "weight": 100,
                "podAffinityTerm": {
                  "topologyKey": "kubernetes.io/hostname",
                  "labelSelector": {
                    "matchLabels": { LABEL_KEY_APP: PREFIX, LABEL_KEY_COMPONENT: "kube-apiserver" },
                  },
                },
              }],
            },
          },
          "containers": [{
            "name": "kube-apiserver",
            "command": command,
            "ports": [{ "name": "https", "containerPort": 443, "protocol": "TCP" }],
            "resources": {
              "limits": { "cpu": "2", "memory": "2000Mi" },
              "requests": { "cpu": "600m", "memory": "512Mi" },
            },
          }],
          "terminationGracePeriodSeconds": 30,
        },
      },
    });
    Ok(())
  })
  .await
  .map_err(TaskError::failed)?;

  ctx.check_cancelled()?;
  let id = op.identity(ResourceKind::Deployment, DEPLOYMENT_NAME_KUBE_CONTROLLER_MANAGER);
  reconcile(op.store.as_ref(), &id, |deployment| {
    deployment.labels.extend(labels("kube-controller-manager"));
    deployment.spec = json!({
      "replicas": 1,
      "revisionHistoryLimit": 0,
      "selector": { "matchLabels": labels("kube-controller-manager") },
      "template": {
        "metadata": { "labels": labels("kube-controller-manager") },
        "spec": {
          "priorityClassName": op.imports.virtual_garden.priority_class_name,
          "containers": [{
            "name": "kube-controller-manager",
            "command": kube_controller_manager_command(),
          }],
        },
      },
    });
    Ok(())
  })
  .await
  .map_err(TaskError::failed)?;
  Ok(())
}

pub(crate) async fn delete(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;
  delete_all(
    op.store.as_ref(),
    &[
      op.identity(ResourceKind::Deployment, DEPLOYMENT_NAME_KUBE_APISERVER),
      op.identity(ResourceKind::Deployment, DEPLOYMENT_NAME_KUBE_CONTROLLER_MANAGER),
    ],
  )
  .await
  .map_err(TaskError::failed)
}

/// Command line of the kube-apiserver container.
pub(crate) fn kube_apiserver_command(namespace: &str, api: &KubeApiServer) -> Vec<String> {
  let mut command = vec!["/usr/local/bin/kube-apiserver".to_string()];
  let mut flag = |f: String| command.push(f);

  if api.gardener_controlplane.any_webhook_enabled() {
    flag(
      "--admission-control-config-file=/etc/gardener-apiserver/admission/configuration.yaml".into(),
    );
  }
  flag("--allow-privileged=true".into());
  flag("--anonymous-auth=false".into());
  flag("--audit-policy-file=/etc/kube-apiserver/audit/audit-policy.yaml".into());
  if !api.audit_webhook_batch_max_size.is_empty() {
    flag(format!(
      "--audit-webhook-batch-max-size={}",
      api.audit_webhook_batch_max_size
    ));
  }
  if !api.audit_webhook_config.config.is_empty() {
    flag(
      "--audit-webhook-config-file=/etc/kube-apiserver/auditwebhook/audit-webhook-config.yaml"
        .into(),
    );
  }
  flag("--authorization-mode=RBAC".into());
  flag("--basic-auth-file=/srv/kubernetes/auth/basic_auth.csv".into());
  flag("--client-ca-file=/srv/kubernetes/ca/ca.crt".into());
  flag("--enable-aggregator-routing=true".into());
  flag("--enable-bootstrap-token-auth=true".into());
  flag("--encryption-provider-config=/etc/kube-apiserver/encryption/encryption-config.yaml".into());
  flag(format!(
    "--etcd-servers=https://{}.{namespace}.svc:2379",
    etcd_client_service("main")
  ));
  flag(format!(
    "--etcd-servers-overrides=/events#https://{events}.{namespace}.svc:2379,coordination.k8s.io/leases#https://{events}.{namespace}.svc:2379",
    events = etcd_client_service("events")
  ));
  flag(format!(
    "--event-ttl={}",
    api.event_ttl.as_deref().unwrap_or(DEFAULT_EVENT_TTL)
  ));
  if let Some(issuer) = &api.oidc_issuer_url {
    flag("--oidc-client-id=kube-kubectl".into());
    flag("--oidc-groups-claim=groups".into());
    flag(format!("--oidc-issuer-url={issuer}"));
    flag("--oidc-username-claim=email".into());
  }
  flag("--secure-port=443".into());
  flag(format!(
    "--service-account-issuer=https://gardener.{}",
    api.dns_access_domain
  ));
  flag("--service-cluster-ip-range=100.64.0.0/13".into());
  flag("--tls-cert-file=/srv/kubernetes/apiserver/tls.crt".into());
  flag("--tls-private-key-file=/srv/kubernetes/apiserver/tls.key".into());
  if let Some(sni) = api.exposure.as_ref().and_then(|e| e.sni.as_ref()) {
    flag(format!(
      "--tls-sni-cert-key=/srv/kubernetes/sni-tls/tls.crt,/srv/kubernetes/sni-tls/tls.key:{}",
      sni.hostnames.join(",")
    ));
  }
  flag("--v=2".into());

  command
}

fn kube_controller_manager_command() -> Vec<&'static str> {
  vec![
    "/usr/local/bin/kube-controller-manager",
    "--controllers=namespace,serviceaccount,serviceaccount-token,clusterrole-aggregation,garbagecollector,csrapproving,csrcleaner,csrsigning,bootstrapsigner,tokencleaner,resourcequota",
    "--kubeconfig=/srv/kubernetes/controller-manager/kubeconfig",
    "--use-service-account-credentials=true",
    "--v=2",
  ]
}
