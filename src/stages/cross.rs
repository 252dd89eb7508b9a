//! `cross` step: federate the two clusters.
//!
//! Creates the shared principal on both sides, registers each cluster as a
//! DREMIO source in the other, then creates a smoke-test VDS over the peer.
//! An entity that already exists (HTTP 409) counts as done.

use super::StageContext;
use crate::client::{EntityOutcome, JobClient};
use crate::config::{ClusterSettings, CrossClusterSettings};
use crate::constants::{CLUSTER_A, CLUSTER_B};
use crate::error::Result;
use crate::pipeline::{PipelineStep, StepResult};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info};

pub const SMOKE_VDS: &str = "cross_cluster_test";

/// Source name under which `cluster` is registered on its peer.
pub fn source_name(cluster: &str) -> &'static str {
    if cluster == CLUSTER_A {
        "DremioA"
    } else {
        "DremioB"
    }
}

pub fn user_payload(settings: &CrossClusterSettings) -> Value {
    json!({
        "userName": settings.user,
        "firstName": settings.first_name,
        "lastName": settings.last_name,
        "email": settings.email,
        "password": settings.password,
    })
}

/// Catalog payload registering `peer` as a source.
pub fn source_payload(name: &str, peer: &ClusterSettings, settings: &CrossClusterSettings) -> Value {
    json!({
        "entityType": "source",
        "name": name,
        "type": "DREMIO",
        "config": {
            "hostname": peer.host,
            "port": peer.port,
            "authenticationType": "BASIC",
            "username": settings.user,
            "password": settings.password,
            "enableSSL": peer.ssl,
        }
    })
}

pub fn smoke_vds_sql(peer_source: &str) -> String {
    format!(
        "CREATE VDS IF NOT EXISTS {} AS SELECT * FROM {}.hdfs.tpcds_1gb_parquet.customer LIMIT 10",
        SMOKE_VDS, peer_source
    )
}

async fn create(client: &JobClient, path: &str, body: &Value, what: &str) -> bool {
    match client.create_entity(path, body).await {
        Ok(EntityOutcome::Created(_)) => {
            info!("Created {} on {}", what, client.endpoint());
            true
        }
        Ok(EntityOutcome::AlreadyExists) => {
            info!("{} already exists on {}", what, client.endpoint());
            true
        }
        Err(e) => {
            error!("Failed to create {} on {}: {}", what, client.endpoint(), e);
            false
        }
    }
}

/// Provision one side: user, peer source, smoke VDS.
pub async fn provision(
    client: &JobClient,
    peer: &ClusterSettings,
    settings: &CrossClusterSettings,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let peer_source = source_name(&peer.name);
    let user_ok = create(client, "/user", &user_payload(settings), &format!("user {}", settings.user)).await;
    let source_ok = create(
        client,
        "/catalog",
        &source_payload(peer_source, peer, settings),
        &format!("source {}", peer_source),
    )
    .await;

    let vds_ok = match client.execute(&smoke_vds_sql(peer_source), timeout, interval).await {
        Ok(status) if status.is_success() => true,
        Ok(status) => {
            error!(
                "Smoke VDS on {} ended as {}: {}",
                client.endpoint(),
                status.state,
                status.error_message.as_deref().unwrap_or("")
            );
            false
        }
        Err(e) => {
            error!("Smoke VDS on {} failed: {}", client.endpoint(), e);
            false
        }
    };

    user_ok && source_ok && vds_ok
}

pub async fn run(ctx: &StageContext<'_>) -> Result<StepResult> {
    let settings = CrossClusterSettings::from_config(ctx.config);
    let a = ClusterSettings::from_config(ctx.config, CLUSTER_A);
    let b = ClusterSettings::from_config(ctx.config, CLUSTER_B);

    let mut failed = Vec::new();
    for (own, peer) in [(&a, &b), (&b, &a)] {
        info!("Configuring {} as a source in {}", source_name(&peer.name), own.name);
        let ok = match ctx.connect(&own.name).await {
            Ok(client) => {
                provision(
                    &client,
                    peer,
                    &settings,
                    ctx.pipeline.ddl_timeout,
                    ctx.pipeline.poll_interval,
                )
                .await
            }
            Err(e) => {
                error!("Could not connect to {}: {}", own.name, e);
                false
            }
        };
        if !ok {
            failed.push(own.name.clone());
        }
    }

    if failed.is_empty() {
        Ok(StepResult::succeeded(
            PipelineStep::Cross,
            "Cross-cluster federation configured on both clusters",
        ))
    } else {
        Ok(StepResult::failed(
            PipelineStep::Cross,
            format!("Cross-cluster setup failed on {}", failed.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_payload_points_at_peer() {
        let peer = ClusterSettings {
            name: CLUSTER_B.into(),
            host: "b.example.com".into(),
            port: 9047,
            username: "admin".into(),
            password: "x".into(),
            ssl: false,
        };
        let settings = CrossClusterSettings {
            user: "cross_cluster".into(),
            password: "pw".into(),
            first_name: "Cross".into(),
            last_name: "Cluster".into(),
            email: "cross.cluster@example.com".into(),
        };
        let payload = source_payload(source_name(&peer.name), &peer, &settings);
        assert_eq!(payload["name"], "DremioB");
        assert_eq!(payload["type"], "DREMIO");
        assert_eq!(payload["config"]["hostname"], "b.example.com");
        assert_eq!(payload["config"]["enableSSL"], false);
        assert_eq!(user_payload(&settings)["userName"], "cross_cluster");
        assert!(smoke_vds_sql("DremioB").contains("FROM DremioB.hdfs.tpcds_1gb_parquet.customer"));
    }
}
