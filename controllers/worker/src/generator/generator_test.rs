//! Unit tests for WorkerDelegate

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crds::{MachineImage, WorkerStatus};
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use seed_client::MockSeedClient;
    use tokio_util::sync::CancellationToken;

    use crate::error::ErrorKind;
    use crate::generator::WorkerDelegate;
    use crate::generator::machine_class::USER_DATA_KEY;
    use crate::generator::pool_hash::{POOL_HASH_LENGTH, PoolHashPolicy};
    use crate::test_utils::*;

    const ZONES: [&str; 3] = ["z1", "z2", "z3"];

    #[tokio::test]
    async fn test_pool_bounds_are_split_over_zones() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        let deployments = delegate.generate_machine_deployments(&cancel).await.unwrap();
        assert_eq!(deployments.len(), 3);

        let names: Vec<&str> = deployments.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "shoot--foo--bar-worker1-z1",
                "shoot--foo--bar-worker1-z2",
                "shoot--foo--bar-worker1-z3",
            ]
        );

        for deployment in deployments {
            assert_eq!(deployment.minimum, 1);
            assert_eq!(deployment.maximum, 2);
            // 50% of maximum 6 = 3, one per zone
            assert_eq!(deployment.max_surge, 1);
            assert_eq!(deployment.secret_name, deployment.class_name);
            let hash = deployment
                .class_name
                .strip_prefix(&format!("{}-", deployment.name))
                .unwrap();
            assert_eq!(hash.len(), POOL_HASH_LENGTH);
        }

        let unavailable: Vec<i32> = deployments.iter().map(|d| d.max_unavailable).collect();
        assert_eq!(unavailable, vec![1, 0, 0]);
    }

    #[tokio::test]
    async fn test_machine_classes_carry_zone_and_machine_facts() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        let classes = delegate.machine_classes(&cancel).await.unwrap();
        assert_eq!(classes.len(), 3);

        let class = &classes[1];
        assert_eq!(class.region, "eu-1");
        assert_eq!(class.datacenter, "dc1");
        assert_eq!(class.network, "shoot--foo--bar-segment");
        assert_eq!(class.ssh_keys, vec![SSH_KEY.to_string()]);
        assert_eq!(class.template_vm, "gardener/templates/flatcar-3139.2.3");
        assert_eq!(class.guest_id.as_deref(), Some("coreos64Guest"));
        assert_eq!(class.folder.as_deref(), Some("gardener"));
        assert_eq!(class.compute_cluster.as_deref(), Some("cluster-2"));
        assert_eq!(class.num_cpus, 2);
        assert_eq!(class.memory, 4096);
        assert_eq!(class.system_disk.size, 20);
        assert!(class.host_system.is_none());
        assert_eq!(
            class.secret.get(USER_DATA_KEY).map(String::as_str),
            Some("#!/bin/bash\necho hello")
        );
        assert_eq!(
            class.secret.get("vsphereHost").map(String::as_str),
            Some("vcenter.eu-1.example.com")
        );
        assert_eq!(class.secret.get("vsphereUsername").map(String::as_str), Some("admin"));
    }

    #[tokio::test]
    async fn test_machine_images_are_deduplicated() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();

        let mut ubuntu = worker_pool("worker3", &["z1"]);
        ubuntu.machine_image.name = "ubuntu".to_string();
        ubuntu.machine_image.version = "22.04".to_string();
        let pools = vec![worker_pool("worker1", &["z1"]), worker_pool("worker2", &["z2"]), ubuntu];
        let worker = worker(pools, &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);

        let images = delegate.machine_images(&CancellationToken::new()).await.unwrap();
        let pairs: Vec<(&str, &str)> = images
            .iter()
            .map(|image| (image.name.as_str(), image.version.as_str()))
            .collect();
        assert_eq!(pairs, vec![("flatcar", "3139.2.3"), ("ubuntu", "22.04")]);
    }

    #[tokio::test]
    async fn test_missing_zone_config_fails_whole_generation() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let pools = vec![worker_pool("pool-a", &ZONES), worker_pool("pool-b", &["z1"])];
        let worker = worker(pools, &["z1", "z2"]);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        let err = delegate.generate_machine_deployments(&cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("z3"));

        let err = delegate.deploy_machine_classes(&cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(client.applied().is_empty());
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES), worker_pool("worker2", &["z2"])], &ZONES);
        let cancel = CancellationToken::new();

        let first = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let second = WorkerDelegate::new(&client, &worker, &profile, &policy);

        assert_eq!(
            first.generate_machine_deployments(&cancel).await.unwrap(),
            second.generate_machine_deployments(&cancel).await.unwrap()
        );
        assert_eq!(
            first.machine_classes(&cancel).await.unwrap(),
            second.machine_classes(&cancel).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_generation_is_memoized() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        delegate.generate_machine_deployments(&cancel).await.unwrap();
        delegate.generate_machine_deployments(&cancel).await.unwrap();
        delegate.machine_images(&cancel).await.unwrap();
        delegate.deploy_machine_classes(&cancel).await.unwrap();

        assert_eq!(client.credential_calls(), 1);
        assert_eq!(client.infrastructure_calls(), 1);

        // A new reconciliation starts from scratch
        let next = WorkerDelegate::new(&client, &worker, &profile, &policy);
        next.generate_machine_deployments(&cancel).await.unwrap();
        assert_eq!(client.credential_calls(), 2);
    }

    #[tokio::test]
    async fn test_deploy_machine_classes_applies_every_class() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        delegate.deploy_machine_classes(&cancel).await.unwrap();

        let applied = client.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].namespace, NAMESPACE);
        assert_eq!(applied[0].machine_classes.len(), 3);

        let class = &applied[0].machine_classes[0];
        let deployments = delegate.generate_machine_deployments(&cancel).await.unwrap();
        assert_eq!(class["name"], serde_json::json!(deployments[0].class_name));
        assert_eq!(class["numCpus"], serde_json::json!(2));
        assert_eq!(class["systemDisk"], serde_json::json!({"size": 20}));
        assert_eq!(class["secret"]["vsphereInsecureSSL"], serde_json::json!("true"));
        assert!(class.get("hostSystem").is_none());
    }

    #[tokio::test]
    async fn test_apply_failure_is_upstream_failure() {
        let client = mock_seed_client();
        client.fail_apply_with("conflict");
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);

        let err = delegate
            .deploy_machine_classes(&CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
    }

    #[tokio::test]
    async fn test_cancelled_before_lookup() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = delegate.generate_machine_deployments(&cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(client.credential_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_lookup() {
        let client = mock_seed_client();
        client.set_fetch_delay(Duration::from_secs(30));
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = delegate.deploy_machine_classes(&cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(client.applied().is_empty());
    }

    #[tokio::test]
    async fn test_missing_segment_and_ssh_key() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let cancel = CancellationToken::new();

        let mut no_segment = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        if let Some(status) = no_segment.spec.infrastructure_provider_status.as_mut() {
            status.as_object_mut().unwrap().remove("nsxtInfraState");
        }
        let err = WorkerDelegate::new(&client, &no_segment, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingConfiguration);

        let mut no_key = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        no_key.spec.ssh_public_key.0.clear();
        let err = WorkerDelegate::new(&client, &no_key, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingConfiguration);
    }

    #[tokio::test]
    async fn test_upstream_lookup_failures() {
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let cancel = CancellationToken::new();
        let worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);

        let no_secret = MockSeedClient::new();
        let err = WorkerDelegate::new(&no_secret, &worker, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);

        let client = mock_seed_client();
        let mut no_status = worker.clone();
        no_status.spec.infrastructure_provider_status = None;
        let err = WorkerDelegate::new(&client, &no_status, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);

        let mut unknown_region = worker.clone();
        unknown_region.spec.region = "us-1".to_string();
        let err = WorkerDelegate::new(&client, &unknown_region, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_machine_type_and_percentage() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let cancel = CancellationToken::new();

        let mut tiny = worker_pool("worker1", &ZONES);
        tiny.machine_type = "tiny-disk".to_string();
        let worker_a = worker(vec![tiny], &ZONES);
        let err = WorkerDelegate::new(&client, &worker_a, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let mut unknown = worker_pool("worker1", &ZONES);
        unknown.machine_type = "huge".to_string();
        let worker_b = worker(vec![unknown], &ZONES);
        let err = WorkerDelegate::new(&client, &worker_b, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut bad_surge = worker_pool("worker1", &ZONES);
        bad_surge.max_surge = IntOrString::String("lots".to_string());
        let worker_c = worker(vec![bad_surge], &ZONES);
        let err = WorkerDelegate::new(&client, &worker_c, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[tokio::test]
    async fn test_image_version_changes_class_name_only() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let cancel = CancellationToken::new();

        let current = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        let mut pool = worker_pool("worker1", &ZONES);
        pool.machine_image.version = "3227.2.0".to_string();
        let upgraded = worker(vec![pool], &ZONES);

        let before = WorkerDelegate::new(&client, &current, &profile, &policy);
        let after = WorkerDelegate::new(&client, &upgraded, &profile, &policy);
        let before = before.generate_machine_deployments(&cancel).await.unwrap();
        let after = after.generate_machine_deployments(&cancel).await.unwrap();

        for (old, new) in before.iter().zip(after) {
            assert_eq!(old.name, new.name);
            assert_ne!(old.class_name, new.class_name);
        }
    }

    #[tokio::test]
    async fn test_image_dropped_from_profile_is_taken_from_status() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();

        let mut pool = worker_pool("worker1", &["z1"]);
        pool.machine_image.version = "2905.2.6".to_string();
        let mut worker = worker(vec![pool], &ZONES);
        worker.status = Some(WorkerStatus {
            machine_images: vec![MachineImage {
                name: "flatcar".to_string(),
                version: "2905.2.6".to_string(),
                path: "gardener/templates/flatcar-2905.2.6".to_string(),
                guest_id: None,
            }],
            ..Default::default()
        });
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        let classes = delegate.machine_classes(&cancel).await.unwrap();
        assert_eq!(classes[0].template_vm, "gardener/templates/flatcar-2905.2.6");
        assert!(classes[0].guest_id.is_none());

        worker.status = None;
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let err = delegate.machine_classes(&cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_class_region_comes_from_infrastructure_status() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let mut worker = worker(vec![worker_pool("worker1", &ZONES)], &ZONES);
        if let Some(status) = worker.spec.infrastructure_provider_status.as_mut() {
            status["vsphereConfig"]["region"] = serde_json::json!("infra-region");
        }
        let delegate = WorkerDelegate::new(&client, &worker, &profile, &policy);
        let cancel = CancellationToken::new();

        let classes = delegate.machine_classes(&cancel).await.unwrap();
        assert!(classes.iter().all(|class| class.region == "infra-region"));
        // credentials still follow the worker region of the cloud profile
        assert_eq!(
            classes[0].secret.get("vsphereHost").map(String::as_str),
            Some("vcenter.eu-1.example.com")
        );
    }

    #[tokio::test]
    async fn test_negative_pool_bounds_are_rejected() {
        let client = mock_seed_client();
        let profile = cluster_profile();
        let policy = PoolHashPolicy::default();
        let cancel = CancellationToken::new();

        let mut negative_min = worker_pool("worker1", &ZONES);
        negative_min.minimum = -1;
        let worker_a = worker(vec![negative_min], &ZONES);
        let err = WorkerDelegate::new(&client, &worker_a, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let mut negative_surge = worker_pool("worker1", &ZONES);
        negative_surge.max_surge = IntOrString::Int(-2);
        let worker_b = worker(vec![negative_surge], &ZONES);
        let err = WorkerDelegate::new(&client, &worker_b, &profile, &policy)
            .generate_machine_deployments(&cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(client.applied().is_empty());
    }
}
