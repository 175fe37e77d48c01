// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use nodeadm_lib::{commands::join, constants::*, error::Error, test_env::*};

    const JOIN_CONFIG: &str = r#"
nodeConfiguration:
  token: abcdef.0123456789abcdef
  discoveryTokenAPIServers:
    - 10.0.0.100:6443
  discoveryTokenUnsafeSkipCAVerification: true
networking:
  serviceSubnet: 10.100.0.0/16
  dnsDomain: corp.local
kubelet:
  maxPods: 50
"#;

    #[test]
    fn join_installs_worker_and_runs_kubeadm_join() {
        let env = TestEnvironment::new("join_worker");
        let host = Arc::new(SimulatedHost::new());
        let probe = Arc::new(FakeProbe::new("worker-1", "eth0", "192.168.1.20"));
        let node = env.node(&host, &probe);
        let cfg = env.write_file("join.yaml", JOIN_CONFIG);

        join::run(&node, Some(&cfg)).unwrap();
        let layout = env.layout();

        let yaml = fs::read_to_string(layout.kubeadm_config()).unwrap();
        assert!(yaml.contains("kind: NodeConfiguration"), "{yaml}");
        assert!(yaml.contains("10.0.0.100:6443"), "{yaml}");
        assert!(yaml.contains("name: worker-1"), "{yaml}");
        assert!(!yaml.contains("maxPods"), "{yaml}");

        let dropin =
            fs::read_to_string(layout.kubelet_dropin_dir().join(NODEADM_KUBELET_DROPIN)).unwrap();
        assert!(dropin.contains("--cluster-dns=10.100.0.10 "), "{dropin}");
        assert!(dropin.contains("--cluster-domain=corp.local "), "{dropin}");
        assert!(dropin.contains("--max-pods=50 "), "{dropin}");

        assert_eq!(host.unit(KUBELET_SERVICE), (true, true));
        let kubeadm = host.commands_of("kubeadm");
        assert_eq!(kubeadm.len(), 1);
        assert_eq!(
            kubeadm[0].args,
            vec![
                "join",
                "--ignore-preflight-errors=all",
                "--config=/var/lib/nodeadm/kubeadm.yaml"
            ]
        );

        // Workers have no VIP and never talk to the API themselves.
        assert!(!layout.keepalived_config().exists());
        assert!(host.commands_of("kubectl").is_empty());
    }

    #[test]
    fn join_requires_an_api_server() {
        let env = TestEnvironment::new("join_invalid");
        let host = Arc::new(SimulatedHost::new());
        let probe = Arc::new(FakeProbe::new("worker-1", "eth0", "192.168.1.20"));
        let node = env.node(&host, &probe);

        match join::run(&node, None) {
            Err(Error::Invalid(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "nodeConfiguration.discoveryTokenAPIServers");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(host.commands().is_empty());
        assert!(!env.layout().kubeadm_config().exists());
    }
}
