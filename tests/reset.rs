// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nodeadm_lib::{
        commands::{init, reset},
        test_env::*,
    };

    #[test]
    fn reset_on_a_clean_node_succeeds() {
        let env = TestEnvironment::new("reset_clean");
        let host = Arc::new(SimulatedHost::new());
        let probe = Arc::new(FakeProbe::new("node-1", "eth0", "192.168.1.10"));
        let node = env.node(&host, &probe);

        reset::run(&node);

        assert!(host.commands_of("kubeadm").is_empty());
        for path in env.layout().reset_paths() {
            assert!(!path.exists());
        }
    }

    #[test]
    fn reset_after_init_removes_installed_files() {
        let env = TestEnvironment::new("reset_after_init");
        let host = Arc::new(SimulatedHost::new());
        let probe = Arc::new(FakeProbe::new("node-1", "eth0", "192.168.1.10"));
        let node = env.node(&host, &probe);
        let layout = env.layout();

        init::run(&node, None).unwrap();
        for path in layout.reset_paths() {
            assert!(path.exists(), "{} missing after init", path.display());
        }
        host.clear_log();

        reset::run(&node);

        let kubeadm = host.commands_of("kubeadm");
        assert_eq!(kubeadm.len(), 1);
        assert_eq!(kubeadm[0].args, vec!["reset"]);
        for path in layout.reset_paths() {
            assert!(!path.exists(), "{} left behind", path.display());
        }
        // The artifact cache survives so the node can be re-initialized offline.
        assert!(layout.cni_archive().exists());
    }

    #[test]
    fn reset_keeps_going_when_kubeadm_fails() {
        let env = TestEnvironment::new("reset_kubeadm_fails");
        let host = Arc::new(SimulatedHost::new());
        let probe = Arc::new(FakeProbe::new("node-1", "eth0", "192.168.1.10"));
        let node = env.node(&host, &probe);
        let layout = env.layout();

        init::run(&node, None).unwrap();
        host.fail_program_arg("kubeadm", "reset");

        reset::run(&node);

        assert!(!layout.install_root().exists());
        assert!(!layout.kubelet_unit().exists());
        assert!(!layout.cni_base_dir().exists());
    }
}
