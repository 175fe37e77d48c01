// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::{required_artifacts, ArtifactCache};
use crate::constants::*;
use crate::error::{Error, IoContext, Result};
use crate::exec::{Cmd, CmdOutput, CommandRunner};
use crate::host::HostProbe;
use crate::layout::HostLayout;
use crate::node::Node;
use crate::template::TemplateRenderer;

/// Given a relative `path` in the test directory, prepend the
/// full path to the test directory.
fn test_path(path: &str) -> String {
    std::env::var("CARGO_MANIFEST_DIR").unwrap() + "/tests/" + path
}

trait IgnoreEexist {
    fn ignore_eexist(self) -> Self;
}

impl IgnoreEexist for io::Result<()> {
    fn ignore_eexist(self) -> Self {
        match self {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// A TestEnvironment holds all the information needed to access a test's runtime state. Each test
/// gets a "private" working directory; the simulated node's filesystem root lives inside it.
///
/// All access to the test's state on the filesystem should be done via methods on TestEnvironment
/// rather than coded in the tests themselves.
pub struct TestEnvironment {
    /// The path to this test's private working directory.
    private_dir_path: PathBuf,
}

impl TestEnvironment {
    /// Set up an environment for a test named `test_id`.
    ///
    /// The test's private directory is emptied first, so that files from a previous test run don't
    /// impact this run. Test ids must be unique across the whole crate.
    pub fn new(test_id: &str) -> Self {
        let private_dir_path = PathBuf::from(test_path(&format!("test_output/{test_id}")));
        match fs::remove_dir_all(&private_dir_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => panic!("Could not clean up test directory: {e}"),
        };

        fs::create_dir(test_path("test_output"))
            .ignore_eexist()
            .unwrap();
        fs::create_dir(&private_dir_path).unwrap();

        Self { private_dir_path }
    }

    /// A path inside the test's private directory.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.private_dir_path.join(rel)
    }

    /// The simulated node's filesystem.
    pub fn layout(&self) -> HostLayout {
        HostLayout::new(self.path("root"))
    }

    /// Write `contents` to `rel` in the private directory and return its path. Used for config
    /// files handed to init and join.
    pub fn write_file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// Build a node over this environment's layout that runs its commands against `host`, with a
    /// pre-seeded artifact cache.
    pub fn node(&self, host: &Arc<SimulatedHost>, probe: &Arc<FakeProbe>) -> Node {
        Node {
            layout: self.layout(),
            runner: Box::new(Arc::clone(host)),
            probe: Box::new(Arc::clone(probe)),
            cache: Box::new(StaticCache),
            renderer: TemplateRenderer::new(),
        }
    }
}

#[derive(Debug, Default)]
struct HostState {
    active: BTreeSet<String>,
    enabled: BTreeSet<String>,
    log: Vec<Cmd>,
    failures: Vec<(String, String)>,
}

/// A stand-in for the machine's command line tools.
///
/// systemctl is simulated against an in-memory table of units, `tar -C <dir>` drops a few fake
/// plugin binaries into `<dir>`, and every other command succeeds without doing anything. All
/// commands are recorded in order.
#[derive(Debug, Default)]
pub struct SimulatedHost {
    state: Mutex<HostState>,
}

/// The files a simulated `tar` extraction of the CNI archive produces.
pub const SIMULATED_CNI_PLUGINS: [&str; 4] = ["bridge", "flannel", "host-local", "loopback"];

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unit(&self, service: &str, active: bool, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        set_member(&mut state.active, service, active);
        set_member(&mut state.enabled, service, enabled);
    }

    /// `(active, enabled)` for `service`.
    pub fn unit(&self, service: &str) -> (bool, bool) {
        let state = self.state.lock().unwrap();
        (
            state.active.contains(service),
            state.enabled.contains(service),
        )
    }

    /// Make any invocation of `program` whose arguments include `arg` exit non-zero.
    pub fn fail_program_arg(&self, program: &str, arg: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((program.to_string(), arg.to_string()));
    }

    /// Every command run so far, as full command lines.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .map(|cmd| cmd.to_string())
            .collect()
    }

    /// Commands run so far whose program is named `program`.
    pub fn commands_of(&self, program: &str) -> Vec<Cmd> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|cmd| cmd.program_name() == program)
            .cloned()
            .collect()
    }

    /// The systemctl invocations that changed unit state, in order.
    pub fn state_changes(&self) -> Vec<String> {
        self.commands_of("systemctl")
            .into_iter()
            .filter(|cmd| {
                matches!(
                    cmd.args.first().map(String::as_str),
                    Some("start" | "stop" | "enable" | "disable")
                )
            })
            .map(|cmd| cmd.to_string())
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    fn systemctl(state: &mut HostState, args: &[String]) -> CmdOutput {
        let service = args.last().cloned().unwrap_or_default();
        match args.first().map(String::as_str) {
            Some("is-active") => CmdOutput::with_code(if state.active.contains(&service) { 0 } else { 3 }),
            Some("is-enabled") => CmdOutput::with_code(if state.enabled.contains(&service) { 0 } else { 1 }),
            Some("start") => {
                state.active.insert(service);
                CmdOutput::with_code(0)
            }
            Some("stop") => {
                state.active.remove(&service);
                CmdOutput::with_code(0)
            }
            Some("enable") => {
                state.enabled.insert(service);
                CmdOutput::with_code(0)
            }
            Some("disable") => {
                state.enabled.remove(&service);
                CmdOutput::with_code(0)
            }
            _ => CmdOutput::with_code(0),
        }
    }

    fn tar(args: &[String]) -> Result<CmdOutput> {
        let Some(pos) = args.iter().position(|arg| arg == "-C") else {
            return Ok(CmdOutput::with_code(0));
        };
        let Some(dir) = args.get(pos + 1) else {
            return Ok(CmdOutput::with_code(2));
        };
        for plugin in SIMULATED_CNI_PLUGINS {
            let path = Path::new(dir).join(plugin);
            fs::write(&path, "#!/bin/sh\n").with_path("write", &path)?;
        }
        Ok(CmdOutput::with_code(0))
    }
}

fn set_member(set: &mut BTreeSet<String>, service: &str, present: bool) {
    if present {
        set.insert(service.to_string());
    } else {
        set.remove(service);
    }
}

impl CommandRunner for SimulatedHost {
    fn output(&self, cmd: &Cmd) -> Result<CmdOutput> {
        let mut state = self.state.lock().unwrap();
        state.log.push(cmd.clone());

        let program = cmd.program_name().to_string();
        let fails = state
            .failures
            .iter()
            .any(|(p, a)| *p == program && cmd.args.contains(a));
        if fails {
            return Ok(CmdOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("simulated failure of {program}"),
            });
        }

        match program.as_str() {
            "systemctl" => Ok(Self::systemctl(&mut state, &cmd.args)),
            "tar" => Self::tar(&cmd.args),
            "ip" => Ok(CmdOutput::with_stdout(
                "default via 10.0.0.1 dev eth0 proto dhcp metric 100\n",
            )),
            _ => Ok(CmdOutput::with_code(0)),
        }
    }
}

impl CommandRunner for Arc<SimulatedHost> {
    fn output(&self, cmd: &Cmd) -> Result<CmdOutput> {
        self.as_ref().output(cmd)
    }
}

/// A host whose hostname and default route are fixed up front. Counts how often the routing
/// table is consulted.
#[derive(Debug, Default)]
pub struct FakeProbe {
    hostname: Option<String>,
    route: Option<(String, IpAddr)>,
    route_queries: AtomicUsize,
    address_queries: AtomicUsize,
}

impl FakeProbe {
    pub fn new(hostname: &str, interface: &str, address: &str) -> Self {
        FakeProbe {
            hostname: Some(hostname.to_string()),
            route: Some((interface.to_string(), address.parse().unwrap())),
            ..Default::default()
        }
    }

    /// A host whose hostname cannot be read.
    pub fn without_hostname() -> Self {
        FakeProbe {
            route: Some(("eth0".to_string(), "10.0.0.5".parse().unwrap())),
            ..Default::default()
        }
    }

    /// A host with no default route.
    pub fn without_route(hostname: &str) -> Self {
        FakeProbe {
            hostname: Some(hostname.to_string()),
            ..Default::default()
        }
    }

    pub fn route_queries(&self) -> usize {
        self.route_queries.load(Ordering::SeqCst)
    }

    pub fn address_queries(&self) -> usize {
        self.address_queries.load(Ordering::SeqCst)
    }
}

impl HostProbe for FakeProbe {
    fn hostname(&self) -> Result<String> {
        self.hostname
            .clone()
            .ok_or_else(|| Error::Hostname("hostname unavailable".to_string()))
    }

    fn default_route_interface(&self) -> Result<String> {
        self.route_queries.fetch_add(1, Ordering::SeqCst);
        self.route
            .as_ref()
            .map(|(interface, _)| interface.clone())
            .ok_or_else(|| Error::DefaultRoute("no default route in routing table".to_string()))
    }

    fn interface_address(&self, interface: &str) -> Result<IpAddr> {
        self.address_queries.fetch_add(1, Ordering::SeqCst);
        match &self.route {
            Some((name, address)) if name == interface => Ok(*address),
            _ => Err(Error::InterfaceAddress {
                interface: interface.to_string(),
                reason: "no usable IPv4 address".to_string(),
            }),
        }
    }
}

impl HostProbe for Arc<FakeProbe> {
    fn hostname(&self) -> Result<String> {
        self.as_ref().hostname()
    }

    fn default_route_interface(&self) -> Result<String> {
        self.as_ref().default_route_interface()
    }

    fn interface_address(&self, interface: &str) -> Result<IpAddr> {
        self.as_ref().interface_address(interface)
    }
}

/// Contents written for each cached artifact, keyed by file name. Anything not listed gets a
/// placeholder.
fn artifact_contents() -> BTreeMap<&'static str, String> {
    BTreeMap::from([
        (
            KUBELET_SERVICE,
            "[Service]\nExecStart=/usr/bin/kubelet\nRestart=always\n".to_string(),
        ),
        (
            KUBEADM_KUBELET_DROPIN,
            "[Service]\nExecStart=\nExecStart=/usr/bin/kubelet $KUBELET_KUBECONFIG_ARGS $KUBELET_EXTRA_ARGS\n"
                .to_string(),
        ),
        (
            FLANNEL_MANIFEST,
            "apiVersion: extensions/v1beta1\nkind: DaemonSet\nmetadata:\n  name: kube-flannel-ds\n"
                .to_string(),
        ),
    ])
}

/// An artifact cache that writes every required artifact into the layout, as if it had just
/// been downloaded.
#[derive(Debug, Default)]
pub struct StaticCache;

impl ArtifactCache for StaticCache {
    fn populate(&self, layout: &HostLayout) -> Result<()> {
        let contents = artifact_contents();
        for path in required_artifacts(layout) {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let data = contents
                .get(name.as_str())
                .cloned()
                .unwrap_or_else(|| format!("{name}\n"));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_path("create directory", parent)?;
            }
            fs::write(&path, data).with_path("write", &path)?;
        }
        Ok(())
    }
}
