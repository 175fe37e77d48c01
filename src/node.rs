// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    cache::{ArtifactCache, LocalCache},
    exec::{CommandRunner, SystemRunner},
    host::{HostProbe, SystemProbe},
    layout::HostLayout,
    systemd::ServiceManager,
    template::TemplateRenderer,
};

/// The machine being bootstrapped: where its files live and how to act on it.
///
/// Every engine operation goes through a `Node`, so a test can substitute a simulated host for
/// the real one.
pub struct Node {
    pub layout: HostLayout,
    pub runner: Box<dyn CommandRunner>,
    pub probe: Box<dyn HostProbe>,
    pub cache: Box<dyn ArtifactCache>,
    pub renderer: TemplateRenderer,
}

impl Node {
    /// The local machine, with its filesystem rooted at `layout`.
    pub fn system(layout: HostLayout) -> Self {
        Node {
            layout,
            runner: Box::new(SystemRunner),
            probe: Box::new(SystemProbe::default()),
            cache: Box::new(LocalCache),
            renderer: TemplateRenderer::new(),
        }
    }

    pub fn services(&self) -> ServiceManager<'_> {
        ServiceManager::new(self.runner.as_ref())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("layout", &self.layout).finish()
    }
}
