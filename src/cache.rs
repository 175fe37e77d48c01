// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::PathBuf;

use log::debug;

use crate::{
    constants::*,
    error::{Error, Result},
    layout::HostLayout,
};

/// The local store of release artifacts (binaries, unit files, the CNI tarball, manifests) that
/// the installation pipeline copies from.
pub trait ArtifactCache {
    /// Make sure every artifact needed for installation is present in the cache.
    fn populate(&self, layout: &HostLayout) -> Result<()>;
}

/// Everything the pipeline reads out of the cache.
pub fn required_artifacts(layout: &HostLayout) -> Vec<PathBuf> {
    let kube = layout.kube_cache_dir();
    let mut paths: Vec<PathBuf> = KUBE_BINARIES.iter().map(|bin| kube.join(bin)).collect();
    paths.push(kube.join(KUBELET_SERVICE));
    paths.push(kube.join(KUBEADM_KUBELET_DROPIN));
    paths.push(layout.cni_archive());
    paths.push(layout.flannel_manifest());
    paths
}

/// A cache that has been filled ahead of time (for example, baked into the machine image). It
/// cannot fetch anything, so populating only checks that nothing is missing.
#[derive(Debug, Default)]
pub struct LocalCache;

impl ArtifactCache for LocalCache {
    fn populate(&self, layout: &HostLayout) -> Result<()> {
        let missing: Vec<PathBuf> = required_artifacts(layout)
            .into_iter()
            .filter(|path| !path.is_file())
            .collect();
        if missing.is_empty() {
            debug!("artifact cache at {} is complete", layout.cache_dir().display());
            Ok(())
        } else {
            Err(Error::MissingArtifacts(missing))
        }
    }
}
