//! Device node discovery
//!
//! Finds the `xdma<N>_user` nodes the XDMA kernel driver creates, one per
//! card. Nothing is opened here.

use crate::error::{Result, XdmaError};
use crate::window::WindowOptions;
use std::path::{Path, PathBuf};
use xdma_chip::bar::{parse_user_node_name, DEV_DIR};

/// Discovered XDMA user nodes
#[derive(Debug, Default)]
pub struct DeviceManager {
    devices: Vec<DeviceInfo>,
}

/// One XDMA user node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Card index (the `N` in `xdmaN_user`)
    pub index: usize,

    /// Device node path
    pub path: PathBuf,
}

impl DeviceManager {
    /// Scan `/dev`
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if `/dev` cannot be listed.
    pub fn discover() -> Result<Self> {
        Self::discover_in(Path::new(DEV_DIR))
    }

    /// Scan `dir` for `xdma<N>_user` entries, sorted by card index
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if `dir` cannot be listed.
    pub fn discover_in(dir: &Path) -> Result<Self> {
        tracing::debug!("Scanning {} for XDMA user nodes", dir.display());

        let entries = std::fs::read_dir(dir).map_err(|e| XdmaError::device_unavailable(dir, e))?;

        let mut devices: Vec<DeviceInfo> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = parse_user_node_name(name.to_str()?)?;
                Some(DeviceInfo {
                    index,
                    path: entry.path(),
                })
            })
            .collect();
        devices.sort_by_key(|d| d.index);

        tracing::info!("Found {} XDMA user node(s)", devices.len());
        Ok(Self { devices })
    }

    /// Number of nodes found
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// All nodes found
    #[must_use]
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Node for card `index`
    #[must_use]
    pub fn device(&self, index: usize) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.index == index)
    }
}

impl DeviceInfo {
    /// Default window options for this node
    #[must_use]
    pub fn window_options(&self) -> WindowOptions {
        WindowOptions::new(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn finds_only_user_nodes_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "xdma1_user",
            "xdma0_user",
            "xdma0_h2c_0",
            "xdma0_c2h_0",
            "xdma0_control",
            "xdma10_user",
            "null",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }

        let mgr = DeviceManager::discover_in(dir.path()).unwrap();
        let indices: Vec<usize> = mgr.devices().iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![0, 1, 10]);
        assert_eq!(mgr.device_count(), 3);
        assert_eq!(
            mgr.device(1).unwrap().path,
            dir.path().join("xdma1_user")
        );
        assert!(mgr.device(2).is_none());
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = DeviceManager::discover_in(dir.path()).unwrap();
        assert_eq!(mgr.device_count(), 0);
    }

    #[test]
    fn missing_directory_is_device_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeviceManager::discover_in(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, XdmaError::DeviceUnavailable { .. }));
    }

    #[test]
    fn window_options_point_at_node() {
        let info = DeviceInfo {
            index: 0,
            path: PathBuf::from("/dev/xdma0_user"),
        };
        let opts = info.window_options();
        assert_eq!(opts.path, PathBuf::from("/dev/xdma0_user"));
        assert_eq!(opts.len, xdma_chip::bar::WINDOW_SIZE);
    }
}
