//! User BAR geometry and XDMA device node naming.
//!
//! The XDMA driver exposes the AXI-Lite slave behind BAR0 of the user
//! function as `/dev/xdma<N>_user`. Register access goes through `pread` /
//! `pwrite` at the register offset, or through `mmap` of the same node.
//!
//! ```text
//! Node               Size     Access
//! ────────────────── ──────── ──────────────────────────────────────
//! /dev/xdma0_user    4 KiB    32-bit AXI-Lite, offset-addressed or mmap
//! ```

/// Size of the AXI-Lite control window in bytes.
pub const WINDOW_SIZE: usize = 0x1000;

/// Device node prefix created by the XDMA kernel driver.
pub const NODE_PREFIX: &str = "xdma";

/// Device node suffix for the AXI-Lite user interface.
pub const USER_SUFFIX: &str = "_user";

/// Directory the XDMA driver populates.
pub const DEV_DIR: &str = "/dev";

/// Default device node for the first card.
pub const DEFAULT_USER_NODE: &str = "/dev/xdma0_user";

/// Device node name (without directory) for card `index`.
#[must_use]
pub fn user_node_name(index: usize) -> String {
    format!("{NODE_PREFIX}{index}{USER_SUFFIX}")
}

/// Parse the card index out of a node name such as `xdma3_user`.
#[must_use]
pub fn parse_user_node_name(name: &str) -> Option<usize> {
    name.strip_prefix(NODE_PREFIX)?
        .strip_suffix(USER_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_names_round_trip() {
        assert_eq!(user_node_name(0), "xdma0_user");
        assert_eq!(parse_user_node_name("xdma0_user"), Some(0));
        assert_eq!(parse_user_node_name("xdma12_user"), Some(12));
    }

    #[test]
    fn other_xdma_nodes_are_rejected() {
        assert_eq!(parse_user_node_name("xdma0_h2c_0"), None);
        assert_eq!(parse_user_node_name("xdma0_control"), None);
        assert_eq!(parse_user_node_name("xdmax_user"), None);
        assert_eq!(parse_user_node_name("nvme0"), None);
    }

    #[test]
    fn default_node_matches_index_zero() {
        assert_eq!(DEFAULT_USER_NODE, format!("{DEV_DIR}/{}", user_node_name(0)));
    }
}
