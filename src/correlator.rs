//! # Device Correlator
//!
//! Joins raw joystick devices to live wireless links.
//!
//! One correlation pass:
//! 1. Lists `js*` nodes in the input directory
//! 2. Resolves each node to a [`HardwareIdentity`], keeping the first node per identity
//! 3. Skips identities the caller already supervises
//! 4. Looks up the wireless device with the same address and drops it unless connected
//! 5. Opens the input source for every identity that survived the join
//!
//! Only unsupervised identities that are both a recognised input device and a
//! connected wireless device appear in the result. Supervised controllers keep
//! their existing handles; nothing is opened for them again.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identity::HardwareIdentity;
use crate::input::enumerate::list_joysticks;
use crate::input::{InputOpener, InputSource};
use crate::resolver::AttributeResolver;
use crate::wireless::{WirelessDevice, WirelessTransport};

/// A controller with both an input handle and a live wireless link.
pub struct CorrelatedController {
    /// Joystick node the input handle was opened from
    pub path: PathBuf,
    /// Raw input handle
    pub input: Box<dyn InputSource>,
    /// Wireless device handle
    pub wireless: Arc<dyn WirelessDevice>,
}

impl std::fmt::Debug for CorrelatedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelatedController")
            .field("path", &self.path)
            .field("address", &self.wireless.address())
            .finish_non_exhaustive()
    }
}

/// Correlates joystick nodes with wireless devices.
pub struct Correlator {
    input_dir: PathBuf,
    resolver: AttributeResolver,
    transport: Arc<dyn WirelessTransport>,
    opener: Arc<dyn InputOpener>,
}

impl Correlator {
    /// Create a correlator.
    ///
    /// # Arguments
    ///
    /// * `input_dir` - Directory holding joystick nodes (normally `/dev/input`)
    /// * `resolver` - Resolves nodes to hardware identities
    /// * `transport` - Wireless transport used for lookups
    /// * `opener` - Opens input sources for correlated nodes
    pub fn new(
        input_dir: impl Into<PathBuf>,
        resolver: AttributeResolver,
        transport: Arc<dyn WirelessTransport>,
        opener: Arc<dyn InputOpener>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            resolver,
            transport,
            opener,
        }
    }

    /// Directory scanned for joystick nodes.
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Probe the wireless transport.
    ///
    /// # Errors
    ///
    /// Returns `TransportUnavailable` when the transport cannot be reached.
    pub async fn probe(&self) -> Result<()> {
        self.transport.probe().await
    }

    /// Resolve joystick nodes to identities, keeping the first node per identity.
    ///
    /// # Errors
    ///
    /// Returns error if the input directory cannot be listed. Per-device
    /// failures are logged and skipped.
    pub async fn resolve_identities(&self) -> Result<Vec<(HardwareIdentity, PathBuf)>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for path in list_joysticks(&self.input_dir)? {
            let Some(identity) = self.resolver.resolve(&path).await else {
                continue;
            };

            if !seen.insert(identity.clone()) {
                warn!("Duplicate device {} for {}, keeping the first", path.display(), identity);
                continue;
            }

            debug!("Resolved {} to {}", path.display(), identity);
            resolved.push((identity, path));
        }

        Ok(resolved)
    }

    /// Run one correlation pass, leaving out identities in `supervised`.
    ///
    /// # Errors
    ///
    /// Returns error if the input directory cannot be listed.
    pub async fn correlate(
        &self,
        supervised: &HashSet<HardwareIdentity>,
    ) -> Result<HashMap<HardwareIdentity, CorrelatedController>> {
        let mut controllers = HashMap::new();

        for (identity, path) in self.resolve_identities().await? {
            if supervised.contains(&identity) {
                continue;
            }

            info!("Found device {} ({})", path.display(), identity);
            let Some(wireless) = self.connected_device(&identity).await else {
                continue;
            };

            let input = match self.opener.open(&path) {
                Ok(input) => input,
                Err(e) => {
                    warn!("Cannot open input for {} ({}): {}", identity, path.display(), e);
                    continue;
                }
            };

            controllers.insert(
                identity,
                CorrelatedController {
                    path,
                    input,
                    wireless,
                },
            );
        }

        Ok(controllers)
    }

    async fn connected_device(&self, identity: &HardwareIdentity) -> Option<Arc<dyn WirelessDevice>> {
        let device = match self.transport.find_device(identity).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                warn!("No wireless device with address {}", identity);
                return None;
            }
            Err(e) => {
                warn!("Wireless lookup for {} failed: {}", identity, e);
                return None;
            }
        };

        match device.is_connected().await {
            Ok(true) => Some(device),
            Ok(false) => {
                debug!("{} is known to the transport but not connected", identity);
                None
            }
            Err(e) => {
                warn!("Cannot read connection state of {}: {}", identity, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mocks::MockInputOpener;
    use crate::resolver::MockAttributeQuery;
    use crate::wireless::mocks::MockTransport;
    use std::fs;
    use tempfile::TempDir;

    fn dump(name: &str, address: &str) -> String {
        format!(
            "    ATTRS{{name}}==\"{}\"\n    ATTRS{{phys}}==\"00:1a:7d:da:71:13\"\n    ATTRS{{uniq}}==\"{}\"\n",
            name, address
        )
    }

    struct Fixture {
        dir: TempDir,
        transport: MockTransport,
        opener: MockInputOpener,
    }

    impl Fixture {
        fn new(nodes: &[&str]) -> Self {
            let dir = TempDir::new().unwrap();
            for node in nodes {
                fs::write(dir.path().join(node), b"").unwrap();
            }
            Self {
                dir,
                transport: MockTransport::new(),
                opener: MockInputOpener::default(),
            }
        }

        fn path(&self, node: &str) -> PathBuf {
            self.dir.path().join(node)
        }

        /// Correlator whose attribute query answers from `dumps` (node name -> output)
        fn correlator(&self, dumps: &[(&str, String)]) -> Correlator {
            let outputs: HashMap<PathBuf, String> = dumps
                .iter()
                .map(|(node, out)| (self.path(node), out.clone()))
                .collect();

            let mut query = MockAttributeQuery::new();
            query
                .expect_query()
                .returning(move |path| outputs.get(path).cloned());

            Correlator::new(
                self.dir.path(),
                AttributeResolver::new(query),
                Arc::new(self.transport.clone()),
                Arc::new(self.opener.clone()),
            )
        }
    }

    #[tokio::test]
    async fn test_correlates_connected_controller() {
        let fx = Fixture::new(&["js0", "event3"]);
        fx.transport.add_device("AA:BB:CC:DD:EE:FF", true);
        let correlator = fx.correlator(&[("js0", dump("Wireless Controller", "aa:bb:cc:dd:ee:ff"))]);

        let result = correlator.correlate(&HashSet::new()).await.unwrap();

        assert_eq!(result.len(), 1);
        let controller = &result[&HardwareIdentity::new("AA:BB:CC:DD:EE:FF")];
        assert_eq!(controller.path, fx.path("js0"));
        assert_eq!(controller.wireless.address(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(fx.opener.opened(), vec![fx.path("js0")]);
    }

    #[tokio::test]
    async fn test_duplicate_identity_kept_once() {
        let fx = Fixture::new(&["js0", "js1"]);
        fx.transport.add_device("aa:bb:cc:dd:ee:ff", true);
        let correlator = fx.correlator(&[
            ("js0", dump("Wireless Controller", "AA:BB:CC:DD:EE:FF")),
            ("js1", dump("Wireless Controller", "aa:bb:cc:dd:ee:ff")),
        ]);

        let identities = correlator.resolve_identities().await.unwrap();
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].1, fx.path("js0"));

        let result = correlator.correlate(&HashSet::new()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(fx.opener.opened(), vec![fx.path("js0")]);
    }

    #[tokio::test]
    async fn test_disconnected_device_excluded() {
        let fx = Fixture::new(&["js0"]);
        let handle = fx.transport.add_device("AA:BB:CC:DD:EE:FF", false);
        let correlator = fx.correlator(&[("js0", dump("Wireless Controller", "AA:BB:CC:DD:EE:FF"))]);

        let result = correlator.correlate(&HashSet::new()).await.unwrap();

        assert!(result.is_empty());
        assert!(fx.opener.opened().is_empty(), "input must not be opened without a live link");
        assert_eq!(handle.releases(), 1, "wireless handle released after lookup");
    }

    #[tokio::test]
    async fn test_unknown_wireless_device_excluded() {
        let fx = Fixture::new(&["js0"]);
        fx.transport.add_device("11:22:33:44:55:66", true);
        let correlator = fx.correlator(&[("js0", dump("Wireless Controller", "AA:BB:CC:DD:EE:FF"))]);

        assert!(correlator.correlate(&HashSet::new()).await.unwrap().is_empty());
        assert_eq!(fx.transport.lookups(), 1);
    }

    #[tokio::test]
    async fn test_wireless_device_without_input_excluded() {
        let fx = Fixture::new(&[]);
        fx.transport.add_device("AA:BB:CC:DD:EE:FF", true);
        let correlator = fx.correlator(&[]);

        assert!(correlator.correlate(&HashSet::new()).await.unwrap().is_empty());
        assert_eq!(fx.transport.lookups(), 0);
    }

    #[tokio::test]
    async fn test_motion_sensor_excluded() {
        let fx = Fixture::new(&["js0"]);
        fx.transport.add_device("AA:BB:CC:DD:EE:FF", true);
        let correlator = fx.correlator(&[(
            "js0",
            dump("Wireless Controller Motion Sensors", "AA:BB:CC:DD:EE:FF"),
        )]);

        assert!(correlator.correlate(&HashSet::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_device_skipped() {
        let fx = Fixture::new(&["js0", "js1"]);
        fx.transport.add_device("AA:BB:CC:DD:EE:FF", true);
        // js0 has no attributes at all
        let correlator = fx.correlator(&[("js1", dump("Wireless Controller", "AA:BB:CC:DD:EE:FF"))]);

        let result = correlator.correlate(&HashSet::new()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[&HardwareIdentity::new("AA:BB:CC:DD:EE:FF")].path, fx.path("js1"));
    }

    #[tokio::test]
    async fn test_input_open_failure_skipped() {
        let fx = Fixture::new(&["js0", "js1"]);
        fx.transport.add_device("AA:BB:CC:DD:EE:01", true);
        fx.transport.add_device("AA:BB:CC:DD:EE:02", true);
        let js0 = fx.path("js0");
        fx.opener.fail_for(&js0.to_string_lossy());
        let correlator = fx.correlator(&[
            ("js0", dump("Wireless Controller", "AA:BB:CC:DD:EE:01")),
            ("js1", dump("Wireless Controller", "AA:BB:CC:DD:EE:02")),
        ]);

        let result = correlator.correlate(&HashSet::new()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&HardwareIdentity::new("AA:BB:CC:DD:EE:02")));
    }

    #[tokio::test]
    async fn test_supervised_identity_skipped() {
        let fx = Fixture::new(&["js0", "js1"]);
        fx.transport.add_device("AA:BB:CC:DD:EE:01", true);
        fx.transport.add_device("AA:BB:CC:DD:EE:02", true);
        let correlator = fx.correlator(&[
            ("js0", dump("Wireless Controller", "AA:BB:CC:DD:EE:01")),
            ("js1", dump("Wireless Controller", "AA:BB:CC:DD:EE:02")),
        ]);
        let supervised = HashSet::from([HardwareIdentity::new("aa:bb:cc:dd:ee:01")]);

        let result = correlator.correlate(&supervised).await.unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&HardwareIdentity::new("AA:BB:CC:DD:EE:02")));
        assert_eq!(fx.opener.opened(), vec![fx.path("js1")]);
        assert_eq!(fx.transport.lookups(), 1, "no wireless lookup for a supervised identity");
    }

    #[tokio::test]
    async fn test_missing_input_dir_is_error() {
        let fx = Fixture::new(&[]);
        let mut query = MockAttributeQuery::new();
        query.expect_query().never();
        let correlator = Correlator::new(
            fx.dir.path().join("missing"),
            AttributeResolver::new(query),
            Arc::new(fx.transport.clone()),
            Arc::new(fx.opener.clone()),
        );

        assert!(correlator.correlate(&HashSet::new()).await.is_err());
    }
}
