//! Scriptable host fakes for tests.
//!
//! An in-process [`Platform`] whose surfaces, scripted requests, and bridge
//! operations are all recorded and drivable from the test body. Host events
//! are injected through the `tx` side of the event stream.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;
use crate::platform::{
    AttachOrder, FrameHandle, HostEvent, HostGeometry, Platform, PopupFeatures, PopupHandle,
};
use crate::transport::bridge::{Bridge, HttpMethod};

// ============================================================================
// Helpers
// ============================================================================

/// Polls `cond` until it holds, panicking after two seconds.
pub(crate) async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            Instant::now() < deadline,
            "condition not met within deadline"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Installs a test subscriber once; later calls are no-ops.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trace".into()),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FakePopup
// ============================================================================

/// Popup handle with a drivable closed flag and failure injection.
#[derive(Default)]
pub(crate) struct FakePopup {
    closed: AtomicBool,
    close_calls: AtomicUsize,
    probe_fail: AtomicBool,
}

impl FakePopup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Simulates the user closing the window.
    pub(crate) fn user_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Makes probes and closes fail like a cross-origin restriction.
    pub(crate) fn fail_probes(&self) {
        self.probe_fail.store(true, Ordering::SeqCst);
    }

    /// Lifts the failure injection.
    pub(crate) fn recover_probes(&self) {
        self.probe_fail.store(false, Ordering::SeqCst);
    }

    /// Number of times `close` succeeded.
    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl PopupHandle for FakePopup {
    fn is_closed(&self) -> Result<bool> {
        if self.probe_fail.load(Ordering::SeqCst) {
            return Err(Error::platform("permission denied"));
        }
        Ok(self.closed.load(Ordering::SeqCst))
    }

    fn close(&self) -> Result<()> {
        if self.probe_fail.load(Ordering::SeqCst) {
            return Err(Error::platform("permission denied"));
        }
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// FakeFrame
// ============================================================================

/// Frame handle recording the order of lifecycle operations.
#[derive(Default)]
pub(crate) struct FakeFrame {
    ops: Mutex<Vec<&'static str>>,
    location: Mutex<Option<String>>,
    removed: AtomicBool,
}

impl FakeFrame {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lifecycle operations in the order they happened.
    pub(crate) fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().clone()
    }

    /// The last location set, if any.
    #[allow(dead_code)]
    pub(crate) fn location(&self) -> Option<String> {
        self.location.lock().clone()
    }

    /// Whether the frame has been detached.
    pub(crate) fn removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

impl FrameHandle for FakeFrame {
    fn set_location(&self, url: &str) -> Result<()> {
        self.ops.lock().push("src");
        *self.location.lock() = Some(url.to_string());
        Ok(())
    }

    fn mount(&self) -> Result<()> {
        self.ops.lock().push("mount");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        self.ops.lock().push("remove");
        self.removed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// FakeBridge
// ============================================================================

/// A bridged HTTP request as the fake plugin saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeHttpRequest {
    pub(crate) id: CorrelationId,
    pub(crate) method: HttpMethod,
    pub(crate) url: String,
    pub(crate) body: String,
}

/// Bridge plugin fake recording everything issued through it.
pub(crate) struct FakeBridge {
    min_version: bool,
    bootstraps: AtomicUsize,
    channels: Mutex<Vec<String>>,
    requests: Mutex<Vec<FakeHttpRequest>>,
}

impl FakeBridge {
    pub(crate) fn new() -> Self {
        Self::with_min_version(true)
    }

    pub(crate) fn with_min_version(min_version: bool) -> Self {
        Self {
            min_version,
            bootstraps: AtomicUsize::new(0),
            channels: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn bootstrap_count(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }

    pub(crate) fn channels(&self) -> Vec<String> {
        self.channels.lock().clone()
    }

    pub(crate) fn requests(&self) -> Vec<FakeHttpRequest> {
        self.requests.lock().clone()
    }
}

impl Bridge for FakeBridge {
    fn has_min_version(&self) -> bool {
        self.min_version
    }

    fn bootstrap(&self) -> Result<()> {
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_channel(&self, origin: &str) -> Result<()> {
        self.channels.lock().push(origin.to_string());
        Ok(())
    }

    fn send_http(
        &self,
        id: &CorrelationId,
        method: HttpMethod,
        url: &str,
        body: &str,
    ) -> Result<()> {
        self.requests.lock().push(FakeHttpRequest {
            id: id.clone(),
            method,
            url: url.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// FakePlatform
// ============================================================================

/// Scriptable in-process host.
pub(crate) struct FakePlatform {
    /// Inject host events here.
    pub(crate) tx: UnboundedSender<HostEvent>,
    events: Mutex<Option<UnboundedReceiver<HostEvent>>>,
    native_messaging: bool,
    scripted: bool,
    scripted_refuses: bool,
    bridge: Option<Arc<FakeBridge>>,
    attach_order: AttachOrder,
    geometry: HostGeometry,
    popups: Mutex<Vec<Arc<FakePopup>>>,
    frames: Mutex<Vec<Arc<FakeFrame>>>,
    scripted_requests: Mutex<Vec<(CorrelationId, String)>>,
}

impl FakePlatform {
    fn with(native: bool, scripted: bool, bridge: Option<Arc<FakeBridge>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            events: Mutex::new(Some(rx)),
            native_messaging: native,
            scripted,
            scripted_refuses: false,
            bridge,
            attach_order: AttachOrder::MountFirst,
            geometry: HostGeometry {
                screen_x: Some(0),
                screen_y: Some(0),
                outer_width: Some(1280),
                outer_height: Some(800),
                client_width: 1260,
                client_height: 760,
            },
            popups: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            scripted_requests: Mutex::new(Vec::new()),
        }
    }

    /// Full native capability, no bridge.
    pub(crate) fn native() -> Self {
        Self::with(true, true, None)
    }

    /// Native messaging without the scripted request path, bridge present.
    pub(crate) fn native_with_bridge() -> Self {
        Self::with(true, false, Some(Arc::new(FakeBridge::new())))
    }

    /// Claims scripted support but refuses every request, bridge present.
    pub(crate) fn scripted_refused() -> Self {
        let mut platform = Self::with(true, true, Some(Arc::new(FakeBridge::new())));
        platform.scripted_refuses = true;
        platform
    }

    /// No native primitives, usable bridge.
    pub(crate) fn bridged() -> Self {
        Self::with(false, false, Some(Arc::new(FakeBridge::new())))
    }

    /// Bridge present but below the minimum version.
    pub(crate) fn bridged_stale() -> Self {
        Self::with(false, false, Some(Arc::new(FakeBridge::with_min_version(false))))
    }

    /// No capabilities at all.
    pub(crate) fn bare() -> Self {
        Self::with(false, false, None)
    }

    pub(crate) fn set_attach_order(&mut self, order: AttachOrder) {
        self.attach_order = order;
    }

    pub(crate) fn popups(&self) -> Vec<Arc<FakePopup>> {
        self.popups.lock().clone()
    }

    pub(crate) fn frames(&self) -> Vec<Arc<FakeFrame>> {
        self.frames.lock().clone()
    }

    pub(crate) fn scripted_requests(&self) -> Vec<(CorrelationId, String)> {
        self.scripted_requests.lock().clone()
    }

    pub(crate) fn fake_bridge(&self) -> Option<Arc<FakeBridge>> {
        self.bridge.clone()
    }
}

impl Platform for FakePlatform {
    fn page_origin(&self) -> String {
        "https://app.example.com".to_string()
    }

    fn geometry(&self) -> HostGeometry {
        self.geometry
    }

    fn attach_order(&self) -> AttachOrder {
        self.attach_order
    }

    fn open_popup(&self, _url: &str, _features: PopupFeatures) -> Result<Arc<dyn PopupHandle>> {
        let popup = Arc::new(FakePopup::new());
        self.popups.lock().push(Arc::clone(&popup));
        Ok(popup)
    }

    fn create_frame(&self) -> Result<Arc<dyn FrameHandle>> {
        let frame = Arc::new(FakeFrame::new());
        self.frames.lock().push(Arc::clone(&frame));
        Ok(frame)
    }

    fn supports_native_messaging(&self) -> bool {
        self.native_messaging
    }

    fn supports_scripted_requests(&self) -> bool {
        self.scripted
    }

    fn scripted_request(&self, id: &CorrelationId, url: &str) -> Result<()> {
        if !self.scripted || self.scripted_refuses {
            return Err(Error::unsupported("scripted requests"));
        }
        self.scripted_requests
            .lock()
            .push((id.clone(), url.to_string()));
        Ok(())
    }

    fn bridge(&self) -> Option<Arc<dyn Bridge>> {
        self.bridge
            .clone()
            .map(|bridge| bridge as Arc<dyn Bridge>)
    }

    fn take_events(&self) -> Option<UnboundedReceiver<HostEvent>> {
        self.events.lock().take()
    }
}
