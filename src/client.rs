//! Client surface tying the layers together.
//!
//! A [`Client`] owns the correlation registry, the liveness monitor, the
//! selected transport, and the host event loop. Embedders build one with
//! [`Client::builder`], hand it URLs to open as surfaces, and receive
//! resolutions through the callbacks they registered when building handler
//! URLs or issuing API calls.
//!
//! | Entry point        | Purpose                                            |
//! |--------------------|----------------------------------------------------|
//! | `handler_url`      | Raw message handler returning the full field set   |
//! | `result_url`       | Handler decoding the structured `result` field     |
//! | `session_url`      | Handler decoding and storing a session              |
//! | `open_popup`       | Open and track a popup surface                      |
//! | `open_hidden_frame`| Open and track a hidden iframe surface              |
//! | `call`             | Signed API request over the best available path     |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;
use crate::monitor::{DEFAULT_POLL_INTERVAL, Monitor};
use crate::platform::{AttachOrder, HostEvent, Platform};
use crate::protocol::{
    CallIdCounter, Fields, Params, Payload, RESULT_SENTINEL, Relation, encode_query,
    extract_perms, extract_result, extract_session, shape_request,
};
use crate::registry::{DispatchCallback, Registry};
use crate::session::Session;
use crate::surface::{Surface, centered_features};
use crate::transport::bridge::{self, BRIDGE_GET_MAX, Bridge, HttpMethod, ReadyGate};
use crate::transport::{self, TransportKind};

// ============================================================================
// Constants
// ============================================================================

/// Maximum URL length for a scripted API request.
///
/// Longer requests fail fast with [`Error::PayloadTooLarge`]; callers that
/// can reach the bridge may retry through [`Client::call_bridged`], whose
/// POST path has no such limit.
pub const MAX_SCRIPTED_LEN: usize = 2000;

/// Path of the cross-context proxy page, relative to the CDN root.
const PROXY_PATH: &str = "xd/proxy";

// ============================================================================
// Callback aliases
// ============================================================================

/// Resolves with the full decoded field set of an inbound message.
pub type MessageCallback = Box<dyn FnOnce(Fields) + Send>;

/// Resolves with the structured `result` field, or `None` when the surface
/// closed or reported no result.
pub type ResultCallback = Box<dyn FnOnce(Option<Value>) + Send>;

/// Resolves with the granted session (if any) and the granted permissions
/// string (empty when none).
pub type SessionCallback = Box<dyn FnOnce(Option<Session>, String) + Send>;

/// Resolves with the parsed API response.
pub type ApiCallback = Box<dyn FnOnce(Value) + Send>;

// ============================================================================
// Endpoints
// ============================================================================

/// Remote endpoints the client talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// API endpoint receiving signed requests.
    pub api: Url,
    /// CDN root serving the cross-context proxy page.
    pub cdn: Url,
}

impl Endpoints {
    /// Parses both endpoints from string form.
    pub fn new(api: &str, cdn: &str) -> Result<Self> {
        Ok(Self {
            api: Url::parse(api)?,
            cdn: Url::parse(cdn)?,
        })
    }
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for [`Client`]. Platform, API key, and endpoints are required.
pub struct ClientBuilder {
    platform: Option<Arc<dyn Platform>>,
    api_key: Option<String>,
    endpoints: Option<Endpoints>,
    session: Option<Session>,
    monitor_interval: Duration,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            platform: None,
            api_key: None,
            endpoints: None,
            session: None,
            monitor_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the host platform.
    #[must_use]
    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Sets the API key identifying the embedding application.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the remote endpoints.
    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Seeds an existing session, e.g. restored from storage.
    #[must_use]
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Overrides the popup liveness polling interval.
    #[must_use]
    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Validates the configuration, selects a transport, and starts the
    /// host event loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required field is missing,
    /// [`Error::NoTransport`] when the host offers no usable transport, and
    /// [`Error::Platform`] when the host event stream is unavailable.
    pub fn build(self) -> Result<Client> {
        let platform = self
            .platform
            .ok_or_else(|| Error::config("platform is required. Use .platform() to set it."))?;
        let api_key = self
            .api_key
            .ok_or_else(|| Error::config("api key is required. Use .api_key() to set it."))?;
        let endpoints = self
            .endpoints
            .ok_or_else(|| Error::config("endpoints are required. Use .endpoints() to set them."))?;

        let transport = transport::select(platform.as_ref())?;
        let origin = format!("{}/{}", platform.page_origin(), CorrelationId::generate());
        let proxy_base = endpoints.cdn.join(PROXY_PATH)?.to_string();
        let events = platform
            .take_events()
            .ok_or_else(|| Error::platform("host event stream unavailable"))?;
        let bridge = platform.bridge();

        let inner = Arc::new(ClientInner {
            platform,
            api_key,
            api_endpoint: endpoints.api.to_string(),
            proxy_base,
            origin,
            transport,
            registry: Arc::new(Registry::new()),
            monitor: Arc::new(Monitor::new(self.monitor_interval)),
            session: Mutex::new(self.session),
            call_ids: CallIdCounter::new(),
            gate: ReadyGate::new(),
            bridge,
            bridge_started: Mutex::new(false),
        });

        // A bridged primary transport boots the plugin up front and opens
        // the message channel as soon as it reports ready.
        if transport == TransportKind::Bridge {
            inner.ensure_bridge_started()?;
            if let Some(bridge) = inner.bridge.clone() {
                let origin = inner.origin.clone();
                inner.gate.when_ready(Box::new(move || {
                    if let Err(error) = bridge.open_channel(&origin) {
                        warn!(%error, "failed to open bridge channel");
                    }
                }));
            }
        }

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_event_loop(Arc::clone(&inner), events));
            }
            Err(_) => warn!("no async runtime, host events will not be processed"),
        }

        info!(transport = transport.as_str(), "client initialized");
        Ok(Client { inner })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Shared client state. [`Client`] handles are cheap clones of this.
struct ClientInner {
    platform: Arc<dyn Platform>,
    api_key: String,
    api_endpoint: String,
    proxy_base: String,
    origin: String,
    transport: TransportKind,
    registry: Arc<Registry>,
    monitor: Arc<Monitor>,
    session: Mutex<Option<Session>>,
    call_ids: CallIdCounter,
    gate: ReadyGate,
    bridge: Option<Arc<dyn Bridge>>,
    bridge_started: Mutex<bool>,
}

/// Cross-context messaging client.
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("origin", &self.inner.origin)
            .field("transport", &self.inner.transport)
            .field("pending", &self.inner.registry.pending_count())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Starts building a client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The origin token identifying this client instance to remote pages.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// The transport selected at build time.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.inner.transport
    }

    /// The current session, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.inner.session.lock().clone()
    }

    /// Replaces the current session.
    pub fn set_session(&self, session: Option<Session>) {
        *self.inner.session.lock() = session;
    }

    /// Number of callbacks awaiting resolution.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.registry.pending_count()
    }

    /// Number of popup surfaces under liveness monitoring.
    #[must_use]
    pub fn monitored_surfaces(&self) -> usize {
        self.inner.monitor.enrolled_count()
    }

    // ------------------------------------------------------------------
    // Handler URLs
    // ------------------------------------------------------------------

    /// Registers `callback` and returns the proxy URL a remote page loads
    /// to deliver its message.
    ///
    /// The callback is keyed under `id` when given, otherwise under `frame`,
    /// so one surface can carry several pending exchanges. The remote page
    /// echoes both identifiers back in its message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateCallback`] when the id is already pending.
    pub fn handler_url(
        &self,
        callback: MessageCallback,
        frame: &CorrelationId,
        relation: Relation,
        id: Option<CorrelationId>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(|| frame.clone());
        self.inner.registry.register(id.clone(), wrap_message(callback))?;

        let mut params = Params::default();
        params.insert("cb".to_string(), id.as_str().to_string());
        params.insert("frame".to_string(), frame.as_str().to_string());
        params.insert("origin".to_string(), self.inner.origin.clone());
        params.insert("relation".to_string(), relation.as_str().to_string());
        params.insert(
            "transport".to_string(),
            self.inner.transport.as_str().to_string(),
        );

        // The `#?=&` prefix parks everything after it in the fragment, so
        // remote servers that blindly append their own query parameters
        // cannot clobber ours.
        Ok(format!(
            "{}#?=&{}",
            self.inner.proxy_base,
            encode_query(&params, "&", true)
        ))
    }

    /// Like [`handler_url`](Self::handler_url), but decodes the structured
    /// `result` field before resolving.
    ///
    /// The returned URL carries a sentinel default `result`, so a surface
    /// that bounces straight back without substituting a real value resolves
    /// as `None` rather than delivering the sentinel.
    pub fn result_url(
        &self,
        callback: ResultCallback,
        frame: &CorrelationId,
        relation: Relation,
        id: Option<CorrelationId>,
    ) -> Result<String> {
        let wrapped: MessageCallback = Box::new(move |fields| callback(extract_result(&fields)));
        let url = self.handler_url(wrapped, frame, relation, id)?;
        Ok(format!(
            "{url}&result={}",
            urlencoding::encode(RESULT_SENTINEL)
        ))
    }

    /// Like [`result_url`](Self::result_url), but decodes a session grant.
    ///
    /// The decoded session (or `None` on denial) is stored on the client
    /// before the callback runs, so API calls issued from inside the
    /// callback are already signed with it.
    pub fn session_url(
        &self,
        callback: SessionCallback,
        frame: &CorrelationId,
        relation: Relation,
        id: Option<CorrelationId>,
    ) -> Result<String> {
        let weak = Arc::downgrade(&self.inner);
        let wrapped: MessageCallback = Box::new(move |fields| {
            let session = extract_session(&fields);
            if let Some(inner) = weak.upgrade() {
                *inner.session.lock() = session.clone();
            }
            callback(session, extract_perms(&fields));
        });
        let url = self.handler_url(wrapped, frame, relation, id)?;
        Ok(format!(
            "{url}&result={}",
            urlencoding::encode(RESULT_SENTINEL)
        ))
    }

    // ------------------------------------------------------------------
    // Surfaces
    // ------------------------------------------------------------------

    /// Opens a popup centered on the host screen and tracks it under `id`.
    ///
    /// When a callback is pending under the same id the popup is enrolled
    /// with the liveness monitor, so closing it by hand still resolves the
    /// exchange.
    pub fn open_popup(
        &self,
        url: &str,
        width: u32,
        height: u32,
        id: &CorrelationId,
    ) -> Result<()> {
        let features = centered_features(&self.inner.platform.geometry(), width, height);
        let popup = self.inner.platform.open_popup(url, features)?;
        self.inner
            .registry
            .register_surface(id.clone(), Surface::Popup(popup));

        if self.inner.registry.has_callback(id) {
            self.inner.monitor.enroll(id.clone(), &self.inner.registry);
        }
        debug!(%id, width, height, "popup opened");
        Ok(())
    }

    /// Opens a hidden iframe and tracks it under `id`.
    ///
    /// Honors the host's required attach order; some hosts serve a cached
    /// copy when the location is set after attachment.
    pub fn open_hidden_frame(&self, url: &str, id: &CorrelationId) -> Result<()> {
        let frame = self.inner.platform.create_frame()?;
        match self.inner.platform.attach_order() {
            AttachOrder::SrcFirst => {
                frame.set_location(url)?;
                frame.mount()?;
            }
            AttachOrder::MountFirst => {
                frame.mount()?;
                frame.set_location(url)?;
            }
        }
        self.inner
            .registry
            .register_surface(id.clone(), Surface::Frame(frame));
        debug!(%id, "hidden frame opened");
        Ok(())
    }

    // ------------------------------------------------------------------
    // API calls
    // ------------------------------------------------------------------

    /// Issues a signed API request over the best available path.
    ///
    /// Prefers the host's scripted request support and falls back to the
    /// bridge plugin when that is missing, or when the host claims support
    /// but refuses the request with [`Error::Unsupported`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTransport`] when neither path is available.
    pub fn call(&self, params: Params, callback: ApiCallback, secret: Option<&str>) -> Result<()> {
        let has_bridge = self.inner.bridge.is_some();
        if self.inner.platform.supports_scripted_requests() {
            if !has_bridge {
                return self.call_native(params, callback, secret);
            }
            // Keep the caller's params pristine so a refused native attempt
            // can be reissued over the bridge unshaped.
            return match self.native_attempt(params.clone(), wrap_api(callback), secret) {
                Ok(()) => Ok(()),
                Err((error, Some(callback))) if error.is_unsupported() => {
                    debug!(%error, "native path refused, retrying over the bridge");
                    self.bridged_dispatch(params, callback, secret)
                }
                Err((error, _)) => Err(error),
            };
        }
        if has_bridge {
            return self.call_bridged(params, callback, secret);
        }
        Err(Error::NoTransport)
    }

    /// Issues a signed API request through the host's scripted request
    /// support.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] when the request URL exceeds
    /// [`MAX_SCRIPTED_LEN`]; the callback is not registered in that case.
    pub fn call_native(
        &self,
        params: Params,
        callback: ApiCallback,
        secret: Option<&str>,
    ) -> Result<()> {
        self.native_attempt(params, wrap_api(callback), secret)
            .map_err(|(error, _)| error)
    }

    /// Shapes, registers, and issues a scripted request.
    ///
    /// On failure the error carries the recovered callback (when it could be
    /// backed out unfired) so [`call`](Self::call) can retry it elsewhere.
    fn native_attempt(
        &self,
        mut params: Params,
        callback: DispatchCallback,
        secret: Option<&str>,
    ) -> std::result::Result<(), (Error, Option<DispatchCallback>)> {
        let id = CorrelationId::generate();
        params.insert("callback".to_string(), id.as_str().to_string());
        self.inner.shape(&mut params, secret);

        let url = format!("{}?{}", self.inner.api_endpoint, encode_query(&params, "&", true));
        if url.len() > MAX_SCRIPTED_LEN {
            return Err((
                Error::payload_too_large(url.len(), MAX_SCRIPTED_LEN),
                Some(callback),
            ));
        }

        if let Err(error) = self.inner.registry.register(id.clone(), callback) {
            return Err((error, None));
        }
        if let Err(error) = self.inner.platform.scripted_request(&id, &url) {
            let callback = self.inner.registry.unregister(&id);
            return Err((error, callback));
        }
        debug!(%id, "scripted request issued");
        Ok(())
    }

    /// Issues a signed API request through the bridge plugin, queueing it
    /// until the plugin reports ready.
    ///
    /// Short requests go as GET with the query in the URL; requests whose
    /// url+body would exceed the plugin's GET limit switch to POST. Request
    /// shaping happens at execution time, so a session acquired while the
    /// call is queued still signs it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTransport`] when no bridge plugin is present, or
    /// the plugin's bootstrap error on first use.
    pub fn call_bridged(
        &self,
        params: Params,
        callback: ApiCallback,
        secret: Option<&str>,
    ) -> Result<()> {
        self.bridged_dispatch(params, wrap_api(callback), secret)
    }

    fn bridged_dispatch(
        &self,
        params: Params,
        callback: DispatchCallback,
        secret: Option<&str>,
    ) -> Result<()> {
        let Some(bridge) = self.inner.bridge.clone() else {
            return Err(Error::NoTransport);
        };
        self.inner.ensure_bridge_started()?;

        let weak = Arc::downgrade(&self.inner);
        let secret = secret.map(str::to_owned);
        self.inner.gate.when_ready(Box::new(move || {
            let Some(inner) = weak.upgrade() else { return };

            let mut params = params;
            inner.shape(&mut params, secret.as_deref());
            let query = encode_query(&params, "&", true);

            let id = CorrelationId::generate();
            let (method, url, body) = if inner.api_endpoint.len() + query.len() > BRIDGE_GET_MAX {
                (HttpMethod::Post, inner.api_endpoint.clone(), query)
            } else {
                (
                    HttpMethod::Get,
                    format!("{}?{}", inner.api_endpoint, query),
                    String::new(),
                )
            };

            if let Err(error) = inner.registry.register(id.clone(), callback) {
                warn!(%error, "bridged call dropped");
                return;
            }
            if let Err(error) = bridge.send_http(&id, method, &url, &body) {
                inner.registry.unregister(&id);
                warn!(%id, %error, "bridged request failed to issue");
            } else {
                debug!(%id, method = method.as_str(), "bridged request issued");
            }
        }));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound messages
    // ------------------------------------------------------------------

    /// Delivers a raw query-string message received from a remote page.
    ///
    /// Normally messages arrive through the host event stream; this entry
    /// point exists for hosts that deliver synchronously.
    pub fn receive(&self, raw: &str) {
        self.inner.receive_raw(raw);
    }

    /// Delivers an already-decoded message.
    pub fn receive_fields(&self, fields: Fields) {
        self.inner.receive_fields(fields);
    }
}

impl ClientInner {
    /// Merges protocol defaults and signs `params` in place.
    fn shape(&self, params: &mut Params, secret: Option<&str>) {
        let call_id = self.call_ids.next();
        let session = self.session.lock().clone();
        shape_request(params, &self.api_key, call_id, session.as_ref(), secret);
    }

    /// Boots the bridge plugin exactly once.
    fn ensure_bridge_started(&self) -> Result<()> {
        let Some(bridge) = &self.bridge else {
            return Err(Error::NoTransport);
        };
        let mut started = self.bridge_started.lock();
        if !*started {
            bridge.bootstrap()?;
            *started = true;
        }
        Ok(())
    }

    fn receive_raw(&self, raw: &str) {
        self.receive_fields(Fields::from_query(raw));
    }

    fn receive_fields(&self, fields: Fields) {
        let (Some(frame), Some(cb)) = (fields.frame(), fields.callback()) else {
            warn!("message without frame/cb identifiers dropped");
            return;
        };
        self.registry.dispatch(&frame, &cb, Payload::Fields(fields));
    }
}

// ============================================================================
// Event loop
// ============================================================================

/// Drains the host event stream until the host drops its sender.
async fn run_event_loop(inner: Arc<ClientInner>, mut events: UnboundedReceiver<HostEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            HostEvent::Message(raw) => inner.receive_raw(&raw),
            HostEvent::BridgeReady => inner.gate.mark_ready(),
            HostEvent::BridgeMessage(encoded) => match urlencoding::decode(&encoded) {
                Ok(raw) => inner.receive_raw(&raw),
                Err(error) => warn!(%error, "undecodable bridge message dropped"),
            },
            HostEvent::BridgeHttpResult { id, payload } => {
                let value = match bridge::decode_payload(payload) {
                    Some(text) => serde_json::from_str(&text).unwrap_or_else(|error| {
                        warn!(%id, %error, "unparsable bridge response, resolving with null");
                        Value::Null
                    }),
                    None => {
                        warn!(%id, "empty bridge response, resolving with null");
                        Value::Null
                    }
                };
                inner.registry.dispatch(&id, &id, Payload::Json(value));
            }
            HostEvent::ScriptResult { id, payload } => {
                inner.registry.dispatch(&id, &id, Payload::Json(payload));
            }
        }
    }
    debug!("host event stream ended");
}

// ============================================================================
// Callback adapters
// ============================================================================

/// Adapts a message callback to the registry's dispatch type.
fn wrap_message(callback: MessageCallback) -> DispatchCallback {
    Box::new(move |payload| match payload {
        Payload::Fields(fields) => callback(fields),
        Payload::Json(_) => warn!("message callback resolved with an API payload, dropped"),
    })
}

/// Adapts an API callback to the registry's dispatch type.
fn wrap_api(callback: ApiCallback) -> DispatchCallback {
    Box::new(move |payload| match payload {
        Payload::Json(value) => callback(value),
        Payload::Fields(_) => warn!("api callback resolved with a message payload, dropped"),
    })
}

// ============================================================================
// Tests
// ============================================================================
