//! Feature and license gates.
//!
//! Each gate evaluates one boolean predicate over an injected capability
//! provider before the handler runs. A disabled feature terminates with 403,
//! a missing license entitlement with 401.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use crate::capability::{Entitlement, FeatureFlagKey, FeatureFlags, Licenser};
use crate::error::EdgeError;

/// The predicate a [`GateLayer`] evaluates.
#[derive(Clone)]
enum Capability {
    Feature(Arc<dyn FeatureFlags>, FeatureFlagKey),
    License(Arc<dyn Licenser>, Entitlement),
}

impl Capability {
    fn check(&self) -> Result<(), EdgeError> {
        match self {
            Capability::Feature(flags, key) if !flags.can_access_feature(*key) => {
                debug!(feature = %key, "Feature disabled");
                Err(EdgeError::FeatureDisabled)
            }
            Capability::License(licenser, entitlement) if !licenser.allows(*entitlement) => {
                debug!(entitlement = ?entitlement, "License entitlement missing");
                Err(EdgeError::LicenseRequired)
            }
            _ => Ok(()),
        }
    }
}

/// Capability gate for Tower middleware stack.
#[derive(Clone)]
pub struct GateLayer {
    capability: Capability,
}

impl GateLayer {
    /// Forward only while `key` is enabled.
    pub fn feature(flags: Arc<dyn FeatureFlags>, key: FeatureFlagKey) -> Self {
        Self {
            capability: Capability::Feature(flags, key),
        }
    }

    /// Forward only while the license grants `entitlement`.
    pub fn license(licenser: Arc<dyn Licenser>, entitlement: Entitlement) -> Self {
        Self {
            capability: Capability::License(licenser, entitlement),
        }
    }

    pub fn enterprise_sso(licenser: Arc<dyn Licenser>) -> Self {
        Self::license(licenser, Entitlement::EnterpriseSso)
    }

    pub fn portal_links(licenser: Arc<dyn Licenser>) -> Self {
        Self::license(licenser, Entitlement::PortalLinks)
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            capability: self.capability.clone(),
        }
    }
}

/// Capability gate service wrapper.
#[derive(Clone)]
pub struct GateService<S> {
    inner: S,
    capability: Capability,
}

impl<S> Service<Request<Body>> for GateService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let verdict = self.capability.check();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match verdict {
                Ok(()) => inner.call(req).await,
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}
