//! # Route Registry
//!
//! Maps each resource to a group of endpoint functions, and each
//! (resource, method) pair to a marker type implementing [`Endpoint`].
//!
//! ## Key Types
//!
//! - [`Resource`] / [`ResourceDescriptor`]: the resources and their path prefixes.
//! - [`ApiRoutes`]: the registry. `routes.posts()` and `routes.photos()` hand out
//!   route groups with one async function per endpoint.
//! - [`Endpoint`]: the compile-time link between a marker type, the route-group
//!   function it calls, and that function's payload and output types.

pub mod photos;
pub mod posts;

pub use photos::{GetPhotos, GetTitlePhotos, PhotosRoute};
pub use posts::{GetPostById, GetPosts, PostsRoute};

use crate::model::Envelope;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

/// Name and path prefix of a resource. Defined once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    pub name: &'static str,
    pub prefix: &'static str,
}

pub const POSTS: ResourceDescriptor = ResourceDescriptor {
    name: "posts",
    prefix: "posts",
};

pub const PHOTOS: ResourceDescriptor = ResourceDescriptor {
    name: "photos",
    prefix: "photos",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Posts,
    Photos,
}

impl Resource {
    pub const fn descriptor(self) -> ResourceDescriptor {
        match self {
            Resource::Posts => POSTS,
            Resource::Photos => PHOTOS,
        }
    }

    pub const fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `(resource, method)` location in the registry, rendered as `posts-getPostById`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub resource: Resource,
    pub method: &'static str,
}

impl RouteKey {
    pub const fn new(resource: Resource, method: &'static str) -> Self {
        Self { resource, method }
    }
}

impl Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.resource, self.method)
    }
}

/// A single named operation within a resource.
///
/// Implemented by zero-sized marker types, one per (resource, method) pair.
/// The associated types are copied from the signature of the route-group
/// function that [`Endpoint::call`] forwards to, so
/// `send_request::<GetPostById>(&routes, PostId::from(5))` type-checks while
/// passing a [`PhotoTitle`](crate::model::PhotoTitle) does not.
///
/// Endpoints that take no payload use `type Payload = ()`.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    const RESOURCE: Resource;

    /// Method name within the resource (`getPostById`).
    const METHOD: &'static str;

    type Payload: Serialize + Clone + Debug + Send + Sync + 'static;

    type Output: DeserializeOwned + Clone + Debug + Send + Sync + 'static;

    /// Invokes the registry function at this endpoint's location.
    async fn call(
        routes: &ApiRoutes,
        payload: Self::Payload,
    ) -> Result<Envelope<Self::Output>, TransportError>;

    fn route_key() -> RouteKey {
        RouteKey::new(Self::RESOURCE, Self::METHOD)
    }
}

/// The route registry. Stateless apart from the shared transport.
#[derive(Clone)]
pub struct ApiRoutes {
    transport: Arc<dyn Transport>,
}

impl ApiRoutes {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn posts(&self) -> PostsRoute<'_> {
        PostsRoute::new(self.transport.as_ref())
    }

    pub fn photos(&self) -> PhotosRoute<'_> {
        PhotosRoute::new(self.transport.as_ref())
    }
}
