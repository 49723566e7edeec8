use super::{ApiRoutes, Endpoint, Resource, POSTS};
use crate::model::{Envelope, Post, PostId};
use crate::transport::{ApiRequest, Transport, TransportError};
use async_trait::async_trait;

/// Endpoint functions of the `posts` resource.
pub struct PostsRoute<'a> {
    transport: &'a dyn Transport,
}

impl<'a> PostsRoute<'a> {
    pub(super) fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// `GET posts`
    pub async fn get_posts(&self) -> Result<Envelope<Vec<Post>>, TransportError> {
        self.transport
            .execute(ApiRequest::get(POSTS.prefix))
            .await?
            .into_envelope()
    }

    /// `GET posts/{id}`
    pub async fn get_post_by_id(&self, id: &PostId) -> Result<Envelope<Post>, TransportError> {
        self.transport
            .execute(ApiRequest::get_item(POSTS.prefix, id.as_str())?)
            .await?
            .into_envelope()
    }
}

/// `posts-getPosts`
pub struct GetPosts;

#[async_trait]
impl Endpoint for GetPosts {
    const RESOURCE: Resource = Resource::Posts;
    const METHOD: &'static str = "getPosts";
    type Payload = ();
    type Output = Vec<Post>;

    async fn call(routes: &ApiRoutes, _payload: ()) -> Result<Envelope<Vec<Post>>, TransportError> {
        routes.posts().get_posts().await
    }
}

/// `posts-getPostById`
pub struct GetPostById;

#[async_trait]
impl Endpoint for GetPostById {
    const RESOURCE: Resource = Resource::Posts;
    const METHOD: &'static str = "getPostById";
    type Payload = PostId;
    type Output = Post;

    async fn call(routes: &ApiRoutes, payload: PostId) -> Result<Envelope<Post>, TransportError> {
        routes.posts().get_post_by_id(&payload).await
    }
}
