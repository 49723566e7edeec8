//! # Typed Dispatcher
//!
//! Resolves an [`Endpoint`] marker to its registry function and invokes it.
//! The payload and result types come from the endpoint's associated types, so a
//! mismatched payload is a compile error rather than a runtime one.
//!
//! The dispatcher adds nothing to the call: the result of the registry
//! function, success or failure, is returned as-is.

use crate::model::Envelope;
use crate::routes::{ApiRoutes, Endpoint};
use crate::transport::TransportError;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Invokes the registry function for `E` with `payload`.
#[instrument(skip_all, fields(route = %E::route_key()))]
pub async fn send_request<E: Endpoint>(
    routes: &ApiRoutes,
    payload: E::Payload,
) -> Result<Envelope<E::Output>, TransportError> {
    debug!(?payload, "Dispatching");
    E::call(routes, payload).await
}

/// Cloneable dispatcher holding the registry it resolves against.
///
/// Hooks take one of these at construction time instead of reaching for a
/// global registry.
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<ApiRoutes>,
}

impl Dispatcher {
    pub fn new(routes: Arc<ApiRoutes>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    pub async fn send<E: Endpoint>(
        &self,
        payload: E::Payload,
    ) -> Result<Envelope<E::Output>, TransportError> {
        send_request::<E>(&self.routes, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::MockTransport;
    use crate::model::{PhotoTitle, PostId};
    use crate::routes::{GetPhotos, GetPostById, GetPosts, GetTitlePhotos};
    use serde_json::json;

    fn post_json(id: u64) -> serde_json::Value {
        json!({"userId": 1, "id": id, "title": format!("post {id}"), "body": "..."})
    }

    fn photo_json(id: u64, title: &str) -> serde_json::Value {
        json!({
            "albumId": 1,
            "id": id,
            "title": title,
            "url": format!("https://via.placeholder.com/600/{id}"),
            "thumbnailUrl": format!("https://via.placeholder.com/150/{id}")
        })
    }

    #[tokio::test]
    async fn test_get_post_by_id_requests_post_path() {
        let mock = MockTransport::new();
        mock.expect_get("posts/5").return_ok(post_json(5));
        let dispatcher = Dispatcher::new(Arc::new(ApiRoutes::new(mock.transport())));

        let envelope = dispatcher.send::<GetPostById>(PostId::from("5")).await.unwrap();

        assert_eq!(envelope.data.id, 5);
        assert_eq!(envelope.message, "OK");
        assert_eq!(mock.requests_seen(), vec!["posts/5".to_string()]);
        mock.verify();
    }

    #[tokio::test]
    async fn test_get_title_photos_requests_title_query() {
        let mock = MockTransport::new();
        mock.expect_get("photos?title=cat")
            .return_ok(json!([photo_json(1, "cat"), photo_json(2, "cat")]));
        let routes = ApiRoutes::new(mock.transport());

        let envelope = send_request::<GetTitlePhotos>(&routes, PhotoTitle::from("cat"))
            .await
            .unwrap();

        assert_eq!(envelope.data.len(), 2);
        assert!(envelope.data.iter().all(|p| p.title == "cat"));
        mock.verify();
    }

    #[tokio::test]
    async fn test_each_endpoint_hits_its_own_location() {
        let mock = MockTransport::new();
        mock.expect_get("posts").return_ok(json!([post_json(1)]));
        mock.expect_get("photos").return_ok(json!([photo_json(1, "a")]));
        let routes = ApiRoutes::new(mock.transport());

        let posts = send_request::<GetPosts>(&routes, ()).await.unwrap();
        let photos = send_request::<GetPhotos>(&routes, ()).await.unwrap();

        assert_eq!(posts.data[0].id, 1);
        assert_eq!(photos.data[0].album_id, 1);
        assert_eq!(mock.requests_seen(), vec!["posts".to_string(), "photos".to_string()]);
        mock.verify();
    }

    #[tokio::test]
    async fn test_transport_failure_is_forwarded_unchanged() {
        let mock = MockTransport::new();
        mock.expect_get("posts/404").return_status(404);
        let routes = ApiRoutes::new(mock.transport());

        let err = send_request::<GetPostById>(&routes, PostId::from(404))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Status {
                status: 404,
                url: "posts/404".to_string(),
                body: String::new(),
            }
        );
    }
}
