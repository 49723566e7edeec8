use super::{ApiRoutes, Endpoint, Resource, PHOTOS};
use crate::model::{Envelope, Photo, PhotoTitle};
use crate::transport::{ApiRequest, Transport, TransportError};
use async_trait::async_trait;

/// Endpoint functions of the `photos` resource.
pub struct PhotosRoute<'a> {
    transport: &'a dyn Transport,
}

impl<'a> PhotosRoute<'a> {
    pub(super) fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// `GET photos`
    pub async fn get_photos(&self) -> Result<Envelope<Vec<Photo>>, TransportError> {
        self.transport
            .execute(ApiRequest::get(PHOTOS.prefix))
            .await?
            .into_envelope()
    }

    /// `GET photos?title={title}`
    pub async fn get_title_photos(
        &self,
        title: &PhotoTitle,
    ) -> Result<Envelope<Vec<Photo>>, TransportError> {
        let request = ApiRequest::get(PHOTOS.prefix).with_query("title", title.as_str());
        self.transport.execute(request).await?.into_envelope()
    }
}

/// `photos-getPhotos`
pub struct GetPhotos;

#[async_trait]
impl Endpoint for GetPhotos {
    const RESOURCE: Resource = Resource::Photos;
    const METHOD: &'static str = "getPhotos";
    type Payload = ();
    type Output = Vec<Photo>;

    async fn call(routes: &ApiRoutes, _payload: ()) -> Result<Envelope<Vec<Photo>>, TransportError> {
        routes.photos().get_photos().await
    }
}

/// `photos-getTitlePhotos`
pub struct GetTitlePhotos;

#[async_trait]
impl Endpoint for GetTitlePhotos {
    const RESOURCE: Resource = Resource::Photos;
    const METHOD: &'static str = "getTitlePhotos";
    type Payload = PhotoTitle;
    type Output = Vec<Photo>;

    async fn call(
        routes: &ApiRoutes,
        payload: PhotoTitle,
    ) -> Result<Envelope<Vec<Photo>>, TransportError> {
        routes.photos().get_title_photos(&payload).await
    }
}
