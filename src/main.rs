use route_query::hooks::{PayloadSource, QueryOptions};
use route_query::lifecycle::tracing::setup_tracing;
use route_query::lifecycle::ApiSystem;
use route_query::model::{PhotoTitle, PostId};
use route_query::routes::{GetPostById, GetPosts, GetTitlePhotos};
use tokio::sync::watch;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting route-query demo");

    let system = ApiSystem::from_env().map_err(|e| e.to_string())?;

    // All posts
    let posts = system.hooks.use_query::<GetPosts>((), QueryOptions::default());
    let state = posts
        .wait_settled()
        .instrument(tracing::info_span!("all_posts"))
        .await;
    match (&state.data, &state.error) {
        (Some(envelope), _) => info!(count = envelope.data.len(), message = %envelope.message, "Posts loaded"),
        (None, Some(e)) => error!(error = %e, "Loading posts failed"),
        (None, None) => {}
    }

    // One post, following a reactive id
    let (post_id, post_id_rx) = watch::channel(PostId::from(1u64));
    let post = system
        .hooks
        .use_query::<GetPostById>(post_id_rx, QueryOptions::default());
    let span = tracing::info_span!("post_by_id");
    async {
        let first = post.wait_settled().await;
        if let Some(envelope) = &first.data {
            info!(id = envelope.data.id, title = %envelope.data.title, "Post loaded");
        }

        info!("Switching to post 2");
        post_id.send_replace(PostId::from(2u64));
        let second = post
            .wait_until(|s| s.is_error() || s.data.as_ref().is_some_and(|e| e.data.id == 2))
            .await;
        match (&second.data, &second.error) {
            (Some(envelope), _) => info!(id = envelope.data.id, title = %envelope.data.title, "Post loaded"),
            (None, Some(e)) => error!(error = %e, "Loading post failed"),
            (None, None) => {}
        }
    }
    .instrument(span)
    .await;

    // Photos filtered by title
    let title = PhotoTitle::from("accusamus beatae ad facilis cum similique qui sunt");
    let photos = system
        .hooks
        .use_query::<GetTitlePhotos>(PayloadSource::fixed(title), QueryOptions::default());
    let state = photos.wait_settled().await;
    match (&state.data, &state.error) {
        (Some(envelope), _) => info!(count = envelope.data.len(), "Photos loaded"),
        (None, Some(e)) => error!(error = %e, "Loading photos failed"),
        (None, None) => {}
    }

    drop(posts);
    drop(post);
    drop(photos);
    system.shutdown().await?;

    info!("Demo completed");
    Ok(())
}
