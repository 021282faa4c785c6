use std::sync::Arc;

use crate::domain::model::Config;
use crate::ports::{clock::Clock, http::FeedFetch, http::HookPost, random::RandomSource, store::Store};

/// Everything the supervisor needs to wire the pipeline together.
pub struct AppContext<S, F, P, C, G>
where
    S: Store,
    F: FeedFetch,
    P: HookPost,
    C: Clock,
    G: RandomSource,
{
    pub cfg: Config,
    pub store: Arc<S>,
    pub fetch: Arc<F>,
    pub post: Arc<P>,
    pub clock: Arc<C>,
    pub rng: Arc<G>,
}
