//! Generation tasks: six independent transcript-to-artifact jobs.
//!
//! Every task is a pure function from Transcript to artifact-or-error with
//! exactly one schema-constrained model call per attempt. Tasks never
//! persist or publish anything — the orchestrator and merge gate own those
//! concerns — and re-invoking a task with the same transcript is safe, so
//! the step executor's retry policy is sound.

pub mod hashtags;
pub mod key_moments;
pub mod social_posts;
pub mod summary;
pub mod task;
pub mod titles;
pub mod youtube_timestamps;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use recast_providers::CompletionClient;

pub use task::GenerationTask;

pub use hashtags::HashtagsTask;
pub use key_moments::KeyMomentsTask;
pub use social_posts::SocialPostsTask;
pub use summary::SummaryTask;
pub use titles::TitlesTask;
pub use youtube_timestamps::YoutubeTimestampsTask;

/// All six tasks wired to one completion client, in no particular order —
/// the fan-out treats them as symmetric.
pub fn default_tasks(client: Arc<dyn CompletionClient>) -> Vec<Arc<dyn GenerationTask>> {
    vec![
        Arc::new(KeyMomentsTask::new(client.clone())),
        Arc::new(SummaryTask::new(client.clone())),
        Arc::new(SocialPostsTask::new(client.clone())),
        Arc::new(TitlesTask::new(client.clone())),
        Arc::new(HashtagsTask::new(client.clone())),
        Arc::new(YoutubeTimestampsTask::new(client)),
    ]
}
