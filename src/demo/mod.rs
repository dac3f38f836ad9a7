//! Demonstration workload run once at startup
//!
//! Exercises create, read, update and delete calls against the `podcasts` and
//! `episodes` collections of the configured database.

pub mod models;
mod workload;

pub use models::{sample_podcast_id, Episode, Podcast};
pub use workload::{SampleWorkload, EPISODES_COLLECTION, PODCASTS_COLLECTION};
