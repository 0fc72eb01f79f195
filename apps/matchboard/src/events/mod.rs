//! Event production: periodic comparison of attribute and match state against what has
//! already been announced.

mod producer;
mod scheduler;

pub use producer::{
    CycleReport, EventProducer, ProducerConfig, StrongMatchPolicy, DEFAULT_STRONG_MATCH_THRESHOLD,
};
pub use scheduler::{spawn_producer, ProducerHandle};
