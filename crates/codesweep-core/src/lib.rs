pub mod config;
pub mod error;
pub mod keyspace;
pub mod outcome;
pub mod progress;
pub mod scheduler;
pub mod store;
pub mod testutil;
pub mod traits;

pub use config::{EndpointTemplate, RetryConfig, SweepConfig};
pub use error::SweepError;
pub use keyspace::{Alphabet, Keyspace, KeyspaceCursor};
pub use outcome::{Classification, ProbeOutcome};
pub use progress::{ProgressSnapshot, RunProgress};
pub use scheduler::{
    RunState, SweepReport, SweepReporter, SweepScheduler, TracingSweepReporter,
};
pub use store::{PutOutcome, ResultStore};
pub use traits::{Classifier, NullSink, Prober, ProberFactory, ResultSink};
