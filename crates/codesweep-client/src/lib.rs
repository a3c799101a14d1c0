pub mod classifier;
pub mod prober;

pub use classifier::TicketBoxClassifier;
pub use prober::{
    HttpProber, ProbeTransport, ReqwestProberFactory, ReqwestTransport, TransportError,
    TransportResponse,
};
