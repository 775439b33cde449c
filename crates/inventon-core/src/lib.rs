pub mod auth;
pub mod config;
pub mod faq;
pub mod stats;
pub mod tickets;

pub use auth::{Actor, AuthorizationGate};
pub use config::Config;
pub use faq::FaqIndex;
pub use stats::StatisticsAggregator;
pub use tickets::TicketManager;
