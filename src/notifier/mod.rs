pub mod slack;

pub use slack::{AlertLevel, SlackNotifier};
