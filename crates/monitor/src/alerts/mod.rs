//! The alert evaluation engine.
//!
//! An execution-completion event flows through [`AlertDispatcher`]: the
//! pipeline's standing preferences gate the evaluation, [`AlertClassifier`]
//! decides which alert types apply, templates render the messages, and
//! every channel delivery attempt lands in the alert history.

pub mod classifier;
pub mod dispatcher;
pub mod render;
pub mod test_alert;

pub use classifier::{select_alert_types, AlertClassifier, TriggerSignals};
pub use dispatcher::AlertDispatcher;
pub use render::Renderer;
pub use test_alert::{ChannelAttempt, TestAlertError, TestAlertSender};
