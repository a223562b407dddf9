use crate::handler::LogHandler;
use crate::layer::HandlerLayer;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::Registry;

/// Install `handler` as the global `tracing` subscriber.
///
/// **Parameters**
/// - `handler`: any [`LogHandler`], typically a root text or JSON handler.
///
/// **Returns**
/// - `Err(..)` if a global subscriber is already installed.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`HandlerLayer`], so every
/// `tracing` event in the process at or above the handler's level is
/// written through it.
pub fn init_tracing(handler: Arc<dyn LogHandler>) -> Result<(), TryInitError> {
    Registry::default()
        .with(HandlerLayer::new(handler))
        .try_init()
}
