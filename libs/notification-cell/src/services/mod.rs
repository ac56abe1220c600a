pub mod delivery_log;
pub mod logging;
pub mod notifier;
pub mod recording;
pub mod twilio;

use std::sync::Arc;

use tracing::{info, warn};

use shared_config::AppConfig;

pub use delivery_log::{DeliveryLog, InMemoryDeliveryLog, DEFAULT_DELIVERY_LOG_CAPACITY};
pub use logging::LoggingNotifier;
pub use notifier::Notifier;
pub use recording::RecordingNotifier;
pub use twilio::TwilioWhatsAppNotifier;

/// Picks the delivery channel for the running configuration: dry-run and
/// missing credentials both log instead of sending.
pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
    if config.dry_run {
        info!("DRY_RUN enabled - WhatsApp messages will be logged, not sent");
        return Arc::new(LoggingNotifier::dry_run());
    }

    if !config.is_whatsapp_configured() {
        warn!("Twilio not configured - falling back to logging notifier");
        return Arc::new(LoggingNotifier::mock());
    }

    Arc::new(TwilioWhatsAppNotifier::new(config))
}
