use crate::modules::commit_history::adapters::outbound::commit_store::CommitHistoryQueries;
use crate::modules::commits_sync::adapters::outbound::intent_registry::IntentRegistry;
use crate::modules::commits_sync::use_cases::manage_intents::handler::ManageIntentsHandler;
use crate::modules::commits_sync::use_cases::register_intent::handler::RegisterIntentHandler;
use crate::shared::infrastructure::event_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub register_intent: Arc<RegisterIntentHandler<dyn EventBus, dyn IntentRegistry>>,
    pub intents: Arc<ManageIntentsHandler<dyn EventBus, dyn IntentRegistry>>,
    pub queries: Arc<dyn CommitHistoryQueries>,
}

impl AppState {
    pub fn new(
        bus: Arc<dyn EventBus>,
        registry: Arc<dyn IntentRegistry>,
        queries: Arc<dyn CommitHistoryQueries>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            register_intent: Arc::new(RegisterIntentHandler::new(
                bus.clone(),
                registry.clone(),
                call_timeout,
            )),
            intents: Arc::new(ManageIntentsHandler::new(bus, registry, call_timeout)),
            queries,
        }
    }
}
