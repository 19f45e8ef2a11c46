use std::sync::Arc;

use agent_provider::TurnProvider;
use agent_provider_chat_api::{ChatApiProvider, ChatApiProviderConfig, CHAT_API_PROVIDER_ID};
use agent_provider_mock::{MockProvider, MOCK_PROVIDER_ID};

use crate::settings::Settings;

pub fn provider_for_settings(settings: &Settings) -> Result<Arc<dyn TurnProvider>, String> {
    match settings.provider.as_str() {
        CHAT_API_PROVIDER_ID => {
            let mut config = ChatApiProviderConfig::new(
                settings.api_key.clone().unwrap_or_default(),
                settings.model.clone().unwrap_or_default(),
            )
            .with_base_url(settings.base_url.clone());
            if let Some(timeout) = settings.connect_timeout {
                config = config.with_connect_timeout(timeout);
            }

            let provider = ChatApiProvider::new(config).map_err(|error| error.to_string())?;
            Ok(Arc::new(provider))
        }
        MOCK_PROVIDER_ID => {
            let mut provider = MockProvider::default();
            if let Some(model) = settings.model.as_deref() {
                provider = provider.with_model_id(model);
            }
            Ok(Arc::new(provider))
        }
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {CHAT_API_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        )),
    }
}
